//! The durable storage boundary for constraints and their consumers.
//!
//! Every operation is atomic on its own and immediately visible to later
//! calls. Nothing here spans operations: the admission check in
//! `tollgate-constraint` reads the consumer list and then inserts a record as
//! two separate calls.

mod kv;
mod memory;

use async_trait::async_trait;
pub use kv::KvConstraintRegistry;
pub use memory::InMemoryConstraintRegistry;

use crate::error::RegistryError;
use crate::id::ConstraintId;
use crate::id::ConsumerId;
use crate::types::Consumer;
use crate::types::ConsumerState;
use crate::types::Spec;

/// Storage for constraint specs and consumer records.
#[async_trait]
pub trait ConstraintRegistry: Send + Sync {
    /// Persist a constraint spec.
    ///
    /// Saving the same spec twice succeeds. Saving a different spec under an
    /// existing id fails with [`RegistryError::ConstraintAlreadyExists`].
    async fn save_constraint(&self, id: &ConstraintId, spec: &Spec) -> Result<(), RegistryError>;

    /// Load a constraint spec, `None` if it was never saved.
    async fn load_constraint(&self, id: &ConstraintId) -> Result<Option<Spec>, RegistryError>;

    /// Store a new consumer record and return it as stored.
    ///
    /// The registry assigns [`Consumer::sequence`], strictly greater than that
    /// of every consumer inserted before on the same constraint. Fails with
    /// [`RegistryError::ConsumerAlreadyExists`] if the id is taken.
    async fn insert_consumer(
        &self,
        constraint_id: &ConstraintId,
        consumer: &Consumer,
    ) -> Result<Consumer, RegistryError>;

    /// Load one consumer record.
    async fn load_consumer(
        &self,
        constraint_id: &ConstraintId,
        consumer_id: &ConsumerId,
    ) -> Result<Option<Consumer>, RegistryError>;

    /// Load every consumer of a constraint in arrival order (ascending `sequence`).
    ///
    /// Fails with [`RegistryError::TooManyRecords`] rather than return a
    /// partial listing.
    async fn load_consumers(&self, constraint_id: &ConstraintId) -> Result<Vec<Consumer>, RegistryError>;

    /// Move a consumer from `from` to `to`, returning the updated record.
    ///
    /// Fails with [`RegistryError::ConsumerNotFound`] or
    /// [`RegistryError::UnexpectedConsumerState`] without writing anything.
    async fn transition_consumer(
        &self,
        constraint_id: &ConstraintId,
        consumer_id: &ConsumerId,
        from: ConsumerState,
        to: ConsumerState,
    ) -> Result<Consumer, RegistryError>;

    /// Delete a consumer that is currently in `expected`, returning the removed record.
    ///
    /// Same failure modes as [`transition_consumer`](Self::transition_consumer).
    async fn remove_consumer(
        &self,
        constraint_id: &ConstraintId,
        consumer_id: &ConsumerId,
        expected: ConsumerState,
    ) -> Result<Consumer, RegistryError>;
}

// Blanket implementation for Arc<T>
#[async_trait]
impl<T: ConstraintRegistry + ?Sized> ConstraintRegistry for std::sync::Arc<T> {
    async fn save_constraint(&self, id: &ConstraintId, spec: &Spec) -> Result<(), RegistryError> {
        (**self).save_constraint(id, spec).await
    }

    async fn load_constraint(&self, id: &ConstraintId) -> Result<Option<Spec>, RegistryError> {
        (**self).load_constraint(id).await
    }

    async fn insert_consumer(
        &self,
        constraint_id: &ConstraintId,
        consumer: &Consumer,
    ) -> Result<Consumer, RegistryError> {
        (**self).insert_consumer(constraint_id, consumer).await
    }

    async fn load_consumer(
        &self,
        constraint_id: &ConstraintId,
        consumer_id: &ConsumerId,
    ) -> Result<Option<Consumer>, RegistryError> {
        (**self).load_consumer(constraint_id, consumer_id).await
    }

    async fn load_consumers(&self, constraint_id: &ConstraintId) -> Result<Vec<Consumer>, RegistryError> {
        (**self).load_consumers(constraint_id).await
    }

    async fn transition_consumer(
        &self,
        constraint_id: &ConstraintId,
        consumer_id: &ConsumerId,
        from: ConsumerState,
        to: ConsumerState,
    ) -> Result<Consumer, RegistryError> {
        (**self).transition_consumer(constraint_id, consumer_id, from, to).await
    }

    async fn remove_consumer(
        &self,
        constraint_id: &ConstraintId,
        consumer_id: &ConsumerId,
        expected: ConsumerState,
    ) -> Result<Consumer, RegistryError> {
        (**self).remove_consumer(constraint_id, consumer_id, expected).await
    }
}

/// Sort consumers into arrival order.
pub(crate) fn sort_by_arrival(consumers: &mut [Consumer]) {
    consumers.sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.id.cmp(&b.id)));
}
