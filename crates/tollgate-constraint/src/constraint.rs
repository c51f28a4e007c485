//! The constraint aggregate.
//!
//! A [`Constraint`] is an immutable `(id, spec)` pair plus the admission
//! rules. It keeps no consumer state of its own: every operation reads from
//! and writes to the registry it is handed, so any number of processes can
//! share one constraint through a shared registry.

use snafu::ResultExt;
use snafu::ensure;
use tollgate_core::ConstraintId;
use tollgate_core::ConstraintRegistry;
use tollgate_core::Consumer;
use tollgate_core::ConsumerId;
use tollgate_core::ConsumerState;
use tollgate_core::MAX_CONSUMERS_PER_CONSTRAINT;
use tollgate_core::RegistryError;
use tollgate_core::Spec;
use tollgate_core::Strategy;
use tracing::debug;
use tracing::info;

use crate::error::ConstraintError;
use crate::error::InvalidLimitSnafu;
use crate::error::InvalidPermitsSnafu;
use crate::error::RegistrySnafu;
use crate::error::TooManyConsumersSnafu;
use crate::error::UnableToLoadConstraintSnafu;
use crate::error::UnableToRegisterConsumerSnafu;
use crate::error::UnableToSaveConstraintSnafu;
use crate::verified;

/// A named, permit-limited resource pool with an admission policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    id: ConstraintId,
    spec: Spec,
}

impl Constraint {
    /// Persist a new constraint and return a handle to it.
    ///
    /// Creating a constraint that already exists with the same spec succeeds,
    /// so a replayed `create` is harmless.
    pub async fn create<R: ConstraintRegistry + ?Sized>(
        id: ConstraintId,
        spec: Spec,
        registry: &R,
    ) -> Result<Self, ConstraintError> {
        ensure!(spec.limit > 0, InvalidLimitSnafu {
            id: id.clone(),
            limit: spec.limit,
        });

        registry.save_constraint(&id, &spec).await.context(UnableToSaveConstraintSnafu { id: id.clone() })?;

        info!(constraint_id = %id, strategy = %spec.strategy, limit = spec.limit, "constraint created");
        Ok(Self { id, spec })
    }

    /// Load an existing constraint. Returns `Ok(None)` if it was never created.
    pub async fn load<R: ConstraintRegistry + ?Sized>(
        id: ConstraintId,
        registry: &R,
    ) -> Result<Option<Self>, ConstraintError> {
        let spec = registry.load_constraint(&id).await.context(UnableToLoadConstraintSnafu { id: id.clone() })?;
        Ok(spec.map(|spec| Self { id, spec }))
    }

    pub fn id(&self) -> &ConstraintId {
        &self.id
    }

    pub fn spec(&self) -> &Spec {
        &self.spec
    }

    pub fn strategy(&self) -> Strategy {
        self.spec.strategy
    }

    pub fn limit(&self) -> u32 {
        self.spec.limit
    }

    /// Request `permits` for a consumer.
    ///
    /// Returns the state that was persisted: `Running` means proceed,
    /// `Blocked` means wait for [`consumer_unblocked`](Self::consumer_unblocked).
    ///
    /// Registering the same consumer again with the same permit count returns
    /// its current state without writing anything.
    ///
    /// The capacity read and the insert are separate registry calls. Two
    /// processes registering at the same moment can both see room and both be
    /// admitted.
    pub async fn register_consumer<R: ConstraintRegistry + ?Sized>(
        &self,
        consumer_id: &ConsumerId,
        permits: u32,
        registry: &R,
    ) -> Result<ConsumerState, ConstraintError> {
        let limit = self.spec.limit;
        ensure!(verified::is_valid_permit_request(permits, limit), InvalidPermitsSnafu {
            consumer_id: consumer_id.clone(),
            permits,
            limit,
        });

        let consumers = registry.load_consumers(&self.id).await.context(UnableToRegisterConsumerSnafu {
            constraint_id: self.id.clone(),
            consumer_id: consumer_id.clone(),
        })?;

        if let Some(existing) = consumers.iter().find(|c| &c.id == consumer_id) {
            return self.replayed_registration(existing, permits);
        }

        let count = consumers.len() as u32;
        ensure!(count < MAX_CONSUMERS_PER_CONSTRAINT, TooManyConsumersSnafu {
            constraint_id: self.id.clone(),
            count,
            max: MAX_CONSUMERS_PER_CONSTRAINT,
        });

        let running = verified::calculate_running_permits(consumers.iter().map(|c| (c.permits, c.state)));
        let available = verified::calculate_available_permits(limit, running);
        let has_blocked = verified::has_blocked_consumers(consumers.iter().map(|c| c.state));
        let state = verified::decide_admission(self.spec.strategy, permits, available, has_blocked);

        let consumer = Consumer::new(consumer_id.clone(), permits, state);
        match registry.insert_consumer(&self.id, &consumer).await {
            Ok(_) => {}
            // A concurrent replay of this registration got there first.
            Err(RegistryError::ConsumerAlreadyExists { .. }) => {
                return self.resolve_insert_race(consumer_id, permits, registry).await;
            }
            Err(source) => {
                return Err(ConstraintError::UnableToRegisterConsumer {
                    constraint_id: self.id.clone(),
                    consumer_id: consumer_id.clone(),
                    source,
                });
            }
        }

        debug!(
            constraint_id = %self.id,
            consumer_id = %consumer_id,
            permits,
            available,
            has_blocked,
            %state,
            "consumer registered"
        );
        Ok(state)
    }

    /// Release a running consumer's permits.
    ///
    /// Fails with [`ConstraintError::InvalidState`] if the consumer is
    /// unknown, already finished, or still blocked. Blocked consumers are not
    /// promoted here; that is a separate, explicit
    /// [`consumer_unblocked`](Self::consumer_unblocked) call.
    pub async fn consumer_finished<R: ConstraintRegistry + ?Sized>(
        &self,
        consumer_id: &ConsumerId,
        registry: &R,
    ) -> Result<bool, ConstraintError> {
        let removed = registry
            .remove_consumer(&self.id, consumer_id, ConsumerState::Running)
            .await
            .map_err(|e| self.consumer_error(consumer_id, e))?;

        debug!(constraint_id = %self.id, consumer_id = %consumer_id, permits = removed.permits, "consumer finished");
        Ok(true)
    }

    /// Try to promote a blocked consumer to running.
    ///
    /// `currently_running_permits` is the caller's count of permits held by
    /// running consumers, not counting this one. Returns `Ok(false)` and
    /// leaves the consumer blocked if it does not fit; that is an expected
    /// outcome when several callers race for freed capacity.
    ///
    /// Fails with [`ConstraintError::InvalidState`] if the consumer is
    /// unknown, already finished, or already running.
    pub async fn consumer_unblocked<R: ConstraintRegistry + ?Sized>(
        &self,
        consumer_id: &ConsumerId,
        currently_running_permits: u32,
        registry: &R,
    ) -> Result<bool, ConstraintError> {
        let consumer = registry.load_consumer(&self.id, consumer_id).await.context(RegistrySnafu {
            constraint_id: self.id.clone(),
        })?;

        let consumer = match consumer {
            None => return Err(self.invalid_state(consumer_id, "consumer is not registered or has finished")),
            Some(c) if c.is_running() => return Err(self.invalid_state(consumer_id, "consumer is already RUNNING")),
            Some(c) => c,
        };

        if !verified::can_unblock(currently_running_permits, consumer.permits, self.spec.limit) {
            debug!(
                constraint_id = %self.id,
                consumer_id = %consumer_id,
                permits = consumer.permits,
                currently_running_permits,
                limit = self.spec.limit,
                "consumer does not fit yet"
            );
            return Ok(false);
        }

        registry
            .transition_consumer(&self.id, consumer_id, ConsumerState::Blocked, ConsumerState::Running)
            .await
            .map_err(|e| self.consumer_error(consumer_id, e))?;

        debug!(constraint_id = %self.id, consumer_id = %consumer_id, permits = consumer.permits, "consumer unblocked");
        Ok(true)
    }

    /// All consumers in arrival order.
    pub async fn consumers<R: ConstraintRegistry + ?Sized>(&self, registry: &R) -> Result<Vec<Consumer>, ConstraintError> {
        registry.load_consumers(&self.id).await.context(RegistrySnafu {
            constraint_id: self.id.clone(),
        })
    }

    /// Permits currently held by running consumers.
    pub async fn running_permits<R: ConstraintRegistry + ?Sized>(&self, registry: &R) -> Result<u32, ConstraintError> {
        let consumers = self.consumers(registry).await?;
        Ok(verified::calculate_running_permits(consumers.iter().map(|c| (c.permits, c.state))))
    }

    /// Permits free under the limit, zero if the limit has been overshot.
    pub async fn available_permits<R: ConstraintRegistry + ?Sized>(&self, registry: &R) -> Result<u32, ConstraintError> {
        let running = self.running_permits(registry).await?;
        Ok(verified::calculate_available_permits(self.spec.limit, running))
    }

    /// The blocked consumer worth trying to unblock next, if any fits now.
    ///
    /// FIFO only ever offers the head of the queue; ASAP offers the earliest
    /// blocked consumer that fits. This is a read; the caller still has to
    /// call [`consumer_unblocked`](Self::consumer_unblocked).
    pub async fn next_unblock_candidate<R: ConstraintRegistry + ?Sized>(
        &self,
        registry: &R,
    ) -> Result<Option<Consumer>, ConstraintError> {
        let consumers = self.consumers(registry).await?;
        let running = verified::calculate_running_permits(consumers.iter().map(|c| (c.permits, c.state)));
        Ok(verified::select_unblock_candidate(self.spec.strategy, &consumers, running, self.spec.limit).cloned())
    }

    fn replayed_registration(&self, existing: &Consumer, permits: u32) -> Result<ConsumerState, ConstraintError> {
        if existing.permits != permits {
            return Err(self.invalid_state(
                &existing.id,
                &format!("consumer is already registered with {} permits, not {}", existing.permits, permits),
            ));
        }
        debug!(constraint_id = %self.id, consumer_id = %existing.id, state = %existing.state, "registration replayed");
        Ok(existing.state)
    }

    async fn resolve_insert_race<R: ConstraintRegistry + ?Sized>(
        &self,
        consumer_id: &ConsumerId,
        permits: u32,
        registry: &R,
    ) -> Result<ConsumerState, ConstraintError> {
        let existing = registry.load_consumer(&self.id, consumer_id).await.context(UnableToRegisterConsumerSnafu {
            constraint_id: self.id.clone(),
            consumer_id: consumer_id.clone(),
        })?;
        match existing {
            Some(existing) => self.replayed_registration(&existing, permits),
            None => Err(self.invalid_state(consumer_id, "consumer was registered and finished concurrently")),
        }
    }

    fn invalid_state(&self, consumer_id: &ConsumerId, reason: &str) -> ConstraintError {
        ConstraintError::InvalidState {
            constraint_id: self.id.clone(),
            consumer_id: consumer_id.clone(),
            reason: reason.to_string(),
        }
    }

    /// Map a conditional registry failure onto the caller-facing taxonomy.
    fn consumer_error(&self, consumer_id: &ConsumerId, err: RegistryError) -> ConstraintError {
        match err {
            RegistryError::ConsumerNotFound { .. } => {
                self.invalid_state(consumer_id, "consumer is not registered or has finished")
            }
            RegistryError::UnexpectedConsumerState { actual, .. } => {
                self.invalid_state(consumer_id, &format!("consumer is {actual}"))
            }
            source => ConstraintError::Registry {
                constraint_id: self.id.clone(),
                source,
            },
        }
    }
}
