//! Non-persistent registry for tests and single-process use.

use std::collections::BTreeMap;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::ConstraintRegistry;
use super::sort_by_arrival;
use crate::error::RegistryError;
use crate::id::ConstraintId;
use crate::id::ConsumerId;
use crate::types::Consumer;
use crate::types::ConsumerState;
use crate::types::Spec;

#[derive(Debug, Default)]
struct Tables {
    constraints: HashMap<ConstraintId, Spec>,
    consumers: HashMap<ConstraintId, BTreeMap<ConsumerId, Consumer>>,
    /// Last sequence handed out per constraint. Never reset, so removals leave gaps.
    sequences: HashMap<ConstraintId, u64>,
}

/// In-process registry. Each call takes one lock, so each call is atomic.
#[derive(Debug, Default)]
pub struct InMemoryConstraintRegistry {
    tables: RwLock<Tables>,
}

impl InMemoryConstraintRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_state(consumer: &Consumer, expected: ConsumerState) -> Result<(), RegistryError> {
    if consumer.state != expected {
        return Err(RegistryError::UnexpectedConsumerState {
            consumer_id: consumer.id.clone(),
            expected,
            actual: consumer.state,
        });
    }
    Ok(())
}

fn not_found(constraint_id: &ConstraintId, consumer_id: &ConsumerId) -> RegistryError {
    RegistryError::ConsumerNotFound {
        constraint_id: constraint_id.clone(),
        consumer_id: consumer_id.clone(),
    }
}

#[async_trait]
impl ConstraintRegistry for InMemoryConstraintRegistry {
    async fn save_constraint(&self, id: &ConstraintId, spec: &Spec) -> Result<(), RegistryError> {
        let mut tables = self.tables.write().await;
        match tables.constraints.get(id) {
            Some(existing) if existing == spec => Ok(()),
            Some(_) => Err(RegistryError::ConstraintAlreadyExists { id: id.clone() }),
            None => {
                tables.constraints.insert(id.clone(), *spec);
                Ok(())
            }
        }
    }

    async fn load_constraint(&self, id: &ConstraintId) -> Result<Option<Spec>, RegistryError> {
        Ok(self.tables.read().await.constraints.get(id).copied())
    }

    async fn insert_consumer(
        &self,
        constraint_id: &ConstraintId,
        consumer: &Consumer,
    ) -> Result<Consumer, RegistryError> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let consumers = tables.consumers.entry(constraint_id.clone()).or_default();
        if consumers.contains_key(&consumer.id) {
            return Err(RegistryError::ConsumerAlreadyExists {
                constraint_id: constraint_id.clone(),
                consumer_id: consumer.id.clone(),
            });
        }

        let last = tables.sequences.entry(constraint_id.clone()).or_default();
        *last += 1;
        let stored = consumer.with_sequence(*last);
        consumers.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn load_consumer(
        &self,
        constraint_id: &ConstraintId,
        consumer_id: &ConsumerId,
    ) -> Result<Option<Consumer>, RegistryError> {
        let tables = self.tables.read().await;
        Ok(tables.consumers.get(constraint_id).and_then(|c| c.get(consumer_id)).cloned())
    }

    async fn load_consumers(&self, constraint_id: &ConstraintId) -> Result<Vec<Consumer>, RegistryError> {
        let tables = self.tables.read().await;
        let mut consumers: Vec<Consumer> =
            tables.consumers.get(constraint_id).map(|c| c.values().cloned().collect()).unwrap_or_default();
        sort_by_arrival(&mut consumers);
        Ok(consumers)
    }

    async fn transition_consumer(
        &self,
        constraint_id: &ConstraintId,
        consumer_id: &ConsumerId,
        from: ConsumerState,
        to: ConsumerState,
    ) -> Result<Consumer, RegistryError> {
        let mut tables = self.tables.write().await;
        let consumer = tables
            .consumers
            .get_mut(constraint_id)
            .and_then(|c| c.get_mut(consumer_id))
            .ok_or_else(|| not_found(constraint_id, consumer_id))?;
        check_state(consumer, from)?;
        consumer.state = to;
        Ok(consumer.clone())
    }

    async fn remove_consumer(
        &self,
        constraint_id: &ConstraintId,
        consumer_id: &ConsumerId,
        expected: ConsumerState,
    ) -> Result<Consumer, RegistryError> {
        let mut tables = self.tables.write().await;
        let consumers = tables.consumers.get_mut(constraint_id).ok_or_else(|| not_found(constraint_id, consumer_id))?;
        let consumer = consumers.get(consumer_id).ok_or_else(|| not_found(constraint_id, consumer_id))?;
        check_state(consumer, expected)?;
        consumers.remove(consumer_id).ok_or_else(|| not_found(constraint_id, consumer_id))
    }
}
