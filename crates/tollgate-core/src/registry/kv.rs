//! Registry layered on a linearizable [`KeyValueStore`].
//!
//! Specs and consumers are stored as one JSON document per key (see
//! [`keys`](crate::keys)). Every mutation is a compare-and-swap against the
//! value that was just read, so concurrent processes sharing the store never
//! apply two transitions to the same consumer. A lost CAS is retried up to
//! [`MAX_CAS_RETRIES`] times.
//!
//! Arrival order comes from a per-constraint counter key bumped by CAS on
//! every insert, not from any process's clock.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;
use tracing::warn;

use super::ConstraintRegistry;
use super::sort_by_arrival;
use crate::constants::MAX_CAS_RETRIES;
use crate::constants::MAX_SCAN_RESULTS;
use crate::error::KeyValueStoreError;
use crate::error::RegistryError;
use crate::id::ConstraintId;
use crate::id::ConsumerId;
use crate::keys;
use crate::kv::KeyValueStore;
use crate::kv::ReadRequest;
use crate::kv::ScanRequest;
use crate::kv::WriteRequest;
use crate::types::Consumer;
use crate::types::ConsumerState;
use crate::types::Spec;

/// Registry storing constraints in a shared key-value store.
pub struct KvConstraintRegistry<S: KeyValueStore + ?Sized> {
    store: Arc<S>,
}

impl<S: KeyValueStore + ?Sized> Clone for KvConstraintRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KeyValueStore + ?Sized + 'static> KvConstraintRegistry<S> {
    /// Create a registry over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Read a raw value.
    async fn read_raw(&self, key: &str) -> Result<Option<String>, RegistryError> {
        let result = self.store.read(ReadRequest::new(key)).await?;
        Ok(result.into_value().filter(|value| !value.is_empty()))
    }

    /// Read and decode a JSON document.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<(T, String)>, RegistryError> {
        match self.read_raw(key).await? {
            Some(raw) => {
                let decoded = decode(key, &raw)?;
                Ok(Some((decoded, raw)))
            }
            None => Ok(None),
        }
    }

    /// Read a consumer and check it is in `expected`, returning the decoded
    /// record with the raw value to compare against.
    async fn read_consumer_in_state(
        &self,
        key: &str,
        constraint_id: &ConstraintId,
        consumer_id: &ConsumerId,
        expected: ConsumerState,
    ) -> Result<(Consumer, String), RegistryError> {
        let Some((consumer, raw)) = self.read_json::<Consumer>(key).await? else {
            return Err(RegistryError::ConsumerNotFound {
                constraint_id: constraint_id.clone(),
                consumer_id: consumer_id.clone(),
            });
        };
        if consumer.state != expected {
            return Err(RegistryError::UnexpectedConsumerState {
                consumer_id: consumer_id.clone(),
                expected,
                actual: consumer.state,
            });
        }
        Ok((consumer, raw))
    }

    /// Claim the next arrival sequence for a constraint.
    async fn next_sequence(&self, constraint_id: &ConstraintId) -> Result<u64, RegistryError> {
        let key = keys::sequence_key(constraint_id);

        for _ in 0..MAX_CAS_RETRIES {
            let current = self.read_raw(&key).await?;
            let last = match &current {
                Some(raw) => raw.parse::<u64>().map_err(|e| RegistryError::CorruptedData {
                    key: key.clone(),
                    reason: e.to_string(),
                })?,
                None => 0,
            };
            let next = last.saturating_add(1);

            match self.store.write(WriteRequest::compare_and_swap(&key, current, next.to_string())).await {
                Ok(_) => return Ok(next),
                Err(e) if is_cas_conflict(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(exhausted(key))
    }
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, RegistryError> {
    serde_json::from_str(raw).map_err(|e| RegistryError::CorruptedData {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn is_cas_conflict(err: &KeyValueStoreError) -> bool {
    matches!(err, KeyValueStoreError::CompareAndSwapFailed { .. })
}

fn exhausted(key: String) -> RegistryError {
    warn!(key = %key, attempts = MAX_CAS_RETRIES, "compare-and-swap retries exhausted");
    RegistryError::Conflict {
        key,
        attempts: MAX_CAS_RETRIES,
    }
}

#[async_trait]
impl<S: KeyValueStore + ?Sized + 'static> ConstraintRegistry for KvConstraintRegistry<S> {
    async fn save_constraint(&self, id: &ConstraintId, spec: &Spec) -> Result<(), RegistryError> {
        let key = keys::constraint_key(id);
        let new_json = serde_json::to_string(spec)?;

        for _ in 0..MAX_CAS_RETRIES {
            if let Some((existing, _)) = self.read_json::<Spec>(&key).await? {
                if existing == *spec {
                    return Ok(());
                }
                return Err(RegistryError::ConstraintAlreadyExists { id: id.clone() });
            }

            match self.store.write(WriteRequest::compare_and_swap(&key, None, new_json.clone())).await {
                Ok(_) => {
                    debug!(constraint_id = %id, "constraint spec stored");
                    return Ok(());
                }
                // Someone created it concurrently; re-read to compare specs.
                Err(e) if is_cas_conflict(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(exhausted(key))
    }

    async fn load_constraint(&self, id: &ConstraintId) -> Result<Option<Spec>, RegistryError> {
        let key = keys::constraint_key(id);
        Ok(self.read_json::<Spec>(&key).await?.map(|(spec, _)| spec))
    }

    async fn insert_consumer(
        &self,
        constraint_id: &ConstraintId,
        consumer: &Consumer,
    ) -> Result<Consumer, RegistryError> {
        let key = keys::consumer_key(constraint_id, &consumer.id);
        let already_exists = || RegistryError::ConsumerAlreadyExists {
            constraint_id: constraint_id.clone(),
            consumer_id: consumer.id.clone(),
        };

        if self.read_raw(&key).await?.is_some() {
            return Err(already_exists());
        }

        let stored = consumer.with_sequence(self.next_sequence(constraint_id).await?);
        let new_json = serde_json::to_string(&stored)?;

        // A sequence claimed by an insert that loses here is skipped.
        match self.store.write(WriteRequest::compare_and_swap(&key, None, new_json)).await {
            Ok(_) => Ok(stored),
            Err(e) if is_cas_conflict(&e) => Err(already_exists()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_consumer(
        &self,
        constraint_id: &ConstraintId,
        consumer_id: &ConsumerId,
    ) -> Result<Option<Consumer>, RegistryError> {
        let key = keys::consumer_key(constraint_id, consumer_id);
        Ok(self.read_json::<Consumer>(&key).await?.map(|(consumer, _)| consumer))
    }

    async fn load_consumers(&self, constraint_id: &ConstraintId) -> Result<Vec<Consumer>, RegistryError> {
        let prefix = keys::consumer_prefix(constraint_id);
        let result = self
            .store
            .scan(ScanRequest {
                prefix,
                limit: Some(MAX_SCAN_RESULTS),
            })
            .await?;
        if result.is_truncated {
            warn!(constraint_id = %constraint_id, max = MAX_SCAN_RESULTS, "consumer listing truncated");
            return Err(RegistryError::TooManyRecords {
                constraint_id: constraint_id.clone(),
                max: MAX_SCAN_RESULTS,
            });
        }

        let mut consumers = result
            .entries
            .iter()
            .filter(|kv| !kv.value.is_empty())
            .map(|kv| decode::<Consumer>(&kv.key, &kv.value))
            .collect::<Result<Vec<_>, _>>()?;
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
        let key = keys::consumer_key(constraint_id, consumer_id);

        for _ in 0..MAX_CAS_RETRIES {
            let (consumer, old_json) = self.read_consumer_in_state(&key, constraint_id, consumer_id, from).await?;
            let updated = consumer.with_state(to);
            let new_json = serde_json::to_string(&updated)?;

            match self.store.write(WriteRequest::compare_and_swap(&key, Some(old_json), new_json)).await {
                Ok(_) => {
                    debug!(constraint_id = %constraint_id, consumer_id = %consumer_id, %from, %to, "consumer transitioned");
                    return Ok(updated);
                }
                Err(e) if is_cas_conflict(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(exhausted(key))
    }

    async fn remove_consumer(
        &self,
        constraint_id: &ConstraintId,
        consumer_id: &ConsumerId,
        expected: ConsumerState,
    ) -> Result<Consumer, RegistryError> {
        let key = keys::consumer_key(constraint_id, consumer_id);

        for _ in 0..MAX_CAS_RETRIES {
            let (consumer, old_json) =
                self.read_consumer_in_state(&key, constraint_id, consumer_id, expected).await?;

            match self.store.write(WriteRequest::compare_and_delete(&key, old_json)).await {
                Ok(_) => {
                    debug!(constraint_id = %constraint_id, consumer_id = %consumer_id, "consumer removed");
                    return Ok(consumer);
                }
                Err(e) if is_cas_conflict(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(exhausted(key))
    }
}
