//! Deterministic in-memory [`KeyValueStore`] for tests.
//!
//! Not durable. Useful for exercising [`KvConstraintRegistry`](crate::KvConstraintRegistry)
//! without a real backend, and for injecting conflicting writes between a
//! registry's read and its compare-and-swap.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::KeyValueStoreError;
use crate::kv::KeyValue;
use crate::kv::KeyValueStore;
use crate::kv::ReadRequest;
use crate::kv::ReadResult;
use crate::kv::ScanRequest;
use crate::kv::ScanResult;
use crate::kv::WriteCommand;
use crate::kv::WriteRequest;
use crate::kv::WriteResult;

/// A deterministic in-memory key-value store.
#[derive(Debug, Default)]
pub struct DeterministicKeyValueStore {
    data: RwLock<BTreeMap<String, String>>,
}

impl DeterministicKeyValueStore {
    /// Create a new store wrapped in Arc.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// True when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

fn cas_failed(key: &str, expected: Option<&str>, actual: Option<&String>) -> KeyValueStoreError {
    KeyValueStoreError::CompareAndSwapFailed {
        key: key.to_string(),
        expected: expected.map(str::to_string),
        actual: actual.cloned(),
    }
}

#[async_trait]
impl KeyValueStore for DeterministicKeyValueStore {
    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError> {
        let data = self.data.read().await;
        Ok(ReadResult {
            kv: data.get(&request.key).map(|value| KeyValue {
                key: request.key.clone(),
                value: value.clone(),
            }),
        })
    }

    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError> {
        let mut data = self.data.write().await;

        match &request.command {
            WriteCommand::CompareAndSwap {
                key,
                expected,
                new_value,
            } => {
                let current = data.get(key);
                if current != expected.as_ref() {
                    return Err(cas_failed(key, expected.as_deref(), current));
                }
                data.insert(key.clone(), new_value.clone());
            }
            WriteCommand::CompareAndDelete { key, expected } => {
                let current = data.get(key);
                if current != Some(expected) {
                    return Err(cas_failed(key, Some(expected), current));
                }
                data.remove(key);
            }
        }

        Ok(WriteResult {
            command: request.command,
        })
    }

    async fn scan(&self, request: ScanRequest) -> Result<ScanResult, KeyValueStoreError> {
        let data = self.data.read().await;
        let limit = request.bounded_limit() as usize;

        let mut matching = data
            .range::<String, _>((Bound::Included(&request.prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(&request.prefix));

        let entries: Vec<KeyValue> = matching
            .by_ref()
            .take(limit)
            .map(|(key, value)| KeyValue {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        let is_truncated = matching.next().is_some();

        Ok(ScanResult { entries, is_truncated })
    }
}
