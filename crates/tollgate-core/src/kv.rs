//! Key-value store interface used by [`KvConstraintRegistry`](crate::KvConstraintRegistry).
//!
//! The store must be linearizable per key: a write is visible to every read
//! that starts after it returns. Compare-and-swap is the only primitive the
//! registry relies on for mutual exclusion.

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::MAX_SCAN_RESULTS;
use crate::error::KeyValueStoreError;

/// A stored key and its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// Read a single key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub key: String,
}

impl ReadRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Response from a read operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResult {
    /// `None` when the key does not exist.
    pub kv: Option<KeyValue>,
}

impl ReadResult {
    /// The stored value, if any.
    pub fn into_value(self) -> Option<String> {
        self.kv.map(|kv| kv.value)
    }
}

/// Mutations supported by the store. Every write is conditional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteCommand {
    /// Store `new_value` only if the current value equals `expected`
    /// (`None` meaning the key must not exist).
    CompareAndSwap {
        key: String,
        expected: Option<String>,
        new_value: String,
    },
    /// Remove the key only if its current value equals `expected`.
    CompareAndDelete { key: String, expected: String },
}

/// A write against the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub command: WriteCommand,
}

impl WriteRequest {
    pub fn compare_and_swap(key: impl Into<String>, expected: Option<String>, new_value: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::CompareAndSwap {
                key: key.into(),
                expected,
                new_value: new_value.into(),
            },
        }
    }

    pub fn compare_and_delete(key: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::CompareAndDelete {
                key: key.into(),
                expected: expected.into(),
            },
        }
    }
}

/// Response from a write operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    /// The command that was applied.
    pub command: WriteCommand,
}

/// Prefix scan in key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub prefix: String,
    /// Maximum entries to return, capped at [`MAX_SCAN_RESULTS`].
    pub limit: Option<u32>,
}

impl ScanRequest {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            limit: None,
        }
    }

    /// Effective limit after applying the fixed cap.
    pub fn bounded_limit(&self) -> u32 {
        self.limit.unwrap_or(MAX_SCAN_RESULTS).min(MAX_SCAN_RESULTS)
    }
}

/// Response from a scan operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub entries: Vec<KeyValue>,
    /// True if more matching keys exist beyond the returned entries.
    pub is_truncated: bool,
}

/// Linearizable key-value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value by key.
    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError>;

    /// Apply a write. Conditional commands fail with
    /// [`KeyValueStoreError::CompareAndSwapFailed`] when their condition does not hold.
    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError>;

    /// Scan keys matching a prefix, in key order.
    async fn scan(&self, request: ScanRequest) -> Result<ScanResult, KeyValueStoreError>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError> {
        (**self).read(request).await
    }

    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError> {
        (**self).write(request).await
    }

    async fn scan(&self, request: ScanRequest) -> Result<ScanResult, KeyValueStoreError> {
        (**self).scan(request).await
    }
}
