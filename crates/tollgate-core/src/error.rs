//! Error types for registries and key-value stores.

use snafu::Snafu;

use crate::id::ConstraintId;
use crate::id::ConsumerId;
use crate::types::ConsumerState;

/// Errors from a [`KeyValueStore`](crate::KeyValueStore).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum KeyValueStoreError {
    /// A conditional write found a different current value.
    #[snafu(display("compare-and-swap failed on '{key}': expected {expected:?}, found {actual:?}"))]
    CompareAndSwapFailed {
        /// The key being written.
        key: String,
        /// Value the caller expected.
        expected: Option<String>,
        /// Value actually stored.
        actual: Option<String>,
    },

    /// The backing store failed.
    #[snafu(display("key-value backend failure: {source}"))]
    Backend {
        /// The underlying backend error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Errors from a [`ConstraintRegistry`](crate::ConstraintRegistry).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RegistryError {
    /// A different spec is already stored under this constraint id.
    #[snafu(display("constraint '{id}' already exists with a different spec"))]
    ConstraintAlreadyExists {
        /// The constraint id.
        id: ConstraintId,
    },

    /// The consumer id is already registered on this constraint.
    #[snafu(display("consumer '{consumer_id}' already registered on constraint '{constraint_id}'"))]
    ConsumerAlreadyExists {
        /// The constraint id.
        constraint_id: ConstraintId,
        /// The consumer id.
        consumer_id: ConsumerId,
    },

    /// No record for this consumer (never registered, or already finished).
    #[snafu(display("consumer '{consumer_id}' not found on constraint '{constraint_id}'"))]
    ConsumerNotFound {
        /// The constraint id.
        constraint_id: ConstraintId,
        /// The consumer id.
        consumer_id: ConsumerId,
    },

    /// A conditional transition found the consumer in another state.
    #[snafu(display("consumer '{consumer_id}' is {actual}, expected {expected}"))]
    UnexpectedConsumerState {
        /// The consumer id.
        consumer_id: ConsumerId,
        /// State the caller required.
        expected: ConsumerState,
        /// State actually stored.
        actual: ConsumerState,
    },

    /// Stored data could not be interpreted.
    #[snafu(display("corrupted data in key '{key}': {reason}"))]
    CorruptedData {
        /// The key with corrupted data.
        key: String,
        /// Description of what went wrong.
        reason: String,
    },

    /// A constraint holds more consumer records than one listing may return.
    #[snafu(display("constraint '{constraint_id}' holds more than {max} consumer records"))]
    TooManyRecords {
        /// The constraint id.
        constraint_id: ConstraintId,
        /// Largest listing a registry returns.
        max: u32,
    },

    /// Compare-and-swap kept losing to concurrent writers.
    #[snafu(display("gave up on '{key}' after {attempts} conflicting attempts"))]
    Conflict {
        /// The contended key.
        key: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// Underlying storage error.
    #[snafu(display("storage error: {source}"))]
    Storage {
        /// The underlying error.
        source: KeyValueStoreError,
    },

    /// JSON serialization/deserialization error.
    #[snafu(display("serialization error: {source}"))]
    Serialization {
        /// The underlying error.
        source: serde_json::Error,
    },
}

impl From<KeyValueStoreError> for RegistryError {
    fn from(source: KeyValueStoreError) -> Self {
        RegistryError::Storage { source }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(source: serde_json::Error) -> Self {
        RegistryError::Serialization { source }
    }
}
