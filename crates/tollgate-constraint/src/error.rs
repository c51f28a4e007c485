//! Errors from constraint operations.
//!
//! Three kinds of outcome are kept apart:
//!
//! - caller misuse (`InvalidLimit`, `InvalidPermits`, `InvalidState`,
//!   `TooManyConsumers`): never worth retrying
//! - persistence failures (`UnableTo*`, `Registry`): the registry error is
//!   carried unchanged and the caller decides whether to retry
//! - expected contention, which is not an error at all: an unblock that does
//!   not fit returns `Ok(false)` and a missing constraint loads as `Ok(None)`

use snafu::Snafu;
use tollgate_core::ConstraintId;
use tollgate_core::ConsumerId;
use tollgate_core::RegistryError;

/// Errors from [`Constraint`](crate::Constraint) operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConstraintError {
    /// A constraint must allow at least one permit.
    #[snafu(display("constraint '{id}' has invalid limit {limit}, must be positive"))]
    InvalidLimit {
        /// The constraint id.
        id: ConstraintId,
        /// The rejected limit.
        limit: u32,
    },

    /// Requested permits outside `1..=limit`.
    #[snafu(display("consumer '{consumer_id}' requested {permits} permits, must be between 1 and {limit}"))]
    InvalidPermits {
        /// The consumer id.
        consumer_id: ConsumerId,
        /// Permits requested.
        permits: u32,
        /// The constraint's limit.
        limit: u32,
    },

    /// The consumer is missing or in the wrong state for the operation.
    #[snafu(display("invalid state for consumer '{consumer_id}' on constraint '{constraint_id}': {reason}"))]
    InvalidState {
        /// The constraint id.
        constraint_id: ConstraintId,
        /// The consumer id.
        consumer_id: ConsumerId,
        /// What was wrong.
        reason: String,
    },

    /// The constraint already tracks the maximum number of consumers.
    #[snafu(display("too many consumers on constraint '{constraint_id}': {count} (max: {max})"))]
    TooManyConsumers {
        /// The constraint id.
        constraint_id: ConstraintId,
        /// Current consumer count.
        count: u32,
        /// Maximum allowed consumers.
        max: u32,
    },

    /// Persisting a new constraint failed.
    #[snafu(display("unable to save constraint '{id}': {source}"))]
    UnableToSaveConstraint {
        /// The constraint id.
        id: ConstraintId,
        /// The registry failure.
        source: RegistryError,
    },

    /// Loading a constraint failed for a reason other than "not found".
    #[snafu(display("unable to load constraint '{id}': {source}"))]
    UnableToLoadConstraint {
        /// The constraint id.
        id: ConstraintId,
        /// The registry failure.
        source: RegistryError,
    },

    /// Reading or writing during registration failed.
    #[snafu(display("unable to register consumer '{consumer_id}' on constraint '{constraint_id}': {source}"))]
    UnableToRegisterConsumer {
        /// The constraint id.
        constraint_id: ConstraintId,
        /// The consumer id.
        consumer_id: ConsumerId,
        /// The registry failure.
        source: RegistryError,
    },

    /// Any other registry failure.
    #[snafu(display("registry error on constraint '{constraint_id}': {source}"))]
    Registry {
        /// The constraint id.
        constraint_id: ConstraintId,
        /// The registry failure.
        source: RegistryError,
    },
}

impl ConstraintError {
    /// True for storage failures, which may succeed on retry.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            ConstraintError::UnableToSaveConstraint { .. }
                | ConstraintError::UnableToLoadConstraint { .. }
                | ConstraintError::UnableToRegisterConsumer { .. }
                | ConstraintError::Registry { .. }
        )
    }
}
