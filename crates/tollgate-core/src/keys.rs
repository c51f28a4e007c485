//! Storage key layout for [`KvConstraintRegistry`](crate::KvConstraintRegistry).
//!
//! Ids are arbitrary strings, so each id segment carries its byte length.
//! Without it, the consumer prefix of constraint `a` would also match the
//! consumers of a constraint named `a:b`.
//!
//! ```text
//! __tollgate:constraint:<len>:<constraint_id>
//! __tollgate:consumer:<len>:<constraint_id>:<consumer_id>
//! __tollgate:sequence:<len>:<constraint_id>
//! ```

use crate::id::ConstraintId;
use crate::id::ConsumerId;

/// Key prefix for constraint specs.
pub const CONSTRAINT_PREFIX: &str = "__tollgate:constraint:";

/// Key prefix for consumer records.
pub const CONSUMER_PREFIX: &str = "__tollgate:consumer:";

/// Key prefix for per-constraint arrival counters.
pub const SEQUENCE_PREFIX: &str = "__tollgate:sequence:";

/// Key holding a constraint's spec.
#[inline]
pub fn constraint_key(id: &ConstraintId) -> String {
    format!("{}{}:{}", CONSTRAINT_PREFIX, id.as_str().len(), id)
}

/// Prefix shared by every consumer record of one constraint.
#[inline]
pub fn consumer_prefix(constraint_id: &ConstraintId) -> String {
    format!("{}{}:{}:", CONSUMER_PREFIX, constraint_id.as_str().len(), constraint_id)
}

/// Key holding one consumer record.
#[inline]
pub fn consumer_key(constraint_id: &ConstraintId, consumer_id: &ConsumerId) -> String {
    format!("{}{}", consumer_prefix(constraint_id), consumer_id)
}

/// Key holding the last arrival sequence handed out on a constraint.
#[inline]
pub fn sequence_key(constraint_id: &ConstraintId) -> String {
    format!("{}{}:{}", SEQUENCE_PREFIX, constraint_id.as_str().len(), constraint_id)
}
