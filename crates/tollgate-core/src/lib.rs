//! Core types and storage abstractions for tollgate constraints.
//!
//! A constraint caps how many permits of a named resource may be consumed at
//! once. This crate holds everything the admission logic needs that is not
//! the admission logic itself:
//!
//! - [`ConstraintId`] / [`ConsumerId`] - opaque identifiers
//! - [`Spec`], [`Strategy`], [`Consumer`], [`ConsumerState`] - the data model
//! - [`ConstraintRegistry`] - the durable storage boundary, with an in-memory
//!   realization ([`InMemoryConstraintRegistry`]) and one layered on any
//!   linearizable [`KeyValueStore`] ([`KvConstraintRegistry`])
//!
//! The admission rules live in `tollgate-constraint`.

pub mod constants;
mod error;
mod id;
pub mod keys;
pub mod kv;
mod registry;
pub mod test_support;
mod types;

pub use constants::MAX_CAS_RETRIES;
pub use constants::MAX_CONSUMERS_PER_CONSTRAINT;
pub use constants::MAX_SCAN_RESULTS;
pub use error::KeyValueStoreError;
pub use error::RegistryError;
pub use id::ConstraintId;
pub use id::ConsumerId;
pub use kv::KeyValue;
pub use kv::KeyValueStore;
pub use kv::ReadRequest;
pub use kv::ReadResult;
pub use kv::ScanRequest;
pub use kv::ScanResult;
pub use kv::WriteCommand;
pub use kv::WriteRequest;
pub use kv::WriteResult;
pub use registry::ConstraintRegistry;
pub use registry::InMemoryConstraintRegistry;
pub use registry::KvConstraintRegistry;
pub use types::Consumer;
pub use types::ConsumerState;
pub use types::Spec;
pub use types::Strategy;
pub use types::now_unix_ms;
