//! Redb-based storage backend for tollgate registries.
//!
//! [`RedbKeyValueStore`] implements [`KeyValueStore`](tollgate_core::KeyValueStore)
//! on a single redb file. Every write, conditional or not, runs in its own
//! write transaction; redb serializes write transactions, so a
//! compare-and-swap observes and replaces the value atomically.
//!
//! Pair it with [`KvConstraintRegistry`](tollgate_core::KvConstraintRegistry)
//! for a durable single-node registry:
//!
//! ```ignore
//! use std::sync::Arc;
//! use tollgate_core::KvConstraintRegistry;
//! use tollgate_redb_storage::RedbKeyValueStore;
//!
//! let store = Arc::new(RedbKeyValueStore::new("./data/tollgate.redb")?);
//! let registry = KvConstraintRegistry::new(store);
//! ```
//!
//! A redb file is locked by the process that opens it. Replicas on several
//! machines need a shared linearizable store behind the same trait instead.

mod error;
mod store;

pub use error::RedbStorageError;
pub use store::RedbKeyValueStore;
