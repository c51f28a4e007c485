//! tollgate: permit-limited admission control shared through a registry.
//!
//! This crate bundles the workspace crates behind one dependency:
//!
//! - [`tollgate_core`] types, the registry trait, and its in-memory and
//!   key-value realizations
//! - [`tollgate_constraint`] admission rules and the [`Constraint`] aggregate
//! - [`tollgate_redb_storage`] a durable redb key-value store

pub use tollgate_constraint;
pub use tollgate_constraint::Constraint;
pub use tollgate_constraint::ConstraintError;
pub use tollgate_core;
pub use tollgate_core::ConstraintId;
pub use tollgate_core::ConstraintRegistry;
pub use tollgate_core::Consumer;
pub use tollgate_core::ConsumerId;
pub use tollgate_core::ConsumerState;
pub use tollgate_core::InMemoryConstraintRegistry;
pub use tollgate_core::KvConstraintRegistry;
pub use tollgate_core::RegistryError;
pub use tollgate_core::Spec;
pub use tollgate_core::Strategy;
pub use tollgate_redb_storage;
pub use tollgate_redb_storage::RedbKeyValueStore;
