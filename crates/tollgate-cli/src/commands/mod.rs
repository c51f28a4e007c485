//! Command implementations.

pub mod constraint;
pub mod consumer;

use anyhow::Result;
use tollgate_constraint::Constraint;
use tollgate_core::ConstraintId;
use tollgate_core::KvConstraintRegistry;
use tollgate_redb_storage::RedbKeyValueStore;

use crate::config::TollgateConfig;

/// Registry backed by the local redb file.
pub type Registry = KvConstraintRegistry<RedbKeyValueStore>;

/// Everything a command needs to run.
pub struct CommandContext {
    pub registry: Registry,
    pub config: TollgateConfig,
}

impl CommandContext {
    /// Load a constraint or fail with a message naming it.
    pub async fn constraint(&self, id: &str) -> Result<Constraint> {
        match Constraint::load(ConstraintId::new(id), &self.registry).await? {
            Some(constraint) => Ok(constraint),
            None => anyhow::bail!("constraint '{}' does not exist", id),
        }
    }
}
