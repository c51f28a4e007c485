//! CLI argument parsing and command dispatch.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use tollgate_core::KvConstraintRegistry;
use tollgate_redb_storage::RedbKeyValueStore;
use tracing::debug;

use crate::commands::CommandContext;
use crate::commands::constraint::ConstraintCommand;
use crate::commands::consumer::ConsumerCommand;
use crate::config::TollgateConfig;

/// Command-line interface for tollgate constraints.
#[derive(Parser)]
#[command(name = "tollgate")]
#[command(version)]
#[command(about = "Admission control for shared resources")]
#[command(long_about = "Create constraints that cap the permits held by concurrent consumers, \
    register consumers against them, and release or promote consumers as work completes.")]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Commands,
}

/// Global options available to all commands.
#[derive(Args, Clone)]
pub struct GlobalOptions {
    /// Path to a TOML configuration file.
    #[arg(long, env = "TOLLGATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Path to the redb database file.
    ///
    /// Overrides `storage.path` from the configuration and TOLLGATE_DB_PATH.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output JSON instead of human-readable format.
    #[arg(long = "json", global = true)]
    pub is_json: bool,

    /// Enable verbose logging.
    #[arg(short = 'v', long = "verbose", global = true)]
    pub is_verbose: bool,

    /// Suppress all logging output.
    #[arg(short = 'q', long = "quiet", global = true)]
    pub is_quiet: bool,
}

/// Top-level command categories.
#[derive(Subcommand)]
pub enum Commands {
    /// Create and inspect constraints.
    #[command(subcommand)]
    Constraint(ConstraintCommand),

    /// Register, finish, and unblock consumers.
    #[command(subcommand)]
    Consumer(ConsumerCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn run(self) -> Result<()> {
        let config = TollgateConfig::load(self.global.config.as_deref()).context("failed to load configuration")?;
        let path = self.global.db.clone().unwrap_or_else(|| config.storage.path.clone());

        let store = RedbKeyValueStore::new(&path)
            .with_context(|| format!("failed to open store at {}", path.display()))?;
        debug!(path = %path.display(), "store ready");

        let ctx = CommandContext {
            registry: KvConstraintRegistry::new(Arc::new(store)),
            config,
        };

        match self.command {
            Commands::Constraint(cmd) => cmd.run(&ctx, self.global.is_json).await,
            Commands::Consumer(cmd) => cmd.run(&ctx, self.global.is_json).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tollgate",
            "consumer",
            "register",
            "deploys",
            "job-1",
            "--permits",
            "3",
            "--json",
            "--db",
            "/tmp/t.redb",
        ])
        .unwrap();
        assert!(cli.global.is_json);
        assert_eq!(cli.global.db, Some(PathBuf::from("/tmp/t.redb")));
    }

    #[test]
    fn test_strategy_is_case_insensitive() {
        let cli = Cli::try_parse_from(["tollgate", "constraint", "create", "c", "--limit", "5", "--strategy", "asap"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Constraint(ConstraintCommand::Create(_))));

        assert!(
            Cli::try_parse_from(["tollgate", "constraint", "create", "c", "--limit", "5", "--strategy", "lifo"])
                .is_err()
        );
    }
}
