//! tollgate - admission control for shared resources from the command line.
//!
//! Every invocation opens the local redb store, performs one operation
//! against a constraint, and exits.
//!
//! # Usage
//!
//! ```bash
//! # Allow at most 10 permits, first come first served
//! tollgate constraint create deploys --limit 10 --strategy fifo
//!
//! # Ask for 4 permits; prints RUNNING or BLOCKED
//! tollgate consumer register deploys job-42 --permits 4
//!
//! # Release them and promote whoever is next
//! tollgate consumer finish deploys job-42
//! tollgate --json consumer next deploys | jq -r '.consumer'
//! ```

mod cli;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

/// Initialize tracing subscriber with environment-based filtering.
///
/// - `quiet`: Suppress all logging output (for scripting)
/// - `verbose`: Enable debug-level logging
fn init_tracing(quiet: bool, verbose: bool) {
    let filter = if quiet {
        EnvFilter::new("off")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.global.is_quiet, cli.global.is_verbose);

    cli.run().await
}
