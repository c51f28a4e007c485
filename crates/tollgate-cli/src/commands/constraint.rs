//! Constraint commands.

use anyhow::Result;
use clap::Args;
use clap::Subcommand;
use tollgate_constraint::Constraint;
use tollgate_constraint::verified;
use tollgate_core::ConstraintId;
use tollgate_core::Consumer;
use tollgate_core::Spec;
use tollgate_core::Strategy;

use super::CommandContext;
use crate::output::Outputable;
use crate::output::consumer_json;
use crate::output::consumer_row;
use crate::output::print_output;

/// Constraint operations.
#[derive(Subcommand)]
pub enum ConstraintCommand {
    /// Create a constraint with a permit limit.
    Create(CreateArgs),

    /// Show a constraint's limit, usage, and consumers.
    Show(ShowArgs),
}

#[derive(Args)]
pub struct CreateArgs {
    /// Constraint identifier.
    pub id: String,

    /// Maximum permits held by running consumers at once.
    #[arg(long)]
    pub limit: u32,

    /// Admission strategy (fifo or asap). Defaults to the configured strategy.
    #[arg(long)]
    pub strategy: Option<Strategy>,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Constraint identifier.
    pub id: String,
}

/// Constraint state output.
pub struct ConstraintOutput {
    pub id: String,
    pub spec: Spec,
    pub running: u32,
    pub available: u32,
    pub consumers: Vec<Consumer>,
}

impl Outputable for ConstraintOutput {
    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "strategy": self.spec.strategy.to_string(),
            "limit": self.spec.limit,
            "running": self.running,
            "available": self.available,
            "consumers": self.consumers.iter().map(consumer_json).collect::<Vec<_>>()
        })
    }

    fn to_human(&self) -> String {
        let mut out = format!(
            "Constraint: {}\n\
             Strategy:   {}\n\
             Limit:      {}\n\
             Running:    {}\n\
             Available:  {}",
            self.id, self.spec.strategy, self.spec.limit, self.running, self.available
        );
        if self.consumers.is_empty() {
            out.push_str("\n\nNo consumers");
        } else {
            out.push_str(&format!("\n\n{:<24} {:>8} STATE", "CONSUMER", "PERMITS"));
            for consumer in &self.consumers {
                out.push('\n');
                out.push_str(&consumer_row(consumer));
            }
        }
        out
    }
}

impl ConstraintCommand {
    /// Execute the constraint command.
    pub async fn run(self, ctx: &CommandContext, json: bool) -> Result<()> {
        match self {
            ConstraintCommand::Create(args) => constraint_create(ctx, args, json).await,
            ConstraintCommand::Show(args) => constraint_show(ctx, args, json).await,
        }
    }
}

async fn constraint_create(ctx: &CommandContext, args: CreateArgs, json: bool) -> Result<()> {
    let strategy = match args.strategy {
        Some(strategy) => strategy,
        None => ctx.config.default_strategy()?,
    };

    let constraint = Constraint::create(ConstraintId::new(args.id), Spec::new(strategy, args.limit), &ctx.registry).await?;
    print_constraint(ctx, &constraint, json).await
}

async fn constraint_show(ctx: &CommandContext, args: ShowArgs, json: bool) -> Result<()> {
    let constraint = ctx.constraint(&args.id).await?;
    print_constraint(ctx, &constraint, json).await
}

async fn print_constraint(ctx: &CommandContext, constraint: &Constraint, json: bool) -> Result<()> {
    let consumers = constraint.consumers(&ctx.registry).await?;
    let running = verified::calculate_running_permits(consumers.iter().map(|c| (c.permits, c.state)));

    let output = ConstraintOutput {
        id: constraint.id().to_string(),
        spec: *constraint.spec(),
        running,
        available: verified::calculate_available_permits(constraint.limit(), running),
        consumers,
    };
    print_output(&output, json);
    Ok(())
}
