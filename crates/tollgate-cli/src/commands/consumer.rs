//! Consumer commands.
//!
//! `register` prints the admitted state. `finish` releases permits but never
//! promotes anyone; follow it with `next` and `unblock` to move the queue.

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use clap::Args;
use clap::Subcommand;
use tollgate_core::ConstraintRegistry;
use tollgate_core::Consumer;
use tollgate_core::ConsumerId;
use tollgate_core::ConsumerState;
use tracing::info;

use super::CommandContext;
use crate::output::Outputable;
use crate::output::consumer_json;
use crate::output::print_output;

/// Consumer operations.
#[derive(Subcommand)]
pub enum ConsumerCommand {
    /// Register a consumer requesting permits; prints RUNNING or BLOCKED.
    Register(RegisterArgs),

    /// Release a running consumer's permits.
    Finish(ConsumerArgs),

    /// Try to move a blocked consumer to running.
    Unblock(UnblockArgs),

    /// Show the blocked consumer that fits next, if any.
    Next(NextArgs),

    /// Withdraw a blocked consumer without ever running it.
    Cancel(ConsumerArgs),
}

#[derive(Args)]
pub struct RegisterArgs {
    /// Constraint identifier.
    pub constraint: String,

    /// Consumer identifier, unique within the constraint.
    pub consumer: String,

    /// Number of permits to request.
    #[arg(long, default_value = "1")]
    pub permits: u32,
}

#[derive(Args)]
pub struct ConsumerArgs {
    /// Constraint identifier.
    pub constraint: String,

    /// Consumer identifier.
    pub consumer: String,
}

#[derive(Args)]
pub struct UnblockArgs {
    /// Constraint identifier.
    pub constraint: String,

    /// Consumer identifier.
    pub consumer: String,

    /// Permits currently held by running consumers.
    ///
    /// Computed from the registry when omitted.
    #[arg(long)]
    pub running: Option<u32>,
}

#[derive(Args)]
pub struct NextArgs {
    /// Constraint identifier.
    pub constraint: String,
}

/// Consumer operation output.
pub struct ConsumerOutput {
    pub operation: &'static str,
    pub constraint: String,
    pub consumer: Option<Consumer>,
    pub success: bool,
}

impl Outputable for ConsumerOutput {
    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "operation": self.operation,
            "constraint": self.constraint,
            "success": self.success,
            "consumer": self.consumer.as_ref().map(consumer_json)
        })
    }

    fn to_human(&self) -> String {
        let Some(consumer) = &self.consumer else {
            return format!("No blocked consumer of '{}' fits yet", self.constraint);
        };
        match (self.operation, self.success) {
            ("register", _) => format!("{} {} ({} permits)", consumer.id, consumer.state, consumer.permits),
            ("finish", _) => format!("Finished {} (released {} permits)", consumer.id, consumer.permits),
            ("unblock", true) => format!("{} RUNNING ({} permits)", consumer.id, consumer.permits),
            ("unblock", false) => format!("{} still BLOCKED ({} permits do not fit)", consumer.id, consumer.permits),
            ("next", _) => format!("{} ({} permits)", consumer.id, consumer.permits),
            ("cancel", _) => format!("Cancelled {} ({} permits)", consumer.id, consumer.permits),
            _ => "OK".to_string(),
        }
    }
}

impl ConsumerCommand {
    /// Execute the consumer command.
    pub async fn run(self, ctx: &CommandContext, json: bool) -> Result<()> {
        match self {
            ConsumerCommand::Register(args) => consumer_register(ctx, args, json).await,
            ConsumerCommand::Finish(args) => consumer_finish(ctx, args, json).await,
            ConsumerCommand::Unblock(args) => consumer_unblock(ctx, args, json).await,
            ConsumerCommand::Next(args) => consumer_next(ctx, args, json).await,
            ConsumerCommand::Cancel(args) => consumer_cancel(ctx, args, json).await,
        }
    }
}

async fn consumer_register(ctx: &CommandContext, args: RegisterArgs, json: bool) -> Result<()> {
    let constraint = ctx.constraint(&args.constraint).await?;
    let consumer_id = ConsumerId::new(args.consumer);

    let state = constraint.register_consumer(&consumer_id, args.permits, &ctx.registry).await?;
    info!(constraint_id = %constraint.id(), consumer_id = %consumer_id, state = %state, "consumer registered");
    let found = ctx.registry.load_consumer(constraint.id(), &consumer_id).await?;
    let consumer = registered_consumer(found, &consumer_id, &args.constraint)?;

    let output = ConsumerOutput {
        operation: "register",
        constraint: args.constraint,
        consumer: Some(consumer),
        success: true,
    };
    print_output(&output, json);
    Ok(())
}

async fn consumer_finish(ctx: &CommandContext, args: ConsumerArgs, json: bool) -> Result<()> {
    let constraint = ctx.constraint(&args.constraint).await?;
    let consumer_id = ConsumerId::new(args.consumer);

    let consumer = ctx
        .registry
        .load_consumer(constraint.id(), &consumer_id)
        .await?
        .with_context(|| format!("consumer '{}' is not registered with '{}'", consumer_id, args.constraint))?;
    let finished = constraint.consumer_finished(&consumer_id, &ctx.registry).await?;

    let output = ConsumerOutput {
        operation: "finish",
        constraint: args.constraint,
        consumer: Some(consumer),
        success: finished,
    };
    print_output(&output, json);
    Ok(())
}

async fn consumer_unblock(ctx: &CommandContext, args: UnblockArgs, json: bool) -> Result<()> {
    let constraint = ctx.constraint(&args.constraint).await?;
    let consumer_id = ConsumerId::new(args.consumer);

    let running = match args.running {
        Some(running) => running,
        None => constraint.running_permits(&ctx.registry).await?,
    };
    let unblocked = constraint.consumer_unblocked(&consumer_id, running, &ctx.registry).await?;
    let consumer = ctx.registry.load_consumer(constraint.id(), &consumer_id).await?;

    let output = ConsumerOutput {
        operation: "unblock",
        constraint: args.constraint,
        consumer,
        success: unblocked,
    };
    print_output(&output, json);
    if !unblocked {
        std::process::exit(1);
    }
    Ok(())
}

async fn consumer_next(ctx: &CommandContext, args: NextArgs, json: bool) -> Result<()> {
    let constraint = ctx.constraint(&args.constraint).await?;
    let candidate = constraint.next_unblock_candidate(&ctx.registry).await?;

    let output = ConsumerOutput {
        operation: "next",
        constraint: args.constraint,
        success: candidate.is_some(),
        consumer: candidate,
    };
    print_output(&output, json);
    Ok(())
}

async fn consumer_cancel(ctx: &CommandContext, args: ConsumerArgs, json: bool) -> Result<()> {
    let constraint = ctx.constraint(&args.constraint).await?;
    let consumer_id = ConsumerId::new(args.consumer);

    let removed = ctx
        .registry
        .remove_consumer(constraint.id(), &consumer_id, ConsumerState::Blocked)
        .await
        .with_context(|| format!("failed to cancel consumer '{}'", consumer_id))?;
    info!(
        constraint_id = %constraint.id(),
        consumer_id = %consumer_id,
        permits = removed.permits,
        "consumer cancelled"
    );

    let output = ConsumerOutput {
        operation: "cancel",
        constraint: args.constraint,
        consumer: Some(removed),
        success: true,
    };
    print_output(&output, json);
    Ok(())
}

/// The record read back after `register`. Another process may have finished
/// or cancelled the consumer in between.
fn registered_consumer(found: Option<Consumer>, consumer_id: &ConsumerId, constraint: &str) -> Result<Consumer> {
    match found {
        Some(consumer) => Ok(consumer),
        None => bail!("consumer '{consumer_id}' was registered on '{constraint}' but is no longer present"),
    }
}
