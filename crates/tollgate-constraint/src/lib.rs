//! Permit-limited admission control.
//!
//! A [`Constraint`] limits how many permits of a shared resource may be held
//! at once, and decides whether each new consumer runs now or waits:
//!
//! - **FIFO** - arrival order is preserved; once one consumer waits, every
//!   later one waits behind it even if it would fit
//! - **ASAP** - any request that fits is admitted, maximizing utilization at
//!   the cost of possibly starving large requests
//!
//! All state lives behind a [`ConstraintRegistry`](tollgate_core::ConstraintRegistry);
//! the constraint itself only holds its id and spec.
//!
//! ## Example
//!
//! ```ignore
//! use tollgate_constraint::Constraint;
//! use tollgate_core::{ConstraintId, ConsumerId, InMemoryConstraintRegistry, Spec};
//!
//! let registry = InMemoryConstraintRegistry::new();
//! let deploys = Constraint::create(ConstraintId::new("deploys"), Spec::fifo(10), &registry).await?;
//!
//! let state = deploys.register_consumer(&ConsumerId::new("step-1"), 3, &registry).await?;
//! // ... RUNNING: do the work, then release
//! deploys.consumer_finished(&ConsumerId::new("step-1"), &registry).await?;
//! ```

mod constraint;
mod error;
pub mod verified;

pub use constraint::Constraint;
pub use error::ConstraintError;
