//! Pure admission functions.
//!
//! No I/O and no clocks: every input is passed explicitly, so the admission
//! rules can be tested without a registry. The [`Constraint`](crate::Constraint)
//! aggregate is the imperative shell around these.
//!
//! # Tiger Style
//!
//! - Saturating/checked arithmetic (no panics)
//! - Explicit `u32` permit counts

pub mod admission;

pub use admission::calculate_available_permits;
pub use admission::calculate_running_permits;
pub use admission::can_unblock;
pub use admission::decide_admission;
pub use admission::has_blocked_consumers;
pub use admission::is_valid_permit_request;
pub use admission::select_unblock_candidate;
