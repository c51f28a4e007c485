//! Fixed limits for constraint storage.
//!
//! Every collection a registry hands back is bounded by one of these.

/// Maximum number of consumers (blocked or running) tracked per constraint.
///
/// Registration beyond this count is rejected rather than growing the
/// consumer listing without bound.
pub const MAX_CONSUMERS_PER_CONSTRAINT: u32 = 10_000;

/// Maximum number of entries returned by a single key-value scan.
pub const MAX_SCAN_RESULTS: u32 = MAX_CONSUMERS_PER_CONSTRAINT + 1;

/// Attempts made on a compare-and-swap mutation before giving up with a conflict.
pub const MAX_CAS_RETRIES: u32 = 16;
