//! Admission decisions for FIFO and ASAP constraints.

use tollgate_core::Consumer;
use tollgate_core::ConsumerState;
use tollgate_core::Strategy;

/// Check that a permit request is within `1..=limit`.
///
/// Requesting exactly `limit` is legal.
#[inline]
pub fn is_valid_permit_request(permits: u32, limit: u32) -> bool {
    (1..=limit).contains(&permits)
}

/// Sum permits held by running consumers.
///
/// # Arguments
///
/// * `consumers` - Iterator of `(permits, state)` for each consumer
///
/// # Tiger Style
///
/// - Saturates at `u32::MAX` instead of overflowing
#[inline]
pub fn calculate_running_permits<I>(consumers: I) -> u32
where I: IntoIterator<Item = (u32, ConsumerState)> {
    consumers
        .into_iter()
        .filter(|(_, state)| *state == ConsumerState::Running)
        .fold(0u32, |total, (permits, _)| total.saturating_add(permits))
}

/// Permits still free under `limit`.
///
/// Saturates at zero if the running sum already overshoots the limit, which
/// can happen when two registrations race past the capacity check.
#[inline]
pub fn calculate_available_permits(limit: u32, running: u32) -> u32 {
    limit.saturating_sub(running)
}

/// True if any consumer is waiting.
#[inline]
pub fn has_blocked_consumers<I>(states: I) -> bool
where I: IntoIterator<Item = ConsumerState> {
    states.into_iter().any(|state| state == ConsumerState::Blocked)
}

/// Decide the initial state of a new consumer.
///
/// - FIFO admits only if the request fits *and* nobody is already waiting,
///   so a later arrival never passes an earlier blocked one.
/// - ASAP admits whenever the request fits.
///
/// # Example
///
/// ```
/// use tollgate_constraint::verified::decide_admission;
/// use tollgate_core::ConsumerState;
/// use tollgate_core::Strategy;
///
/// assert_eq!(decide_admission(Strategy::Fifo, 1, 9, true), ConsumerState::Blocked);
/// assert_eq!(decide_admission(Strategy::Asap, 1, 9, true), ConsumerState::Running);
/// ```
#[inline]
pub fn decide_admission(strategy: Strategy, requested: u32, available: u32, has_blocked: bool) -> ConsumerState {
    let fits = requested <= available;
    let admitted = match strategy {
        Strategy::Fifo => fits && !has_blocked,
        Strategy::Asap => fits,
    };
    if admitted { ConsumerState::Running } else { ConsumerState::Blocked }
}

/// Check whether a blocked consumer may start, given the caller's count of
/// permits held by other running consumers.
///
/// # Tiger Style
///
/// - Uses checked_add; an overflowing sum never fits
#[inline]
pub fn can_unblock(currently_running: u32, permits: u32, limit: u32) -> bool {
    match currently_running.checked_add(permits) {
        Some(total) => total <= limit,
        None => false,
    }
}

/// Pick the blocked consumer an orchestrator should try to unblock next.
///
/// `consumers` must be in arrival order.
///
/// - FIFO: the earliest blocked consumer, only if it fits. Nobody behind it
///   is considered, which is what keeps the queue fair.
/// - ASAP: the earliest blocked consumer that fits.
pub fn select_unblock_candidate<'a>(
    strategy: Strategy,
    consumers: &'a [Consumer],
    running: u32,
    limit: u32,
) -> Option<&'a Consumer> {
    let mut blocked = consumers.iter().filter(|c| c.is_blocked());
    match strategy {
        Strategy::Fifo => blocked.next().filter(|c| can_unblock(running, c.permits, limit)),
        Strategy::Asap => blocked.find(|c| can_unblock(running, c.permits, limit)),
    }
}
