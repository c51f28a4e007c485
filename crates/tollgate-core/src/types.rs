//! Data model shared by the admission logic and registries.

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

use crate::id::ConsumerId;

/// Ordering policy applied when admitting consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Strategy {
    /// Admit in arrival order. Once anyone is waiting, everyone after waits too.
    Fifo,
    /// Admit whoever fits right now, even past earlier waiters.
    Asap,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Fifo => f.write_str("FIFO"),
            Strategy::Asap => f.write_str("ASAP"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FIFO" => Ok(Strategy::Fifo),
            "ASAP" => Ok(Strategy::Asap),
            other => Err(format!("unknown strategy '{other}', expected FIFO or ASAP")),
        }
    }
}

/// Immutable description of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    /// Admission policy.
    pub strategy: Strategy,
    /// Total permit capacity.
    pub limit: u32,
}

impl Spec {
    pub fn new(strategy: Strategy, limit: u32) -> Self {
        Self { strategy, limit }
    }

    pub fn fifo(limit: u32) -> Self {
        Self::new(Strategy::Fifo, limit)
    }

    pub fn asap(limit: u32) -> Self {
        Self::new(Strategy::Asap, limit)
    }
}

/// Lifecycle state of a consumer.
///
/// Finished consumers are removed from the registry, so there is no terminal
/// variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsumerState {
    /// Waiting for capacity.
    Blocked,
    /// Holding its permits.
    Running,
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumerState::Blocked => f.write_str("BLOCKED"),
            ConsumerState::Running => f.write_str("RUNNING"),
        }
    }
}

/// One admission request against a constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
    /// Requester identity, unique within the constraint.
    pub id: ConsumerId,
    /// Permits requested, in `1..=limit`.
    pub permits: u32,
    /// Current state.
    pub state: ConsumerState,
    /// Registration time (ms since epoch). Informational only.
    pub registered_at_ms: u64,
    /// Arrival position within the constraint, assigned by the registry on
    /// insert. Consumers are queued in ascending order of this number.
    #[serde(default)]
    pub sequence: u64,
}

impl Consumer {
    /// Create a consumer stamped with the current time.
    ///
    /// `sequence` stays zero until a registry inserts the record.
    pub fn new(id: ConsumerId, permits: u32, state: ConsumerState) -> Self {
        Self {
            id,
            permits,
            state,
            registered_at_ms: now_unix_ms(),
            sequence: 0,
        }
    }

    /// Copy of this consumer with its arrival position set.
    pub fn with_sequence(&self, sequence: u64) -> Self {
        Self {
            sequence,
            ..self.clone()
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == ConsumerState::Running
    }

    pub fn is_blocked(&self) -> bool {
        self.state == ConsumerState::Blocked
    }

    /// Copy of this consumer in another state.
    pub fn with_state(&self, state: ConsumerState) -> Self {
        Self { state, ..self.clone() }
    }
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_unix_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}
