//! Barrier error types

use contracts::SourceId;
use thiserror::Error;

/// Sync barrier error
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BarrierError {
    /// Cooperative cancellation, every blocked call returns this
    #[error("sync barrier shut down")]
    Shutdown,

    /// A thread panicked while holding the tick buffer
    #[error("tick buffer mutex poisoned")]
    Poisoned,

    /// Release of a tick other than the current one
    #[error("cannot release tick {got}: current tick is {expected}")]
    TickMismatch { expected: u64, got: u64 },

    /// Deadline passed before the tick completed
    #[error("no complete tick within {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    /// Both sources retired, no further tick will be produced
    #[error("all sources retired")]
    Exhausted,

    /// Publish from a source whose slot was retired
    #[error("{source_id} slot is retired")]
    Retired { source_id: SourceId },

    /// Observation published through the other source's port
    #[error("{got} observation published on the {expected} slot")]
    WrongSource { expected: SourceId, got: SourceId },
}

impl BarrierError {
    /// Whether the caller should stop its loop
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BarrierError::Timeout { .. })
    }
}
