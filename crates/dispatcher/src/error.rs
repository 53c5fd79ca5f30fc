//! Session error types

use thiserror::Error;

/// Dispatcher-specific errors
///
/// Transport failures never surface here: the session loop absorbs them.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Shutdown requested, the only loop terminator
    #[error("session shut down")]
    Shutdown,

    /// Report could not be encoded
    #[error("wire error: {0}")]
    Wire(#[from] contracts::ContractError),

    /// Barrier failure seen by the tick consumer
    #[error("barrier error: {0}")]
    Barrier(#[from] sync_engine::BarrierError),

    /// Blocking barrier wait panicked or was cancelled
    #[error("consumer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
