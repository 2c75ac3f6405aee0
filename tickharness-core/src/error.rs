//! Error types for the simulation harness

use thiserror::Error;

use crate::SimTime;

/// Top-level error type for simulation runs
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Simulation stalled at {time}: {pending_tasks} task(s) can never be woken")]
    Stalled { time: SimTime, pending_tasks: usize },

    #[error("Virtual clock stopped while work was still outstanding")]
    ClockStopped,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A stage rejecting or failing one event.
///
/// Never escapes a run: the arrival engine records it as that event's
/// [`Response::Failure`](crate::Response::Failure).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Timed out after {ticks} ticks")]
    Timeout { ticks: u64 },

    #[error("Circuit open")]
    CircuitOpen,

    #[error("Stage failure: {0}")]
    Failed(String),
}

impl StageError {
    pub fn failed(reason: impl Into<String>) -> Self {
        StageError::Failed(reason.into())
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        StageError::Rejected(reason.into())
    }
}
