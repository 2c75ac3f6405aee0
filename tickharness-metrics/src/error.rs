//! Error types for summaries and comparisons

use thiserror::Error;

/// Errors raised while building or comparing summaries
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    #[error("Summaries have different columns: {left:?} vs {right:?}")]
    ShapeMismatch {
        left: Vec<String>,
        right: Vec<String>,
    },

    #[error("Unknown metric column: {0}")]
    UnknownColumn(String),

    #[error("No runs to compare")]
    Empty,
}
