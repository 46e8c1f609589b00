use thiserror::Error;

/// Errors surfaced by the simulation core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// Malformed process input; the caller can fix and resubmit.
    #[error("invalid process: {0}")]
    Validation(String),

    /// The process can never fit into any region.
    #[error("process size ({size}KB) exceeds largest region ({capacity}KB)")]
    Capacity { size: usize, capacity: usize },

    /// Operation refused while the clock is advancing.
    #[error("stop the simulation before {0}")]
    NotStopped(&'static str),

    /// Ledger and registry disagree. Not recoverable.
    #[error("integrity fault: {0}")]
    Integrity(String),
}

pub type SimResult<T> = std::result::Result<T, SimError>;
