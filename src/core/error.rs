//! Error types for scheduler operations.

use thiserror::Error;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Identifier pool has no free slot; admission is rejected.
    #[error("identifier pool exhausted: all {0} slots allocated")]
    Exhausted(usize),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The controller thread is gone or did not exit in time.
    #[error("controller unavailable: {0}")]
    ControllerUnavailable(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
