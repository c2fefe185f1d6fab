//! Error types for sweep expansion and execution.

use thiserror::Error;

/// Errors that can occur while expanding or executing a sweep.
#[derive(Error, Debug)]
pub enum SweepError {
    /// Invalid test specification or runtime configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Log or metric query failed; may succeed on a later attempt.
    #[error("Metric query failed: {0}")]
    TransientMetricQuery(String),

    /// Fewer parsed per-worker results than workers launched.
    #[error("Incomplete results: expected {expected} worker results, found {found}")]
    IncompleteResults { expected: usize, found: usize },

    /// Burst job reached a terminal state before the lower threshold was crossed.
    #[error("Credit depletion failed: {0}")]
    DepletionFailure(String),

    /// Job execution facade invocation failed outright.
    #[error("Worker launch failed: {0}")]
    WorkerLaunchFailure(String),

    /// Command selector outside the facade's command set.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SweepError {
    /// Whether a retry policy may re-attempt the failed operation.
    ///
    /// Everything else is fatal to the sweep.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SweepError::TransientMetricQuery(_) | SweepError::IncompleteResults { .. }
        )
    }
}

impl From<serde_yaml::Error> for SweepError {
    fn from(err: serde_yaml::Error) -> Self {
        SweepError::Config(format!("invalid YAML: {err}"))
    }
}

impl From<serde_json::Error> for SweepError {
    fn from(err: serde_json::Error) -> Self {
        SweepError::Config(format!("invalid JSON: {err}"))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SweepError>;
