//! Error types for Dream Flux

use thiserror::Error;

/// Errors that can occur while normalizing sleep data
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Sleep record {id} is not scored (score_state: {score_state})")]
    UnscoredSleepData { id: String, score_state: String },

    #[error("Sleep record {id} is missing stage_summary.{field}")]
    IncompleteSleepData { id: String, field: &'static str },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid sleep session: {0}")]
    InvalidSession(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse payload: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl NormalizeError {
    /// Whether a batch caller should skip the offending record and carry on.
    ///
    /// Record-level failures are recoverable; payload and configuration
    /// failures are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            NormalizeError::UnscoredSleepData { .. }
                | NormalizeError::IncompleteSleepData { .. }
                | NormalizeError::InvalidTimestamp(_)
                | NormalizeError::InvalidSession(_)
        )
    }
}
