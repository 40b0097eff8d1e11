//! # Error Types
//!
//! Custom error types for Tracker Sync using `thiserror`.

use thiserror::Error;

/// Main error type for Tracker Sync
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Null or empty input buffer
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Inbound document is not well-formed
    #[error("Failed to parse document: {0}")]
    ParseFailure(#[from] serde_json::Error),

    /// Document construction ran out of node budget
    #[error("Document allocation failed: {0}")]
    AllocationFailure(String),

    /// No dirty fields or queued samples; skip this cycle
    #[error("Nothing to report")]
    NothingToReport,

    /// Document was partially composed but could not be completed
    #[error("Document assembly failed, retry later: {0}")]
    RetryableAssembly(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport backend errors
    #[error("Backend error: {0}")]
    Backend(String),
}

impl TrackerError {
    /// True if the same call may succeed on a later cycle without any
    /// change to local state.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrackerError::AllocationFailure(_)
                | TrackerError::RetryableAssembly(_)
                | TrackerError::Backend(_)
        )
    }

    /// True if the error only means "skip this cycle".
    pub fn is_skip(&self) -> bool {
        matches!(self, TrackerError::NothingToReport)
    }
}

/// Result type alias for Tracker Sync
pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_to_report_is_skip_not_retry() {
        let err = TrackerError::NothingToReport;
        assert!(err.is_skip());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_assembly_errors_are_retryable() {
        assert!(TrackerError::AllocationFailure("root".into()).is_retryable());
        assert!(TrackerError::RetryableAssembly("cfg".into()).is_retryable());
        assert!(!TrackerError::InvalidInput("empty".into()).is_retryable());
    }

    #[test]
    fn test_parse_failure_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: TrackerError = json_err.into();
        assert!(matches!(err, TrackerError::ParseFailure(_)));
        assert!(err.to_string().starts_with("Failed to parse document"));
    }
}
