//! Common Error Types for zStake
//!
//! Provides unified error handling across all modules.

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::storage::StorageError;

/// Root error type for zStake
#[derive(Debug, Error)]
pub enum ZStakeError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    /// Ledger operation rejected
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Storage errors
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Validation errors
    #[error("validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZStakeError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Check if this is a retryable error
    ///
    /// Ledger rejections are final; only infrastructure failures may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ZStakeError::Storage(_) | ZStakeError::Io(_))
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            ZStakeError::Config(_) => "CONFIG_ERROR",
            ZStakeError::Logging(_) => "LOGGING_ERROR",
            ZStakeError::Ledger(e) => e.error_code(),
            ZStakeError::Storage(_) => "STORAGE_ERROR",
            ZStakeError::Validation(_) => "VALIDATION_ERROR",
            ZStakeError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias using ZStakeError
pub type Result<T> = std::result::Result<T, ZStakeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ZStakeError::from(LedgerError::WithdrawInProgress);
        assert_eq!(err.error_code(), "WITHDRAW_IN_PROGRESS");
        assert!(err.to_string().contains("withdrawal already in progress"));

        let err = ZStakeError::validation("bad amount");
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ZStakeError::Storage(StorageError::Database("locked".into())).is_retryable());
        assert!(!ZStakeError::Ledger(LedgerError::InvalidProof).is_retryable());
        assert!(!ZStakeError::validation("invalid input").is_retryable());
    }
}
