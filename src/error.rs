//! Error types for Mnemonic

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::export::ImportSummary;
use crate::types::MemoryId;

/// Result type alias for Mnemonic operations
pub type Result<T> = std::result::Result<T, MnemonicError>;

/// Main error type for Mnemonic
#[derive(Error, Debug)]
pub enum MnemonicError {
    /// Malformed or out-of-range input; the caller should fix it and retry
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// The memory does not exist. An expected outcome, not a failure.
    #[error("Memory not found: {0}")]
    NotFound(MemoryId),

    /// Import collision under the fail-fast policy
    #[error("Conflict on memory {id}: {message}")]
    Conflict { id: MemoryId, message: String },

    /// Backend busy, locked, unreachable or failing I/O
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Import document with an unknown format or version
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// An import stopped part way. `summary` counts the records committed
    /// before `cause` was hit; they stay in the store.
    #[error("Import stopped after {} created, {} overwritten: {cause}", .summary.created, .summary.overwritten)]
    ImportInterrupted {
        summary: Box<ImportSummary>,
        #[source]
        cause: Box<MnemonicError>,
    },
}

impl MnemonicError {
    /// Build a validation error for `field`
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        MnemonicError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// The error that actually stopped the operation
    pub fn root_cause(&self) -> &MnemonicError {
        match self {
            MnemonicError::ImportInterrupted { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Partial progress of an interrupted import
    pub fn import_summary(&self) -> Option<&ImportSummary> {
        match self {
            MnemonicError::ImportInterrupted { summary, .. } => Some(summary.as_ref()),
            _ => None,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self.root_cause(), MnemonicError::StorageUnavailable(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MnemonicError::NotFound(_))
    }

    /// Get error code for MCP protocol
    pub fn code(&self) -> i64 {
        match self.root_cause() {
            MnemonicError::NotFound(_) => -32001,
            MnemonicError::Validation { .. } => -32602,
            MnemonicError::StorageUnavailable(_) => -32002,
            MnemonicError::Conflict { .. } => -32005,
            MnemonicError::UnsupportedFormat(_) => -32007,
            _ => -32000,
        }
    }
}

impl From<rusqlite::Error> for MnemonicError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull
                | ErrorCode::FileLockingProtocolFailed,
            ) => MnemonicError::StorageUnavailable(err.to_string()),
            _ => MnemonicError::Database(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None)
    }

    #[test]
    fn test_busy_maps_to_storage_unavailable() {
        let err: MnemonicError = sqlite_failure(rusqlite::ffi::SQLITE_BUSY).into();
        assert!(matches!(err, MnemonicError::StorageUnavailable(_)));
        assert!(err.is_retryable());

        let err: MnemonicError = sqlite_failure(rusqlite::ffi::SQLITE_IOERR).into();
        assert!(matches!(err, MnemonicError::StorageUnavailable(_)));
    }

    #[test]
    fn test_constraint_stays_database_error() {
        let err: MnemonicError = sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT).into();
        assert!(matches!(err, MnemonicError::Database(_)));
        assert!(!err.is_retryable());
        assert_eq!(err.code(), -32000);
    }

    #[test]
    fn test_interrupted_import_reports_its_cause() {
        let err = MnemonicError::ImportInterrupted {
            summary: Box::new(ImportSummary {
                total: 3,
                created: 2,
                ..Default::default()
            }),
            cause: Box::new(MnemonicError::StorageUnavailable("database is locked".into())),
        };
        assert!(err.is_retryable());
        assert_eq!(err.code(), -32002);
        assert_eq!(err.import_summary().map(|s| s.created), Some(2));
        assert_eq!(
            err.to_string(),
            "Import stopped after 2 created, 0 overwritten: Storage unavailable: database is locked"
        );
    }

    #[test]
    fn test_validation_message_names_field() {
        let err = MnemonicError::validation("title", "must not be empty");
        assert_eq!(err.to_string(), "Invalid title: must not be empty");
        assert_eq!(err.code(), -32602);
    }
}
