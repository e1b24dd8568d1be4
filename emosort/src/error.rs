//! Error types for emosort
//!
//! Two severities exist:
//! - [`StageError`]: a broken precondition at stage entry. The stage aborts.
//! - [`ItemFailure`](crate::models::ItemFailure): one clip failed. It is
//!   recorded in the stage report and processing of siblings continues.

use std::path::PathBuf;
use thiserror::Error;

/// Stage-level (fatal) error
#[derive(Debug, Error)]
pub enum StageError {
    /// Input folder does not exist
    #[error("Source folder not found: {0}")]
    SourceNotFound(PathBuf),

    /// Input path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Ledger file does not exist
    #[error("Ledger file not found: {0}")]
    LedgerNotFound(PathBuf),

    /// Ledger could not be parsed
    #[error("Ledger error in {path}: {message}")]
    Ledger { path: PathBuf, message: String },

    /// Directory traversal failed before any item was processed
    #[error("Scan failed: {0}")]
    Scan(#[from] crate::services::file_scanner::ScanError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Background task failed to complete
    #[error("Task failed: {0}")]
    Task(String),
}

impl StageError {
    pub fn ledger(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        StageError::Ledger {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for StageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StageError::Task(err.to_string())
    }
}

/// Result type for stage entry points
pub type StageResult<T> = Result<T, StageError>;
