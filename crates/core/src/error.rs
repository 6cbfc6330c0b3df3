//! Error types for session execution.
//!
//! Every failure surfaced through a job handle is represented by the
//! [`Error`] enum. Errors are:
//! - **Structured**: each variant carries typed fields
//! - **Cloneable**: a cached acquisition failure can be handed to every caller
//! - **Serializable**: can cross a wire to the client-facing layer

use serde::{Deserialize, Serialize};

use crate::types::CursorId;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Session execution errors.
///
/// # Categories
///
/// | Category | Variants | Description |
/// |----------|----------|-------------|
/// | Storage | `ImplementationFailure` | Connection or storage-level failure |
/// | Scheduling | `TaskExecution` | Job could not be scheduled or run |
/// | Transaction | `TransactionAborted`, `TransactionClosed` | Transaction state |
/// | Cursor | `UnknownCursor` | Cursor id never opened or already closed |
/// | Wait | `InterruptedWait` | A pause job was interrupted |
/// | Validation | `IllegalArgument` | Bad input |
/// | System | `Io`, `Serialization` | Configuration loading |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum Error {
    // ==================== Storage ====================
    /// The storage connection or the engine behind it failed
    #[error("implementation failure: {reason}")]
    ImplementationFailure { reason: String },

    // ==================== Scheduling ====================
    /// The job could not be scheduled, or died while running
    #[error("task execution failed: {reason}")]
    TaskExecution { reason: String },

    // ==================== Transaction ====================
    /// The transaction was aborted by an earlier failure
    #[error("transaction aborted")]
    TransactionAborted,

    /// The transaction was closed and accepts no more work
    #[error("transaction closed")]
    TransactionClosed,

    // ==================== Cursor ====================
    /// No open cursor with this id
    #[error("unknown cursor: {cursor}")]
    UnknownCursor { cursor: CursorId },

    // ==================== Wait ====================
    /// A wait for a tick was interrupted
    #[error("interrupted while waiting for tick {tick}")]
    InterruptedWait { tick: u64 },

    // ==================== Validation ====================
    /// Invalid argument
    #[error("illegal argument: {reason}")]
    IllegalArgument { reason: String },

    // ==================== System ====================
    /// I/O error
    #[error("I/O error: {reason}")]
    Io { reason: String },

    /// Serialization error
    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

impl Error {
    /// Storage-level failure
    pub fn implementation(reason: impl Into<String>) -> Self {
        Error::ImplementationFailure {
            reason: reason.into(),
        }
    }

    /// Scheduling failure
    pub fn task_execution(reason: impl Into<String>) -> Self {
        Error::TaskExecution {
            reason: reason.into(),
        }
    }

    /// Invalid argument
    pub fn illegal_argument(reason: impl Into<String>) -> Self {
        Error::IllegalArgument {
            reason: reason.into(),
        }
    }

    /// Returns true for failures raised by the storage layer.
    pub fn is_implementation_failure(&self) -> bool {
        matches!(self, Error::ImplementationFailure { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io {
            reason: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization {
            reason: e.to_string(),
        }
    }
}
