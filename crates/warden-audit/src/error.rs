// error.rs — Error types for the audit subsystem.
//
// Note the asymmetry: `record` never returns an error (a full buffer
// degrades the log, it does not fail the caller), while opening and
// querying can fail like any file I/O.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during audit operations.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Failed to open or create the audit log file.
    #[error("failed to open audit log at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read the log back for a query.
    #[error("failed to read audit log: {0}")]
    ReadFailed(#[from] std::io::Error),

    /// Malformed JSON on a log line.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The hash chain is broken, meaning the log was modified after writing.
    #[error("integrity check failed at line {line}: expected hash {expected}, got {actual}")]
    IntegrityViolation {
        line: usize,
        expected: String,
        actual: String,
    },
}
