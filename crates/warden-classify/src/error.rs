// error.rs — Error types for the classification subsystem.
//
// Uses `thiserror` to derive the standard Rust `Error` trait automatically.
// Note that a detector failing *during a scan* is not surfaced through this
// type: classify calls never fail as a whole, they return a degraded report.

use thiserror::Error;

/// Errors that can occur while building the detector set.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// A detector spec carried a pattern that does not compile.
    #[error("detector '{name}' has an invalid pattern: {source}")]
    InvalidPattern {
        name: String,
        source: regex::Error,
    },

    /// A detector spec carried an empty or malformed tag.
    #[error("detector '{name}' has an invalid tag '{tag}'")]
    InvalidTag { name: String, tag: String },

    /// Two detector specs share the same name.
    #[error("duplicate detector name '{0}'")]
    DuplicateDetector(String),
}

/// A scan-time failure raised by an individual detector.
///
/// Collected into the classifier report rather than propagated, so one
/// broken detector cannot take down the whole classify call.
#[derive(Debug, Error)]
#[error("detector scan failed: {message}")]
pub struct DetectorError {
    pub message: String,
}

impl DetectorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
