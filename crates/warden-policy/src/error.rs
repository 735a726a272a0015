// error.rs — Config validation errors for the policy subsystem.
//
// All variants here mean "reject the document" — a directory or rule set
// that fails validation is never installed, and whatever snapshot was
// serving before the failed load keeps serving.

use thiserror::Error;

/// Errors raised while validating policy configuration documents.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Two rules share the same name.
    #[error("invalid rule set: duplicate rule name '{0}'")]
    DuplicateRuleName(String),

    /// A rule condition carries an empty or malformed tag.
    #[error("invalid rule '{rule}': malformed data tag '{tag}'")]
    MalformedTag { rule: String, tag: String },

    /// The configured default action would fail open.
    #[error("invalid rule set: default action '{0}' would fail open; the default must be block or require_approval")]
    DefaultNotClosed(String),

    /// Two tool contracts declare the same tool.
    #[error("invalid contract set: duplicate tool '{0}'")]
    DuplicateTool(String),

    /// Two identity documents declare the same agent.
    #[error("invalid identity set: duplicate agent '{0}'")]
    DuplicateAgent(String),
}
