// error.rs — Error types for capability delegation.
//
// Every variant maps to a reason a gated action must be denied. The
// boundary layer resolves these into block decisions with the variant's
// message as the reason string.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised while validating or exercising a capability token.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// No token with this id exists.
    #[error("capability token {0} is unknown")]
    UnknownToken(Uuid),

    /// The token was explicitly revoked.
    #[error("capability token {0} has been revoked")]
    Revoked(Uuid),

    /// The token's TTL has elapsed.
    #[error("capability token {0} has expired")]
    Expired(Uuid),

    /// The caller is not the agent the token was issued to.
    #[error("capability token {token} is not bound to agent '{agent_id}'")]
    AgentMismatch { token: Uuid, agent_id: String },

    /// The call targets a different tool than the token was issued for.
    #[error("capability token {token} is not bound to tool '{tool_name}'")]
    ToolMismatch { token: Uuid, tool_name: String },

    /// The token does not grant the requested action.
    #[error("capability token {token} does not grant action '{action}'")]
    ActionNotGranted { token: Uuid, action: String },

    /// The secret backend could not produce the named secret. The gated
    /// action fails closed.
    #[error("secret '{name}' unavailable: {message}")]
    SecretUnavailable { name: String, message: String },
}
