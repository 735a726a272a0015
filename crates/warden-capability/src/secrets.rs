// secrets.rs — Point-of-use secret resolution behind capability tokens.
//
// The broker is the only path from a token to a secret value. It validates
// the token, checks the requested action, resolves the secret through the
// backend, and hands it to a caller-supplied closure. The value never
// appears in a return type other than the closure argument, never in a log
// line, and never in a persisted field — only the closure's effect escapes.

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::error::CapabilityError;
use crate::token::TokenStore;

/// A secret value that refuses to display itself.
///
/// `Debug` and `Display` both render as `[redacted]`; the raw value is only
/// reachable through `expose()`, which the broker calls inside the
/// authorized closure.
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value. Only meaningful inside a broker-authorized closure.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

/// Pluggable secret resolution.
///
/// Implementations talk to whatever holds the real credentials (an env
/// table, a vault, a cloud secret manager). Resolution is the one
/// I/O-bound suspension point in capability delegation.
pub trait SecretBackend: Send + Sync {
    fn resolve(&self, name: &str) -> Result<SecretString, CapabilityError>;
}

/// In-memory backend for tests and single-process deployments.
pub struct StaticSecretBackend {
    secrets: std::collections::HashMap<String, String>,
}

impl StaticSecretBackend {
    pub fn new() -> Self {
        Self {
            secrets: std::collections::HashMap::new(),
        }
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

impl Default for StaticSecretBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretBackend for StaticSecretBackend {
    fn resolve(&self, name: &str) -> Result<SecretString, CapabilityError> {
        self.secrets
            .get(name)
            .map(|value| SecretString::new(value.clone()))
            .ok_or_else(|| CapabilityError::SecretUnavailable {
                name: name.to_string(),
                message: "not present in backend".to_string(),
            })
    }
}

/// Validates tokens and resolves secrets at the point of use.
pub struct CapabilityBroker {
    store: Arc<TokenStore>,
    backend: Box<dyn SecretBackend>,
}

impl CapabilityBroker {
    pub fn new(store: Arc<TokenStore>, backend: Box<dyn SecretBackend>) -> Self {
        Self { store, backend }
    }

    /// The token store this broker validates against.
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Run `f` with the named secret, provided the token authorizes
    /// `action` for this (agent, tool) pair.
    ///
    /// Any validation or resolution failure denies the gated action; the
    /// closure is then never invoked.
    pub fn with_secret<T>(
        &self,
        token_id: Uuid,
        agent_id: &str,
        tool_name: &str,
        action: &str,
        secret_name: &str,
        f: impl FnOnce(&SecretString) -> T,
    ) -> Result<T, CapabilityError> {
        let actions = self.store.validate(token_id, agent_id, tool_name)?;
        if !actions.iter().any(|a| a == action) {
            return Err(CapabilityError::ActionNotGranted {
                token: token_id,
                action: action.to_string(),
            });
        }
        let secret = self.backend.resolve(secret_name)?;
        debug!(token = %token_id, tool = tool_name, action, "secret resolved for gated action");
        Ok(f(&secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broker() -> CapabilityBroker {
        CapabilityBroker::new(
            Arc::new(TokenStore::new()),
            Box::new(StaticSecretBackend::new().with_secret("smtp_password", "hunter2")),
        )
    }

    #[test]
    fn secret_string_redacts_in_debug_and_display() {
        let secret = SecretString::new("hunter2");
        assert_eq!(format!("{:?}", secret), "[redacted]");
        assert_eq!(format!("{}", secret), "[redacted]");
    }

    #[test]
    fn with_secret_runs_closure_for_valid_token() {
        let broker = broker();
        let token = broker
            .store()
            .issue("support-bot", "send_email", vec!["send".to_string()], 60);

        let length = broker
            .with_secret(
                token.token_id,
                "support-bot",
                "send_email",
                "send",
                "smtp_password",
                |secret| secret.expose().len(),
            )
            .unwrap();
        // Only the effect of using the secret is observable.
        assert_eq!(length, 7);
    }

    #[test]
    fn ungranted_action_is_denied() {
        let broker = broker();
        let token = broker
            .store()
            .issue("support-bot", "send_email", vec!["send".to_string()], 60);

        let result = broker.with_secret(
            token.token_id,
            "support-bot",
            "send_email",
            "delete",
            "smtp_password",
            |_| (),
        );
        assert!(matches!(
            result,
            Err(CapabilityError::ActionNotGranted { .. })
        ));
    }

    #[test]
    fn revoked_token_never_reaches_backend() {
        let broker = broker();
        let token = broker
            .store()
            .issue("support-bot", "send_email", vec!["send".to_string()], 60);
        broker.store().revoke(token.token_id).unwrap();

        let mut invoked = false;
        let result = broker.with_secret(
            token.token_id,
            "support-bot",
            "send_email",
            "send",
            "smtp_password",
            |_| invoked = true,
        );
        assert!(matches!(result, Err(CapabilityError::Revoked(_))));
        assert!(!invoked);
    }

    #[test]
    fn missing_secret_fails_closed() {
        let broker = broker();
        let token = broker
            .store()
            .issue("support-bot", "send_email", vec!["send".to_string()], 60);

        let result = broker.with_secret(
            token.token_id,
            "support-bot",
            "send_email",
            "send",
            "no_such_secret",
            |_| (),
        );
        assert!(matches!(
            result,
            Err(CapabilityError::SecretUnavailable { .. })
        ));
    }

    #[test]
    fn error_messages_never_contain_the_value() {
        let broker = broker();
        let token = broker
            .store()
            .issue("support-bot", "send_email", vec!["send".to_string()], 60);
        let err = broker
            .with_secret(
                token.token_id,
                "other-bot",
                "send_email",
                "send",
                "smtp_password",
                |_| (),
            )
            .unwrap_err();
        assert!(!err.to_string().contains("hunter2"));
    }
}
