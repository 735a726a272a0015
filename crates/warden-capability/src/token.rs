// token.rs — Capability tokens and the token store.
//
// A token is mutable only via issue (create) and revoke (flip the flag).
// Expiry is computed from issued_at + ttl on every read, never stored.
// The store owns the tokens; callers hold ids and clones.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::CapabilityError;

/// A short-lived, scoped credential reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityToken {
    /// Token id — the only thing the tool-side caller holds.
    pub token_id: Uuid,

    /// Agent this token was issued to.
    pub agent_id: String,

    /// Tool this token is bound to.
    pub tool_name: String,

    /// Actions the token authorizes (e.g., ["send"]).
    pub actions: Vec<String>,

    /// When the token was issued.
    pub issued_at: DateTime<Utc>,

    /// Lifetime in seconds. Expiry is derived, never written.
    pub ttl_secs: i64,

    /// Set once by `revoke`; never cleared.
    pub revoked: bool,
}

impl CapabilityToken {
    /// Hard cutoff after which validation fails.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + Duration::seconds(self.ttl_secs)
    }

    /// Whether the TTL has elapsed.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at()
    }
}

/// Concurrent id-keyed store of capability tokens.
///
/// Mutation is fine-grained per token; there is no global lock held across
/// validation I/O because validation is pure in-memory computation.
pub struct TokenStore {
    tokens: Mutex<HashMap<Uuid, CapabilityToken>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a new token bound to (agent, tool) with the given actions and TTL.
    pub fn issue(
        &self,
        agent_id: &str,
        tool_name: &str,
        actions: Vec<String>,
        ttl_secs: i64,
    ) -> CapabilityToken {
        let token = CapabilityToken {
            token_id: Uuid::new_v4(),
            agent_id: agent_id.to_string(),
            tool_name: tool_name.to_string(),
            actions,
            issued_at: Utc::now(),
            ttl_secs,
            revoked: false,
        };
        debug!(token = %token.token_id, agent = agent_id, tool = tool_name, "capability token issued");
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.insert(token.token_id, token.clone());
        token
    }

    /// Validate a token for the given caller, returning the granted actions.
    ///
    /// Fails for unknown, revoked, or expired tokens and for any mismatch
    /// with the bound agent or tool.
    pub fn validate(
        &self,
        token_id: Uuid,
        agent_id: &str,
        tool_name: &str,
    ) -> Result<Vec<String>, CapabilityError> {
        let tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        let token = tokens
            .get(&token_id)
            .ok_or(CapabilityError::UnknownToken(token_id))?;

        if token.revoked {
            return Err(CapabilityError::Revoked(token_id));
        }
        if token.is_expired() {
            return Err(CapabilityError::Expired(token_id));
        }
        if token.agent_id != agent_id {
            return Err(CapabilityError::AgentMismatch {
                token: token_id,
                agent_id: agent_id.to_string(),
            });
        }
        if token.tool_name != tool_name {
            return Err(CapabilityError::ToolMismatch {
                token: token_id,
                tool_name: tool_name.to_string(),
            });
        }
        Ok(token.actions.clone())
    }

    /// Revoke a token. Idempotent on an already-revoked token.
    pub fn revoke(&self, token_id: Uuid) -> Result<(), CapabilityError> {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        let token = tokens
            .get_mut(&token_id)
            .ok_or(CapabilityError::UnknownToken(token_id))?;
        token.revoked = true;
        debug!(token = %token_id, "capability token revoked");
        Ok(())
    }

    /// Look up a token by id.
    pub fn get(&self, token_id: Uuid) -> Option<CapabilityToken> {
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&token_id)
            .cloned()
    }

    /// Drop tokens whose TTL elapsed. Returns how many were removed.
    /// Expiry is also checked lazily on validate, so this sweep is purely
    /// a memory reclamation pass.
    pub fn purge_expired(&self) -> usize {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        let before = tokens.len();
        tokens.retain(|_, token| !token.is_expired());
        before - tokens.len()
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TokenStore {
        TokenStore::new()
    }

    #[test]
    fn issue_then_validate_succeeds() {
        let store = store();
        let token = store.issue("support-bot", "send_email", vec!["send".to_string()], 60);
        let actions = store
            .validate(token.token_id, "support-bot", "send_email")
            .unwrap();
        assert_eq!(actions, vec!["send".to_string()]);
    }

    #[test]
    fn unknown_token_fails() {
        let result = store().validate(Uuid::new_v4(), "a", "t");
        assert!(matches!(result, Err(CapabilityError::UnknownToken(_))));
    }

    #[test]
    fn revoked_token_fails_before_expiry() {
        let store = store();
        let token = store.issue("a", "t", vec![], 3600);
        store.revoke(token.token_id).unwrap();
        let result = store.validate(token.token_id, "a", "t");
        assert!(matches!(result, Err(CapabilityError::Revoked(_))));
    }

    #[test]
    fn expired_token_fails() {
        let store = store();
        // Zero TTL: expires_at == issued_at, so any later instant is expired.
        let token = store.issue("a", "t", vec![], 0);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let result = store.validate(token.token_id, "a", "t");
        assert!(matches!(result, Err(CapabilityError::Expired(_))));
    }

    #[test]
    fn agent_mismatch_fails() {
        let store = store();
        let token = store.issue("a", "t", vec![], 3600);
        let result = store.validate(token.token_id, "someone-else", "t");
        assert!(matches!(result, Err(CapabilityError::AgentMismatch { .. })));
    }

    #[test]
    fn tool_mismatch_fails() {
        let store = store();
        let token = store.issue("a", "t", vec![], 3600);
        let result = store.validate(token.token_id, "a", "other-tool");
        assert!(matches!(result, Err(CapabilityError::ToolMismatch { .. })));
    }

    #[test]
    fn expiry_is_derived_not_stored() {
        let store = store();
        let token = store.issue("a", "t", vec![], 120);
        assert_eq!(
            token.expires_at(),
            token.issued_at + Duration::seconds(120)
        );
        assert!(!token.is_expired());
    }

    #[test]
    fn purge_removes_only_expired() {
        let store = store();
        store.issue("a", "t", vec![], 0);
        let live = store.issue("a", "t", vec![], 3600);
        std::thread::sleep(std::time::Duration::from_millis(5));

        assert_eq!(store.purge_expired(), 1);
        assert!(store.get(live.token_id).is_some());
    }

    #[test]
    fn revoke_unknown_token_fails() {
        let result = store().revoke(Uuid::new_v4());
        assert!(matches!(result, Err(CapabilityError::UnknownToken(_))));
    }
}
