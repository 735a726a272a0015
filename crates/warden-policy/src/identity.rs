// identity.rs — Agent identities: who may call what, with which clearance.
//
// An identity declares the tools an agent may call (glob wildcards
// supported, "*" means all) and the data tags its clearance covers
// (hierarchical, "*" means everything). An agent without an identity
// document does not exist: unknown agent ids are always denied.
//
// Invalid glob patterns never match (fail-closed, not fail-open).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PolicyError;
use crate::tag::first_uncovered;

/// One agent's identity document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentIdentity {
    /// Stable agent identifier (e.g., "support-bot").
    pub agent_id: String,

    /// Tool names or glob patterns this agent may call ("*" for all,
    /// "send_*" for a family).
    #[serde(default)]
    pub allowed_tools: Vec<String>,

    /// Data tags this agent is cleared to handle (hierarchical, "*" for
    /// full clearance).
    #[serde(default)]
    pub clearance_tags: Vec<String>,
}

impl AgentIdentity {
    /// Whether this agent may call the named tool.
    pub fn permits_tool(&self, tool_name: &str) -> bool {
        self.allowed_tools.iter().any(|entry| {
            if entry == "*" || entry == tool_name {
                return true;
            }
            match glob::Pattern::new(entry) {
                Ok(pattern) => pattern.matches(tool_name),
                // Invalid patterns never match.
                Err(_) => false,
            }
        })
    }

    /// First tag not covered by this agent's clearance, if any.
    pub fn first_uncleared_tag<'a>(&self, tags: &'a [String]) -> Option<&'a str> {
        first_uncovered(tags, &self.clearance_tags)
    }
}

/// Hot-swappable directory of agent identities, keyed by agent id.
pub struct IdentityDirectory {
    snapshot: RwLock<Arc<HashMap<String, AgentIdentity>>>,
}

impl IdentityDirectory {
    /// An empty directory: every agent is unknown, everything is denied.
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Validate an identity document set and install it atomically.
    /// On error the previous snapshot keeps serving.
    pub fn load(&self, identities: Vec<AgentIdentity>) -> Result<(), PolicyError> {
        let mut map = HashMap::with_capacity(identities.len());
        for identity in identities {
            if map.contains_key(&identity.agent_id) {
                warn!(agent = %identity.agent_id, "identity reload rejected: duplicate agent");
                return Err(PolicyError::DuplicateAgent(identity.agent_id));
            }
            map.insert(identity.agent_id.clone(), identity);
        }
        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(map);
        Ok(())
    }

    /// Look up an agent. None means unknown and must be denied.
    pub fn get(&self, agent_id: &str) -> Option<AgentIdentity> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(agent_id)
            .cloned()
    }
}

impl Default for IdentityDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(agent: &str, tools: &[&str], clearance: &[&str]) -> AgentIdentity {
        AgentIdentity {
            agent_id: agent.to_string(),
            allowed_tools: tools.iter().map(|s| s.to_string()).collect(),
            clearance_tags: clearance.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn unknown_agent_returns_none() {
        let directory = IdentityDirectory::new();
        assert!(directory.get("support-bot").is_none());
    }

    #[test]
    fn exact_tool_match() {
        let id = identity("support-bot", &["send_email"], &[]);
        assert!(id.permits_tool("send_email"));
        assert!(!id.permits_tool("delete_user"));
    }

    #[test]
    fn wildcard_permits_all_tools() {
        let id = identity("admin-bot", &["*"], &[]);
        assert!(id.permits_tool("anything_at_all"));
    }

    #[test]
    fn glob_tool_families() {
        let id = identity("mail-bot", &["send_*"], &[]);
        assert!(id.permits_tool("send_email"));
        assert!(id.permits_tool("send_sms"));
        assert!(!id.permits_tool("read_inbox"));
    }

    #[test]
    fn invalid_glob_never_matches() {
        let id = identity("broken", &["[unclosed"], &[]);
        assert!(!id.permits_tool("[unclosed"));
        assert!(!id.permits_tool("anything"));
    }

    #[test]
    fn clearance_is_hierarchical() {
        let id = identity("support-bot", &[], &["personal.pii"]);
        let covered = vec!["personal.pii.email".to_string()];
        assert!(id.first_uncleared_tag(&covered).is_none());

        let uncovered = vec!["personal.financial".to_string()];
        assert_eq!(
            id.first_uncleared_tag(&uncovered),
            Some("personal.financial")
        );
    }

    #[test]
    fn wildcard_clearance_covers_everything() {
        let id = identity("root-bot", &[], &["*"]);
        let tags = vec!["secret.private_key".to_string(), "personal".to_string()];
        assert!(id.first_uncleared_tag(&tags).is_none());
    }

    #[test]
    fn duplicate_agent_rejected_and_previous_kept() {
        let directory = IdentityDirectory::new();
        directory
            .load(vec![identity("a", &["*"], &["*"])])
            .unwrap();

        let result = directory.load(vec![
            identity("b", &[], &[]),
            identity("b", &[], &[]),
        ]);
        assert!(matches!(result, Err(PolicyError::DuplicateAgent(_))));
        assert!(directory.get("a").is_some());
        assert!(directory.get("b").is_none());
    }

    #[test]
    fn identity_document_round_trip() {
        let json = r#"{
            "agent_id": "support-bot",
            "allowed_tools": ["send_email"],
            "clearance_tags": ["personal.pii.email"]
        }"#;
        let id: AgentIdentity = serde_json::from_str(json).unwrap();
        assert_eq!(id.agent_id, "support-bot");
        assert!(id.permits_tool("send_email"));
    }
}
