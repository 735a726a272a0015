// contract.rs — Tool contracts: the declared data shape a tool may handle.
//
// A contract declares which request tags a tool accepts, which response
// fields it may return, and optionally a capability-gated credential the
// tool needs. Contracts are loaded at startup/reload and read-only during
// requests; the directory hot-swaps whole snapshots the same way the rule
// set does.
//
// A tool without a contract does not exist as far as the action boundary is
// concerned (closed world).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PolicyError;
use crate::tag::first_uncovered;

/// A credential a tool needs, delegated via a short-lived capability token
/// rather than handed over raw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRequirement {
    /// Name of the secret in the secret backend (e.g., "smtp_password").
    pub secret_name: String,

    /// Actions the issued token authorizes (e.g., ["send"]).
    pub actions: Vec<String>,

    /// Token lifetime in seconds.
    pub ttl_secs: i64,
}

/// The declared input/output shape one tool is authorized to handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolContract {
    /// Tool this contract describes.
    pub tool_name: String,

    /// Tags the tool may receive in requests (hierarchical; a parent tag
    /// admits all descendants).
    #[serde(default)]
    pub allowed_request_tags: Vec<String>,

    /// Top-level response fields the tool may return. Anything else is
    /// stripped before the response reaches the agent.
    #[serde(default)]
    pub allowed_response_fields: Vec<String>,

    /// Credential delegated to the tool via a capability token, if any.
    #[serde(default)]
    pub credential: Option<CredentialRequirement>,
}

impl ToolContract {
    /// First request tag not admitted by this contract, if any.
    pub fn first_disallowed_tag<'a>(&self, tags: &'a [String]) -> Option<&'a str> {
        first_uncovered(tags, &self.allowed_request_tags)
    }

    /// Whether a response field may be returned to the agent.
    pub fn response_field_allowed(&self, field: &str) -> bool {
        self.allowed_response_fields.iter().any(|f| f == field)
    }
}

/// Hot-swappable directory of tool contracts, keyed by tool name.
pub struct ContractDirectory {
    snapshot: RwLock<Arc<HashMap<String, ToolContract>>>,
}

impl ContractDirectory {
    /// An empty directory: every tool is unknown.
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Validate a contract document set and install it atomically.
    /// On error the previous snapshot keeps serving.
    pub fn load(&self, contracts: Vec<ToolContract>) -> Result<(), PolicyError> {
        let mut map = HashMap::with_capacity(contracts.len());
        for contract in contracts {
            if map.contains_key(&contract.tool_name) {
                warn!(tool = %contract.tool_name, "contract reload rejected: duplicate tool");
                return Err(PolicyError::DuplicateTool(contract.tool_name));
            }
            map.insert(contract.tool_name.clone(), contract);
        }
        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(map);
        Ok(())
    }

    /// Look up the contract for a tool. None means the tool is undeclared
    /// and the action boundary must deny it.
    pub fn get(&self, tool_name: &str) -> Option<ToolContract> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(tool_name)
            .cloned()
    }
}

impl Default for ContractDirectory {
    fn default() -> Self {
        Self::new()
    }
}
