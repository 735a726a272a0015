// store.rs — Concurrent approval-request store with dedup and TTL sweep.
//
// The store is keyed by request id; a secondary index maps dedup keys
// (agent, tool-or-boundary, content hash) to the pending request for that
// key. TTL expiry is applied lazily on every read and in bulk by
// `sweep_expired` — there is no per-request timer.
//
// Resolution is single-writer: the first approve/deny (or the sweep) wins,
// every later attempt gets AlreadyResolved.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use warden_policy::Boundary;

use crate::error::ApprovalError;
use crate::request::{ApprovalRequest, ApprovalState};

/// Store-wide behavior knobs.
#[derive(Debug, Clone)]
pub struct ApprovalStoreConfig {
    /// Lifetime of a new request, in seconds.
    pub ttl_secs: i64,

    /// Window within which identical requests collapse into one, in seconds.
    pub dedup_window_secs: i64,

    /// Whether an expired request grants the paused action. Deny by
    /// default; granting on timeout is an explicit opt-in.
    pub expired_grants: bool,
}

impl Default for ApprovalStoreConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            dedup_window_secs: 300,
            expired_grants: false,
        }
    }
}

/// Everything needed to open a new approval request.
#[derive(Debug, Clone)]
pub struct CreateApproval {
    pub agent_id: String,
    pub boundary: Boundary,
    pub tool_name: Option<String>,
    pub content_hash: String,
    pub reason: String,
}

/// Filter for `list`.
#[derive(Debug, Clone, Default)]
pub struct ApprovalFilter {
    pub agent_id: Option<String>,
    pub tool_name: Option<String>,
    /// Match on the state name ("pending", "approved", "denied", "expired").
    pub state: Option<String>,
}

#[derive(Hash, PartialEq, Eq, Clone)]
struct DedupKey {
    agent_id: String,
    scope: String, // tool name for action requests, boundary name otherwise
    content_hash: String,
}

/// Both maps live behind one mutex: the dedup lookup and the insert must be
/// a single atomic step, or two racing identical creates each mint their
/// own request.
#[derive(Default)]
struct StoreState {
    requests: HashMap<Uuid, ApprovalRequest>,
    dedup: HashMap<DedupKey, Uuid>,
}

/// Concurrent store of approval requests.
pub struct ApprovalStore {
    config: ApprovalStoreConfig,
    state: Mutex<StoreState>,
}

impl ApprovalStore {
    pub fn new(config: ApprovalStoreConfig) -> Self {
        Self {
            config,
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ApprovalStoreConfig::default())
    }

    /// Open an approval request, or return the existing pending one when an
    /// identical request sits inside the dedup window.
    pub fn create(&self, params: CreateApproval) -> ApprovalRequest {
        let key = DedupKey {
            agent_id: params.agent_id.clone(),
            scope: params
                .tool_name
                .clone()
                .unwrap_or_else(|| params.boundary.to_string()),
            content_hash: params.content_hash.clone(),
        };

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        // Dedup: an identical pending request within the window wins. The
        // lock stays held through the insert below, so concurrent identical
        // creates serialize on this lookup.
        if let Some(existing_id) = state.dedup.get(&key).copied() {
            if let Some(existing) = state.requests.get_mut(&existing_id) {
                Self::expire_if_overdue(existing, self.config.expired_grants);
                let window = Duration::seconds(self.config.dedup_window_secs);
                if existing.state == ApprovalState::Pending
                    && Utc::now() < existing.created_at + window
                {
                    debug!(request = %existing_id, "approval request deduplicated");
                    return existing.clone();
                }
            }
        }

        let request = ApprovalRequest {
            request_id: Uuid::new_v4(),
            agent_id: params.agent_id,
            boundary: params.boundary,
            tool_name: params.tool_name,
            content_hash: params.content_hash,
            reason: params.reason,
            created_at: Utc::now(),
            ttl_secs: self.config.ttl_secs,
            state: ApprovalState::Pending,
            resolved_at: None,
            comment: None,
        };
        info!(request = %request.request_id, agent = %request.agent_id, "approval request created");

        state.dedup.insert(key, request.request_id);
        state.requests.insert(request.request_id, request.clone());
        request
    }

    /// Approve a pending request. First resolution wins.
    pub fn approve(
        &self,
        id: Uuid,
        approver: &str,
        comment: Option<String>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        self.resolve(
            id,
            ApprovalState::Approved {
                approver: approver.to_string(),
            },
            comment,
        )
    }

    /// Deny a pending request. First resolution wins.
    pub fn deny(
        &self,
        id: Uuid,
        approver: &str,
        comment: Option<String>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        self.resolve(
            id,
            ApprovalState::Denied {
                approver: approver.to_string(),
            },
            comment,
        )
    }

    /// Look up a request, applying lazy TTL expiry first.
    pub fn get(&self, id: Uuid) -> Option<ApprovalRequest> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let request = state.requests.get_mut(&id)?;
        Self::expire_if_overdue(request, self.config.expired_grants);
        Some(request.clone())
    }

    /// List requests matching the filter, newest first.
    pub fn list(&self, filter: &ApprovalFilter) -> Vec<ApprovalRequest> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut matched: Vec<ApprovalRequest> = state
            .requests
            .values_mut()
            .map(|request| {
                Self::expire_if_overdue(request, self.config.expired_grants);
                request.clone()
            })
            .filter(|request| {
                filter
                    .agent_id
                    .as_ref()
                    .is_none_or(|agent| *agent == request.agent_id)
                    && filter
                        .tool_name
                        .as_ref()
                        .is_none_or(|tool| Some(tool) == request.tool_name.as_ref())
                    && filter
                        .state
                        .as_ref()
                        .is_none_or(|state| *state == request.state.to_string())
            })
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched
    }

    /// Resolve every overdue pending request. Returns how many expired.
    pub fn sweep_expired(&self) -> usize {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut expired = 0;
        for request in state.requests.values_mut() {
            if request.is_overdue() {
                Self::expire_if_overdue(request, self.config.expired_grants);
                expired += 1;
            }
        }
        expired
    }

    fn resolve(
        &self,
        id: Uuid,
        next: ApprovalState,
        comment: Option<String>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let request = state
            .requests
            .get_mut(&id)
            .ok_or(ApprovalError::NotFound(id))?;

        // An overdue request resolves to the expiry default before any
        // human decision lands.
        Self::expire_if_overdue(request, self.config.expired_grants);

        if !request.state.can_transition_to(&next) {
            return Err(ApprovalError::AlreadyResolved {
                id,
                state: request.state.to_string(),
            });
        }
        request.state = next;
        request.resolved_at = Some(Utc::now());
        request.comment = comment;
        info!(request = %id, state = %request.state, "approval request resolved");
        Ok(request.clone())
    }

    fn expire_if_overdue(request: &mut ApprovalRequest, expired_grants: bool) {
        if request.is_overdue() {
            request.state = ApprovalState::Expired {
                granted: expired_grants,
            };
            request.resolved_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(hash: &str) -> CreateApproval {
        CreateApproval {
            agent_id: "support-bot".to_string(),
            boundary: Boundary::Action,
            tool_name: Some("send_email".to_string()),
            content_hash: hash.to_string(),
            reason: "needs a human".to_string(),
        }
    }

    #[test]
    fn create_then_approve() {
        let store = ApprovalStore::with_defaults();
        let request = store.create(params("h1"));
        assert_eq!(request.state, ApprovalState::Pending);

        let resolved = store
            .approve(request.request_id, "alice", Some("looks fine".to_string()))
            .unwrap();
        assert!(resolved.is_granted());
        assert_eq!(resolved.comment.as_deref(), Some("looks fine"));
    }

    #[test]
    fn identical_requests_dedup_to_one_id() {
        let store = ApprovalStore::with_defaults();
        let first = store.create(params("same-hash"));
        let second = store.create(params("same-hash"));
        assert_eq!(first.request_id, second.request_id);
    }

    #[test]
    fn racing_identical_creates_collapse_to_one_id() {
        use std::collections::HashSet;
        use std::sync::{Arc, Barrier};

        for _ in 0..100 {
            let store = Arc::new(ApprovalStore::with_defaults());
            let barrier = Arc::new(Barrier::new(8));
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = Arc::clone(&store);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        store.create(params("same-hash")).request_id
                    })
                })
                .collect();
            let ids: HashSet<Uuid> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            assert_eq!(ids.len(), 1, "racing creates produced {ids:?}");
        }
    }

    #[test]
    fn different_content_creates_new_request() {
        let store = ApprovalStore::with_defaults();
        let first = store.create(params("hash-a"));
        let second = store.create(params("hash-b"));
        assert_ne!(first.request_id, second.request_id);
    }

    #[test]
    fn resolved_request_is_not_dedup_target() {
        let store = ApprovalStore::with_defaults();
        let first = store.create(params("h"));
        store.deny(first.request_id, "alice", None).unwrap();

        let second = store.create(params("h"));
        assert_ne!(first.request_id, second.request_id);
    }

    #[test]
    fn double_resolution_rejected() {
        let store = ApprovalStore::with_defaults();
        let request = store.create(params("h"));
        store.approve(request.request_id, "alice", None).unwrap();

        let result = store.deny(request.request_id, "bob", None);
        assert!(matches!(
            result,
            Err(ApprovalError::AlreadyResolved { .. })
        ));
    }

    #[test]
    fn resolve_unknown_request_fails() {
        let store = ApprovalStore::with_defaults();
        let result = store.approve(Uuid::new_v4(), "alice", None);
        assert!(matches!(result, Err(ApprovalError::NotFound(_))));
    }

    #[test]
    fn overdue_request_expires_lazily_on_get() {
        let store = ApprovalStore::new(ApprovalStoreConfig {
            ttl_secs: 0,
            ..Default::default()
        });
        let request = store.create(params("h"));
        std::thread::sleep(std::time::Duration::from_millis(5));

        let fetched = store.get(request.request_id).unwrap();
        assert_eq!(fetched.state, ApprovalState::Expired { granted: false });
        assert!(!fetched.is_granted());
    }

    #[test]
    fn approve_after_expiry_is_rejected() {
        let store = ApprovalStore::new(ApprovalStoreConfig {
            ttl_secs: 0,
            ..Default::default()
        });
        let request = store.create(params("h"));
        std::thread::sleep(std::time::Duration::from_millis(5));

        let result = store.approve(request.request_id, "alice", None);
        assert!(matches!(
            result,
            Err(ApprovalError::AlreadyResolved { .. })
        ));
    }

    #[test]
    fn sweep_resolves_overdue_requests() {
        let store = ApprovalStore::new(ApprovalStoreConfig {
            ttl_secs: 0,
            dedup_window_secs: 0,
            expired_grants: false,
        });
        store.create(params("h1"));
        store.create(params("h2"));
        std::thread::sleep(std::time::Duration::from_millis(5));

        assert_eq!(store.sweep_expired(), 2);
        assert_eq!(store.sweep_expired(), 0); // already resolved
    }

    #[test]
    fn expired_grants_config_is_honored() {
        let store = ApprovalStore::new(ApprovalStoreConfig {
            ttl_secs: 0,
            dedup_window_secs: 0,
            expired_grants: true,
        });
        let request = store.create(params("h"));
        std::thread::sleep(std::time::Duration::from_millis(5));

        let fetched = store.get(request.request_id).unwrap();
        assert!(fetched.is_granted());
    }

    #[test]
    fn list_filters_by_state_and_agent() {
        let store = ApprovalStore::with_defaults();
        let a = store.create(params("h1"));
        let mut other = params("h2");
        other.agent_id = "billing-bot".to_string();
        store.create(other);
        store.approve(a.request_id, "alice", None).unwrap();

        let pending = store.list(&ApprovalFilter {
            state: Some("pending".to_string()),
            ..Default::default()
        });
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].agent_id, "billing-bot");

        let support = store.list(&ApprovalFilter {
            agent_id: Some("support-bot".to_string()),
            ..Default::default()
        });
        assert_eq!(support.len(), 1);
        assert_eq!(support[0].state.to_string(), "approved");
    }

    #[test]
    fn requests_are_never_deleted() {
        let store = ApprovalStore::with_defaults();
        let request = store.create(params("h"));
        store.deny(request.request_id, "alice", None).unwrap();
        // Still retrievable after resolution, for audit.
        assert!(store.get(request.request_id).is_some());
    }
}
