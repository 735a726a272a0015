// request.rs — Approval request data model and state machine.
//
// The lifecycle is deliberately small:
//   Pending → Approved | Denied   (explicit human resolution)
//   Pending → Expired             (TTL elapsed; resolves to the store's
//                                  configured default, normally denied)
//
// Resolved states are terminal. Requests are never deleted.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use warden_policy::Boundary;

/// The lifecycle state of an approval request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ApprovalState {
    /// Awaiting a human decision.
    Pending,

    /// A human approved the paused action.
    Approved { approver: String },

    /// A human denied the paused action.
    Denied { approver: String },

    /// The TTL elapsed before anyone decided. Whether this grants or
    /// denies is the store's configured default (normally deny).
    Expired { granted: bool },
}

impl ApprovalState {
    /// Whether this state is terminal.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, ApprovalState::Pending)
    }

    /// Whether transitioning from this state to `next` is valid.
    /// Only Pending may move, and only to a terminal state.
    pub fn can_transition_to(&self, next: &ApprovalState) -> bool {
        matches!(self, ApprovalState::Pending) && next.is_resolved()
    }
}

impl fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalState::Pending => write!(f, "pending"),
            ApprovalState::Approved { .. } => write!(f, "approved"),
            ApprovalState::Denied { .. } => write!(f, "denied"),
            ApprovalState::Expired { .. } => write!(f, "expired"),
        }
    }
}

/// A paused boundary decision awaiting resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique request id, returned to the caller that hit the gate.
    pub request_id: Uuid,

    /// Agent whose crossing was paused.
    pub agent_id: String,

    /// Boundary the crossing happened at.
    pub boundary: Boundary,

    /// Tool involved, for action-boundary requests.
    pub tool_name: Option<String>,

    /// SHA-256 of the paused payload. Part of the dedup key; the raw
    /// payload is never stored here.
    pub content_hash: String,

    /// Why the crossing was paused (the policy decision's reason).
    pub reason: String,

    /// When the request was created.
    pub created_at: DateTime<Utc>,

    /// Lifetime in seconds; expiry is derived, never stored.
    pub ttl_secs: i64,

    /// Current lifecycle state.
    pub state: ApprovalState,

    /// When the request left Pending, if it has.
    pub resolved_at: Option<DateTime<Utc>>,

    /// Optional approver comment recorded at resolution.
    pub comment: Option<String>,
}

impl ApprovalRequest {
    /// Hard cutoff after which the request auto-resolves.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::seconds(self.ttl_secs)
    }

    /// Whether the TTL has elapsed while still pending.
    pub fn is_overdue(&self) -> bool {
        self.state == ApprovalState::Pending && Utc::now() > self.expires_at()
    }

    /// Whether this request, in its current state, grants the paused action.
    pub fn is_granted(&self) -> bool {
        matches!(
            self.state,
            ApprovalState::Approved { .. } | ApprovalState::Expired { granted: true }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(state: ApprovalState, ttl_secs: i64) -> ApprovalRequest {
        ApprovalRequest {
            request_id: Uuid::new_v4(),
            agent_id: "support-bot".to_string(),
            boundary: Boundary::Action,
            tool_name: Some("send_email".to_string()),
            content_hash: "abc123".to_string(),
            reason: "rule 'gate': requires approval".to_string(),
            created_at: Utc::now(),
            ttl_secs,
            state,
            resolved_at: None,
            comment: None,
        }
    }

    #[test]
    fn pending_can_reach_all_terminal_states() {
        let pending = ApprovalState::Pending;
        assert!(pending.can_transition_to(&ApprovalState::Approved {
            approver: "alice".to_string()
        }));
        assert!(pending.can_transition_to(&ApprovalState::Denied {
            approver: "alice".to_string()
        }));
        assert!(pending.can_transition_to(&ApprovalState::Expired { granted: false }));
    }

    #[test]
    fn resolved_states_are_terminal() {
        let approved = ApprovalState::Approved {
            approver: "alice".to_string(),
        };
        assert!(!approved.can_transition_to(&ApprovalState::Denied {
            approver: "bob".to_string()
        }));
        assert!(!approved.can_transition_to(&ApprovalState::Pending));
    }

    #[test]
    fn overdue_only_while_pending() {
        let mut r = request(ApprovalState::Pending, 0);
        r.created_at = Utc::now() - Duration::seconds(10);
        assert!(r.is_overdue());

        r.state = ApprovalState::Denied {
            approver: "alice".to_string(),
        };
        assert!(!r.is_overdue());
    }

    #[test]
    fn granted_matrix() {
        assert!(!request(ApprovalState::Pending, 60).is_granted());
        assert!(request(
            ApprovalState::Approved {
                approver: "alice".to_string()
            },
            60
        )
        .is_granted());
        assert!(!request(
            ApprovalState::Denied {
                approver: "alice".to_string()
            },
            60
        )
        .is_granted());
        assert!(!request(ApprovalState::Expired { granted: false }, 60).is_granted());
        assert!(request(ApprovalState::Expired { granted: true }, 60).is_granted());
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&ApprovalState::Pending).unwrap();
        assert!(json.contains("\"pending\""));
        let json = serde_json::to_string(&ApprovalState::Approved {
            approver: "alice".to_string(),
        })
        .unwrap();
        assert!(json.contains("\"approved\""));
    }
}
