// event.rs — Audit event structure.
//
// One event per boundary decision. The event records what was decided and
// why, never the data itself: payloads appear only as content hashes and
// tag lists. `previous_hash` is filled in by the writer thread, not by
// callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_policy::{Boundary, RuleAction};

/// Which half of a tool interaction an event belongs to.
///
/// Tool calls produce two events sharing a `correlation_id`: one for the
/// outgoing request and one for the returning response. Decisions with no
/// paired counterpart (input scans, output checks) use `Single`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPhase {
    Request,
    Response,
    Single,
}

/// A single audited enforcement decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique identifier for this event.
    pub event_id: Uuid,
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
    /// Boundary at which the decision was made.
    pub boundary: Boundary,
    /// What the policy engine decided.
    pub action: RuleAction,
    /// Human-readable explanation of the decision.
    pub reason: String,
    /// Name of the policy rule that matched, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<String>,
    /// Agent the decision applies to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Agent receiving the data, for agent-to-agent messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_agent_id: Option<String>,
    /// Tool involved, for action-boundary decisions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Request or response side of a tool call.
    pub phase: BoundaryPhase,
    /// Shared id linking the request and response events of one tool call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
    /// Sensitivity tags attached to the classified payload.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_tags: Vec<String>,
    /// SHA-256 of the payload the decision was made about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Session the interaction belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Names of response fields removed by contract enforcement.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stripped_fields: Vec<String>,
    /// Hash of the previous log line. Empty string for the first event.
    #[serde(default)]
    pub previous_hash: String,
}

impl AuditEvent {
    /// Create an event for a decision at the given boundary.
    pub fn new(boundary: Boundary, action: RuleAction, reason: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            boundary,
            action,
            reason: reason.into(),
            matched_rule: None,
            agent_id: None,
            destination_agent_id: None,
            tool_name: None,
            phase: BoundaryPhase::Single,
            correlation_id: None,
            data_tags: Vec::new(),
            content_hash: None,
            session_id: None,
            stripped_fields: Vec::new(),
            previous_hash: String::new(),
        }
    }

    pub fn with_rule(mut self, rule_name: impl Into<String>) -> Self {
        self.matched_rule = Some(rule_name.into());
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_destination(mut self, agent_id: impl Into<String>) -> Self {
        self.destination_agent_id = Some(agent_id.into());
        self
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_phase(mut self, phase: BoundaryPhase, correlation_id: Uuid) -> Self {
        self.phase = phase;
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.data_tags = tags;
        self
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_stripped_fields(mut self, fields: Vec<String>) -> Self {
        self.stripped_fields = fields;
        self
    }

    /// Serialize to a canonical JSON line for hashing and storage.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_defaults_to_single_phase() {
        let event = AuditEvent::new(Boundary::Input, RuleAction::Allow, "no rule matched");
        assert_eq!(event.phase, BoundaryPhase::Single);
        assert!(event.correlation_id.is_none());
        assert!(event.previous_hash.is_empty());
    }

    #[test]
    fn builder_sets_fields() {
        let corr = Uuid::new_v4();
        let event = AuditEvent::new(Boundary::Action, RuleAction::Block, "blocked")
            .with_agent("support-bot")
            .with_tool("send_email")
            .with_rule("no-pii-email")
            .with_phase(BoundaryPhase::Request, corr)
            .with_tags(vec!["personal.financial".to_string()])
            .with_session("sess-1");
        assert_eq!(event.agent_id.as_deref(), Some("support-bot"));
        assert_eq!(event.tool_name.as_deref(), Some("send_email"));
        assert_eq!(event.matched_rule.as_deref(), Some("no-pii-email"));
        assert_eq!(event.phase, BoundaryPhase::Request);
        assert_eq!(event.correlation_id, Some(corr));
    }

    #[test]
    fn serialization_roundtrip() {
        let event = AuditEvent::new(Boundary::Output, RuleAction::Redact, "redacted pii")
            .with_tags(vec!["personal.pii.email".to_string()])
            .with_content_hash("abc123");
        let line = event.to_json_line().unwrap();
        let back: AuditEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(back.event_id, event.event_id);
        assert_eq!(back.action, RuleAction::Redact);
        assert_eq!(back.data_tags, vec!["personal.pii.email"]);
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let event = AuditEvent::new(Boundary::Input, RuleAction::Allow, "ok");
        let line = event.to_json_line().unwrap();
        assert!(!line.contains("matched_rule"));
        assert!(!line.contains("tool_name"));
        assert!(!line.contains("data_tags"));
        assert!(!line.contains("stripped_fields"));
    }
}
