// action.rs — Action boundary interceptor.
//
// Tool calls cross the action boundary twice: the outgoing request and the
// returning response. Both halves are intercepted, audited as separate
// events sharing a correlation id, and recorded in order.
//
// The request side runs the full check ladder: tool contract exists, agent
// identity exists, identity permits the tool, clearance covers the tags,
// contract admits the tags, then policy. Every denial names the exact
// check that failed, so a clearance miss is reported as a clearance miss
// even when later checks would also have failed.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;
use warden_approval::{ApprovalStore, CreateApproval};
use warden_audit::{AuditEvent, AuditLog, BoundaryPhase};
use warden_capability::TokenStore;
use warden_classify::{Classifier, Detection, Payload};
use warden_policy::{
    Boundary, ContractDirectory, DecisionContext, IdentityDirectory, PolicyEngine, RuleAction,
};

use crate::pipeline::{content_hash, effective_tags, redact_payload, redact_text};

/// Outcome of intercepting an outgoing tool request.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub action: RuleAction,
    /// Payload cleared to reach the tool. `None` when blocked or pending.
    pub payload: Option<Payload>,
    /// Approval request to await, when the action is `require_approval`.
    pub request_id: Option<Uuid>,
    /// Capability token reference for a credentialed tool. The tool
    /// presents this id to the broker; the raw secret never appears here.
    pub token_id: Option<Uuid>,
    /// Shared by this request's audit event and its response's.
    pub correlation_id: Uuid,
    pub detections: Vec<Detection>,
    pub reason: String,
}

/// Outcome of intercepting a tool response.
#[derive(Debug, Clone)]
pub struct ResponseOutcome {
    pub action: RuleAction,
    /// Response as the agent may see it, with disallowed fields removed.
    /// `None` when blocked.
    pub safe_response: Option<Value>,
    /// Names of the fields removed by contract enforcement. For the
    /// enforcement host only; the agent-visible response carries no marker.
    pub stripped_fields: Vec<String>,
    pub detections: Vec<Detection>,
    pub reason: String,
}

/// Outcome of intercepting an agent-to-agent message.
#[derive(Debug, Clone)]
pub struct MessageOutcome {
    pub action: RuleAction,
    pub safe_text: Option<String>,
    pub request_id: Option<Uuid>,
    pub detections: Vec<Detection>,
    pub reason: String,
}

/// Intercepts tool requests, tool responses, and agent-to-agent messages.
pub struct ActionInterceptor {
    classifier: Classifier,
    engine: Arc<PolicyEngine>,
    contracts: Arc<ContractDirectory>,
    identities: Arc<IdentityDirectory>,
    tokens: Arc<TokenStore>,
    approvals: Arc<ApprovalStore>,
    audit: Arc<AuditLog>,
}

impl ActionInterceptor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        classifier: Classifier,
        engine: Arc<PolicyEngine>,
        contracts: Arc<ContractDirectory>,
        identities: Arc<IdentityDirectory>,
        tokens: Arc<TokenStore>,
        approvals: Arc<ApprovalStore>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            classifier,
            engine,
            contracts,
            identities,
            tokens,
            approvals,
            audit,
        }
    }

    /// Intercept an outgoing tool request.
    ///
    /// `declared_tags` are the sensitivity tags the caller already knows
    /// apply to the payload; the classifier's own detections are merged in.
    pub fn intercept_tool_request(
        &self,
        tool_name: &str,
        payload: &Payload,
        agent_id: &str,
        declared_tags: &[String],
        session_id: Option<&str>,
    ) -> RequestOutcome {
        let correlation_id = Uuid::new_v4();
        let hash = content_hash(payload);

        let contract = match self.contracts.get(tool_name) {
            Some(contract) => contract,
            None => {
                return self.deny_request(
                    tool_name,
                    agent_id,
                    correlation_id,
                    &hash,
                    Vec::new(),
                    session_id,
                    format!("unknown tool '{tool_name}': no contract is loaded for it"),
                );
            }
        };
        let identity = match self.identities.get(agent_id) {
            Some(identity) => identity,
            None => {
                return self.deny_request(
                    tool_name,
                    agent_id,
                    correlation_id,
                    &hash,
                    Vec::new(),
                    session_id,
                    format!("unknown agent '{agent_id}': no identity is loaded for it"),
                );
            }
        };
        if !identity.permits_tool(tool_name) {
            return self.deny_request(
                tool_name,
                agent_id,
                correlation_id,
                &hash,
                Vec::new(),
                session_id,
                format!("agent '{agent_id}' is not permitted to call tool '{tool_name}'"),
            );
        }

        let report = self.classifier.classify(payload);
        let tags = effective_tags(declared_tags, &report);

        if let Some(tag) = identity.first_uncleared_tag(&tags) {
            let tag = tag.to_string();
            return self.deny_request(
                tool_name,
                agent_id,
                correlation_id,
                &hash,
                tags.clone(),
                session_id,
                format!("agent '{agent_id}' lacks clearance for tag '{tag}'"),
            );
        }
        if let Some(tag) = contract.first_disallowed_tag(&tags) {
            let tag = tag.to_string();
            return self.deny_request(
                tool_name,
                agent_id,
                correlation_id,
                &hash,
                tags.clone(),
                session_id,
                format!("tag '{tag}' is not admitted by the contract for tool '{tool_name}'"),
            );
        }

        let context = DecisionContext {
            boundary: Boundary::Action,
            agent_id: Some(agent_id.to_string()),
            tool_name: Some(tool_name.to_string()),
            data_tags: tags.clone(),
        };
        let decision = self.engine.evaluate(&context);
        debug!(tool = tool_name, agent = agent_id, action = ?decision.action, "tool request decided");

        let mut request_id = None;
        let mut token_id = None;
        let payload_out = match decision.action {
            RuleAction::Allow => {
                if let Some(credential) = &contract.credential {
                    let token = self.tokens.issue(
                        agent_id,
                        tool_name,
                        credential.actions.clone(),
                        credential.ttl_secs,
                    );
                    token_id = Some(token.token_id);
                }
                Some(payload.clone())
            }
            RuleAction::Redact => Some(redact_payload(payload, &report.detections)),
            RuleAction::Block => None,
            RuleAction::RequireApproval => {
                let request = self.approvals.create(CreateApproval {
                    agent_id: agent_id.to_string(),
                    boundary: Boundary::Action,
                    tool_name: Some(tool_name.to_string()),
                    content_hash: hash.clone(),
                    reason: decision.reason.clone(),
                });
                request_id = Some(request.request_id);
                None
            }
        };

        let mut event = AuditEvent::new(Boundary::Action, decision.action, decision.reason.clone())
            .with_agent(agent_id)
            .with_tool(tool_name)
            .with_phase(BoundaryPhase::Request, correlation_id)
            .with_tags(tags)
            .with_content_hash(hash);
        if let Some(session_id) = session_id {
            event = event.with_session(session_id);
        }
        if let Some(rule) = &decision.matched_rule {
            event = event.with_rule(rule.clone());
        }
        self.audit.record(event);

        RequestOutcome {
            action: decision.action,
            payload: payload_out,
            request_id,
            token_id,
            correlation_id,
            detections: report.detections,
            reason: decision.reason,
        }
    }

    /// Intercept a tool's response before it reaches the agent.
    ///
    /// Top-level fields not in the contract's `allowed_response_fields` are
    /// removed without any marker in the response itself; the stripped
    /// names go to the audit event only.
    pub fn intercept_tool_response(
        &self,
        tool_name: &str,
        response: &Value,
        agent_id: &str,
        correlation_id: Uuid,
        session_id: Option<&str>,
    ) -> ResponseOutcome {
        let contract = match self.contracts.get(tool_name) {
            Some(contract) => contract,
            None => {
                let reason =
                    format!("unknown tool '{tool_name}': no contract is loaded for it");
                let mut event =
                    AuditEvent::new(Boundary::Action, RuleAction::Block, reason.clone())
                        .with_agent(agent_id)
                        .with_tool(tool_name)
                        .with_phase(BoundaryPhase::Response, correlation_id);
                if let Some(session_id) = session_id {
                    event = event.with_session(session_id);
                }
                self.audit.record(event);
                return ResponseOutcome {
                    action: RuleAction::Block,
                    safe_response: None,
                    stripped_fields: Vec::new(),
                    detections: Vec::new(),
                    reason,
                };
            }
        };

        let (kept, stripped_fields) = match response {
            Value::Object(map) => {
                let mut kept = serde_json::Map::new();
                let mut stripped = Vec::new();
                for (key, value) in map {
                    if contract.response_field_allowed(key) {
                        kept.insert(key.clone(), value.clone());
                    } else {
                        stripped.push(key.clone());
                    }
                }
                (Value::Object(kept), stripped)
            }
            other => (other.clone(), Vec::new()),
        };

        let payload = Payload::structured(kept.clone());
        let report = self.classifier.classify(&payload);
        let tags = effective_tags(&[], &report);
        let hash = content_hash(&payload);

        let context = DecisionContext {
            boundary: Boundary::Action,
            agent_id: Some(agent_id.to_string()),
            tool_name: Some(tool_name.to_string()),
            data_tags: tags.clone(),
        };
        let decision = self.engine.evaluate(&context);

        let safe_response = match decision.action {
            RuleAction::Allow => Some(kept),
            RuleAction::Redact => match redact_payload(&payload, &report.detections) {
                Payload::Structured(value) => Some(value),
                Payload::Text(text) => Some(Value::String(text)),
            },
            // Approval is a request-side mechanism; a response that would
            // need it is withheld.
            RuleAction::Block | RuleAction::RequireApproval => None,
        };

        let mut event = AuditEvent::new(Boundary::Action, decision.action, decision.reason.clone())
            .with_agent(agent_id)
            .with_tool(tool_name)
            .with_phase(BoundaryPhase::Response, correlation_id)
            .with_tags(tags)
            .with_content_hash(hash)
            .with_stripped_fields(stripped_fields.clone());
        if let Some(session_id) = session_id {
            event = event.with_session(session_id);
        }
        if let Some(rule) = &decision.matched_rule {
            event = event.with_rule(rule.clone());
        }
        self.audit.record(event);

        ResponseOutcome {
            action: decision.action,
            safe_response,
            stripped_fields,
            detections: report.detections,
            reason: decision.reason,
        }
    }

    /// Intercept a message from one agent to another.
    ///
    /// The receiving agent's clearance must cover every tag in the message,
    /// exactly as if the destination were calling a tool with that data.
    pub fn intercept_agent_message(
        &self,
        message: &str,
        source_agent_id: &str,
        destination_agent_id: &str,
        session_id: Option<&str>,
    ) -> MessageOutcome {
        let payload = Payload::text(message);
        let hash = content_hash(&payload);

        let destination = match self.identities.get(destination_agent_id) {
            Some(identity) => identity,
            None => {
                let reason = format!(
                    "unknown agent '{destination_agent_id}': no identity is loaded for it"
                );
                let mut event =
                    AuditEvent::new(Boundary::AgentMessage, RuleAction::Block, reason.clone())
                        .with_agent(source_agent_id)
                        .with_destination(destination_agent_id)
                        .with_content_hash(hash);
                if let Some(session_id) = session_id {
                    event = event.with_session(session_id);
                }
                self.audit.record(event);
                return MessageOutcome {
                    action: RuleAction::Block,
                    safe_text: None,
                    request_id: None,
                    detections: Vec::new(),
                    reason,
                };
            }
        };

        let report = self.classifier.classify(&payload);
        let tags = effective_tags(&[], &report);

        if let Some(tag) = destination.first_uncleared_tag(&tags) {
            let reason = format!(
                "destination agent '{destination_agent_id}' lacks clearance for tag '{tag}'"
            );
            let mut event =
                AuditEvent::new(Boundary::AgentMessage, RuleAction::Block, reason.clone())
                    .with_agent(source_agent_id)
                    .with_destination(destination_agent_id)
                    .with_tags(tags)
                    .with_content_hash(hash);
            if let Some(session_id) = session_id {
                event = event.with_session(session_id);
            }
            self.audit.record(event);
            return MessageOutcome {
                action: RuleAction::Block,
                safe_text: None,
                request_id: None,
                detections: report.detections,
                reason,
            };
        }

        let context = DecisionContext {
            boundary: Boundary::AgentMessage,
            agent_id: Some(source_agent_id.to_string()),
            tool_name: None,
            data_tags: tags.clone(),
        };
        let decision = self.engine.evaluate(&context);

        let mut request_id = None;
        let safe_text = match decision.action {
            RuleAction::Allow => Some(message.to_string()),
            RuleAction::Redact => Some(redact_text(message, &report.detections)),
            RuleAction::Block => None,
            RuleAction::RequireApproval => {
                let request = self.approvals.create(CreateApproval {
                    agent_id: source_agent_id.to_string(),
                    boundary: Boundary::AgentMessage,
                    tool_name: None,
                    content_hash: hash.clone(),
                    reason: decision.reason.clone(),
                });
                request_id = Some(request.request_id);
                None
            }
        };

        let mut event = AuditEvent::new(
            Boundary::AgentMessage,
            decision.action,
            decision.reason.clone(),
        )
        .with_agent(source_agent_id)
        .with_destination(destination_agent_id)
        .with_tags(tags)
        .with_content_hash(hash);
        if let Some(session_id) = session_id {
            event = event.with_session(session_id);
        }
        if let Some(rule) = &decision.matched_rule {
            event = event.with_rule(rule.clone());
        }
        self.audit.record(event);

        MessageOutcome {
            action: decision.action,
            safe_text,
            request_id,
            detections: report.detections,
            reason: decision.reason,
        }
    }

    fn deny_request(
        &self,
        tool_name: &str,
        agent_id: &str,
        correlation_id: Uuid,
        content_hash: &str,
        tags: Vec<String>,
        session_id: Option<&str>,
        reason: String,
    ) -> RequestOutcome {
        debug!(tool = tool_name, agent = agent_id, reason = %reason, "tool request denied");
        let mut event = AuditEvent::new(Boundary::Action, RuleAction::Block, reason.clone())
            .with_agent(agent_id)
            .with_tool(tool_name)
            .with_phase(BoundaryPhase::Request, correlation_id)
            .with_tags(tags)
            .with_content_hash(content_hash);
        if let Some(session_id) = session_id {
            event = event.with_session(session_id);
        }
        self.audit.record(event);
        RequestOutcome {
            action: RuleAction::Block,
            payload: None,
            request_id: None,
            token_id: None,
            correlation_id,
            detections: Vec::new(),
            reason,
        }
    }
}
