// input.rs — Input boundary scanner.
//
// Data arriving from the outside world (user prompts, uploaded documents,
// retrieved context) is classified and evaluated against input-boundary
// policy before the agent sees it.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;
use warden_approval::{ApprovalStore, CreateApproval};
use warden_audit::{AuditEvent, AuditLog};
use warden_classify::{Classifier, Detection, Payload};
use warden_policy::{Boundary, DecisionContext, PolicyEngine, RuleAction};

use crate::pipeline::{content_hash, effective_tags, redact_payload};

/// Outcome of one scan or guard call.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// What the policy decided.
    pub action: RuleAction,
    /// The payload as the caller may use it. `None` when blocked or
    /// pending approval.
    pub safe_payload: Option<Payload>,
    /// Everything the classifier found, masked values only.
    pub detections: Vec<Detection>,
    /// Approval request to await, when the action is `require_approval`.
    pub request_id: Option<Uuid>,
    /// Why the decision came out the way it did.
    pub reason: String,
}

/// Scans inbound payloads at the input boundary.
pub struct InputScanner {
    classifier: Classifier,
    engine: Arc<PolicyEngine>,
    approvals: Arc<ApprovalStore>,
    audit: Arc<AuditLog>,
}

impl InputScanner {
    pub fn new(
        classifier: Classifier,
        engine: Arc<PolicyEngine>,
        approvals: Arc<ApprovalStore>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            classifier,
            engine,
            approvals,
            audit,
        }
    }

    /// Classify an inbound payload, evaluate input-boundary policy, and
    /// apply the resulting action.
    ///
    /// The session id, when known, is stamped onto the audit event so the
    /// trail for one conversation can be pulled out as a unit.
    pub fn scan_input(
        &self,
        payload: &Payload,
        agent_id: Option<&str>,
        session_id: Option<&str>,
    ) -> ScanOutcome {
        let report = self.classifier.classify(payload);
        let tags = effective_tags(&[], &report);
        let hash = content_hash(payload);

        let context = DecisionContext {
            boundary: Boundary::Input,
            agent_id: agent_id.map(str::to_string),
            tool_name: None,
            data_tags: tags.clone(),
        };
        let decision = self.engine.evaluate(&context);
        debug!(action = ?decision.action, tags = ?tags, "input scan decided");

        let (safe_payload, request_id) = match decision.action {
            RuleAction::Allow => (Some(payload.clone()), None),
            RuleAction::Redact => (Some(redact_payload(payload, &report.detections)), None),
            RuleAction::Block => (None, None),
            RuleAction::RequireApproval => {
                let request = self.approvals.create(CreateApproval {
                    agent_id: agent_id.unwrap_or("anonymous").to_string(),
                    boundary: Boundary::Input,
                    tool_name: None,
                    content_hash: hash.clone(),
                    reason: decision.reason.clone(),
                });
                (None, Some(request.request_id))
            }
        };

        let mut event = AuditEvent::new(Boundary::Input, decision.action, decision.reason.clone())
            .with_tags(tags)
            .with_content_hash(hash);
        if let Some(agent_id) = agent_id {
            event = event.with_agent(agent_id);
        }
        if let Some(session_id) = session_id {
            event = event.with_session(session_id);
        }
        if let Some(rule) = &decision.matched_rule {
            event = event.with_rule(rule.clone());
        }
        self.audit.record(event);

        ScanOutcome {
            action: decision.action,
            safe_payload,
            detections: report.detections,
            request_id,
            reason: decision.reason,
        }
    }
}
