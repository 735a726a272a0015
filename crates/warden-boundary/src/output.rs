// output.rs — Output boundary guard.
//
// The last checkpoint before agent output reaches the outside world. Same
// skeleton as the input scanner, evaluated at boundary=output, with two
// extras: a configurable fallback template substituted for blocked
// payloads, and a streaming guard that classifies buffered windows before
// releasing anything downstream.

use std::sync::Arc;

use tracing::debug;
use warden_approval::{ApprovalStore, CreateApproval};
use warden_audit::{AuditEvent, AuditLog};
use warden_classify::{Classifier, Payload};
use warden_policy::{Boundary, DecisionContext, PolicyEngine, RuleAction};

use crate::input::ScanOutcome;
use crate::pipeline::{content_hash, effective_tags, redact_payload, redact_text};

/// Guards outbound payloads at the output boundary.
pub struct OutputGuard {
    classifier: Classifier,
    engine: Arc<PolicyEngine>,
    approvals: Arc<ApprovalStore>,
    audit: Arc<AuditLog>,
    fallback_template: Option<String>,
}

impl OutputGuard {
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
            fallback_template: None,
        }
    }

    /// Message returned in place of a blocked payload, instead of nothing.
    pub fn with_fallback_template(mut self, template: impl Into<String>) -> Self {
        self.fallback_template = Some(template.into());
        self
    }

    /// Classify an outbound payload, evaluate output-boundary policy, and
    /// apply the resulting action.
    pub fn guard_output(
        &self,
        payload: &Payload,
        agent_id: Option<&str>,
        session_id: Option<&str>,
    ) -> ScanOutcome {
        let report = self.classifier.classify(payload);
        let tags = effective_tags(&[], &report);
        let hash = content_hash(payload);

        let context = DecisionContext {
            boundary: Boundary::Output,
            agent_id: agent_id.map(str::to_string),
            tool_name: None,
            data_tags: tags.clone(),
        };
        let decision = self.engine.evaluate(&context);
        debug!(action = ?decision.action, tags = ?tags, "output guard decided");

        let (safe_payload, request_id) = match decision.action {
            RuleAction::Allow => (Some(payload.clone()), None),
            RuleAction::Redact => (Some(redact_payload(payload, &report.detections)), None),
            RuleAction::Block => (
                self.fallback_template.clone().map(Payload::text),
                None,
            ),
            RuleAction::RequireApproval => {
                let request = self.approvals.create(CreateApproval {
                    agent_id: agent_id.unwrap_or("anonymous").to_string(),
                    boundary: Boundary::Output,
                    tool_name: None,
                    content_hash: hash.clone(),
                    reason: decision.reason.clone(),
                });
                (None, Some(request.request_id))
            }
        };

        let mut event = AuditEvent::new(Boundary::Output, decision.action, decision.reason.clone())
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

    /// Start guarding a streamed output for one agent.
    pub fn stream(&self, agent_id: Option<&str>, session_id: Option<&str>) -> StreamGuard<'_> {
        StreamGuard {
            guard: self,
            agent_id: agent_id.map(str::to_string),
            session_id: session_id.map(str::to_string),
            buffer: String::new(),
            window: DEFAULT_WINDOW,
            holdback: DEFAULT_HOLDBACK,
            blocked_reason: None,
        }
    }
}

/// Bytes buffered before the first classification pass.
const DEFAULT_WINDOW: usize = 256;

/// Bytes held back at each release so a secret split across two chunks is
/// still seen whole by the next pass.
const DEFAULT_HOLDBACK: usize = 64;

/// What a [`StreamGuard`] hands back for each pushed chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Chunk absorbed; nothing cleared for release yet.
    Buffered,
    /// This much text is cleared to go downstream.
    Released(String),
    /// The stream is blocked. Nothing further will ever be released.
    Blocked {
        reason: String,
        fallback: Option<String>,
    },
}

/// Guards a streamed output chunk by chunk.
///
/// Chunks accumulate in a buffer; nothing is released until a full window
/// has been classified. Each release holds back a tail overlap so a value
/// straddling a chunk boundary is still classified whole. Block and
/// require-approval decisions both terminate the stream: once blocked, the
/// guard stays blocked.
pub struct StreamGuard<'a> {
    guard: &'a OutputGuard,
    agent_id: Option<String>,
    session_id: Option<String>,
    buffer: String,
    window: usize,
    holdback: usize,
    blocked_reason: Option<String>,
}

impl StreamGuard<'_> {
    /// Override the buffering window (bytes classified before any release).
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    /// Override the overlap held back at each release.
    pub fn with_holdback(mut self, holdback: usize) -> Self {
        self.holdback = holdback;
        self
    }

    /// Feed one chunk in. Returns what, if anything, may go downstream.
    pub fn push(&mut self, chunk: &str) -> StreamEvent {
        if let Some(reason) = &self.blocked_reason {
            return StreamEvent::Blocked {
                reason: reason.clone(),
                fallback: None,
            };
        }
        self.buffer.push_str(chunk);
        if self.buffer.len() < self.window {
            return StreamEvent::Buffered;
        }
        self.classify_and_release(false)
    }

    /// Signal end of stream, classifying and draining whatever remains.
    pub fn finish(&mut self) -> StreamEvent {
        if let Some(reason) = &self.blocked_reason {
            return StreamEvent::Blocked {
                reason: reason.clone(),
                fallback: None,
            };
        }
        if self.buffer.is_empty() {
            return StreamEvent::Released(String::new());
        }
        self.classify_and_release(true)
    }

    fn classify_and_release(&mut self, draining: bool) -> StreamEvent {
        let payload = Payload::text(self.buffer.clone());
        let report = self.guard.classifier.classify(&payload);
        let tags = effective_tags(&[], &report);

        let context = DecisionContext {
            boundary: Boundary::Output,
            agent_id: self.agent_id.clone(),
            tool_name: None,
            data_tags: tags.clone(),
        };
        let decision = self.guard.engine.evaluate(&context);

        if matches!(
            decision.action,
            RuleAction::Block | RuleAction::RequireApproval
        ) {
            self.blocked_reason = Some(decision.reason.clone());
            let buffered = std::mem::take(&mut self.buffer);
            self.audit(
                &decision.action,
                &decision.reason,
                decision.matched_rule.as_deref(),
                tags,
                &buffered,
            );
            return StreamEvent::Blocked {
                reason: decision.reason,
                fallback: self.guard.fallback_template.clone(),
            };
        }

        let mut release_end = if draining {
            self.buffer.len()
        } else {
            floor_char_boundary(&self.buffer, self.buffer.len().saturating_sub(self.holdback))
        };

        if decision.action == RuleAction::Redact {
            for detection in &report.detections {
                if let Some((start, end)) = detection.span() {
                    if start < release_end && end > release_end {
                        // A detection straddling the release point is held
                        // back whole and redacted on a later pass.
                        release_end = floor_char_boundary(&self.buffer, start);
                    }
                }
            }
        }

        if release_end == 0 {
            return StreamEvent::Buffered;
        }

        let mut released: String = self.buffer[..release_end].to_string();
        self.buffer.drain(..release_end);

        if decision.action == RuleAction::Redact {
            let within: Vec<warden_classify::Detection> = report
                .detections
                .iter()
                .filter(|d| d.span().map(|(_, end)| end <= release_end).unwrap_or(false))
                .cloned()
                .collect();
            released = redact_text(&released, &within);
        }

        // Every window that leaves the boundary is audited. A stream that is
        // dropped without `finish` still has a trail for everything it sent.
        self.audit(
            &decision.action,
            &decision.reason,
            decision.matched_rule.as_deref(),
            tags,
            &released,
        );

        StreamEvent::Released(released)
    }

    fn audit(
        &self,
        action: &RuleAction,
        reason: &str,
        rule: Option<&str>,
        tags: Vec<String>,
        content: &str,
    ) {
        let mut event = AuditEvent::new(Boundary::Output, *action, reason)
            .with_tags(tags)
            .with_content_hash(warden_audit::hasher::hash_str(content));
        if let Some(agent_id) = &self.agent_id {
            event = event.with_agent(agent_id.clone());
        }
        if let Some(session_id) = &self.session_id {
            event = event.with_session(session_id.clone());
        }
        if let Some(rule) = rule {
            event = event.with_rule(rule);
        }
        self.guard.audit.record(event);
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    index = index.min(s.len());
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
