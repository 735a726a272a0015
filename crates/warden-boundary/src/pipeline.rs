// pipeline.rs — Shared steps of the boundary interception skeleton.
//
// Every interceptor runs the same sequence: classify, merge tags, evaluate
// policy, apply the action, audit. This module holds the steps the three
// interceptors share: tag merging (with the fail-closed degradation rule)
// and payload redaction.

use serde_json::Value;
use warden_classify::{ClassifierReport, Detection, Payload};

/// Tag injected when a classify call is degraded (detector failure or
/// truncated walk). Policy written against `secret` then fails closed.
pub const DEGRADED_TAG: &str = "secret";

/// Replacement written over a redacted span or leaf.
pub fn redaction_token(tag: &str) -> String {
    format!("[REDACTED:{}]", tag)
}

/// Merge declared and detected tags, deduplicated in first-seen order.
///
/// A degraded report injects the [`DEGRADED_TAG`] so that an incomplete
/// scan is treated as if a secret were present.
pub fn effective_tags(declared: &[String], report: &ClassifierReport) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in declared.iter().cloned().chain(report.tags()) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    if report.degraded() && !tags.iter().any(|t| t == DEGRADED_TAG) {
        tags.push(DEGRADED_TAG.to_string());
    }
    tags
}

/// SHA-256 hex hash of a payload's canonical text. This is what audit
/// events and approval dedup keys carry instead of the payload itself.
pub fn content_hash(payload: &Payload) -> String {
    warden_audit::hasher::hash_str(&payload.canonical_string())
}

/// Produce a redacted copy of a payload, masking every detection in place.
pub fn redact_payload(payload: &Payload, detections: &[Detection]) -> Payload {
    match payload {
        Payload::Text(text) => Payload::text(redact_text(text, detections)),
        Payload::Structured(value) => {
            let mut value = value.clone();
            for detection in detections {
                if let Some(path) = detection.path() {
                    set_path(
                        &mut value,
                        path,
                        Value::String(redaction_token(&detection.tag)),
                    );
                }
            }
            Payload::structured(value)
        }
    }
}

/// Replace detected spans in flat text with redaction tokens.
///
/// Spans are applied right to left so earlier byte offsets stay valid.
/// A span overlapping an already-redacted region is skipped rather than
/// spliced into the replacement token.
pub fn redact_text(text: &str, detections: &[Detection]) -> String {
    let mut spans: Vec<(usize, usize, &str)> = detections
        .iter()
        .filter_map(|d| d.span().map(|(start, end)| (start, end, d.tag.as_str())))
        .collect();
    spans.sort_by(|a, b| b.0.cmp(&a.0));

    let mut result = text.to_string();
    let mut last_start = result.len();
    for (start, end, tag) in spans {
        if end > last_start || end > result.len() {
            continue;
        }
        result.replace_range(start..end, &redaction_token(tag));
        last_start = start;
    }
    result
}

/// Overwrite the leaf at a structural path like `user.preferences.api_key`
/// or `tools[1].params.connection`. Paths that no longer resolve (the
/// payload changed shape since classification) are ignored.
fn set_path(root: &mut Value, path: &str, replacement: Value) {
    let mut current = root;
    let segments = parse_path(path);
    let last = segments.len().saturating_sub(1);
    for (i, segment) in segments.iter().enumerate() {
        let next = match segment {
            PathSegment::Key(key) => current.get_mut(key.as_str()),
            PathSegment::Index(index) => current.get_mut(index),
        };
        match next {
            Some(value) if i == last => {
                *value = replacement;
                return;
            }
            Some(value) => current = value,
            None => return,
        }
    }
}

enum PathSegment {
    Key(String),
    Index(usize),
}

/// Parse `a.b[1].c` into key and index segments. A leading `[n]` (payload
/// rooted at an array) yields an index segment first.
fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let mut rest = part;
        if let Some(bracket) = rest.find('[') {
            if bracket > 0 {
                segments.push(PathSegment::Key(rest[..bracket].to_string()));
            }
            rest = &rest[bracket..];
            while let Some(close) = rest.find(']') {
                if let Ok(index) = rest[1..close].parse::<usize>() {
                    segments.push(PathSegment::Index(index));
                }
                rest = &rest[close + 1..];
                if !rest.starts_with('[') {
                    break;
                }
            }
        } else if !rest.is_empty() {
            segments.push(PathSegment::Key(rest.to_string()));
        }
    }
    segments
}
