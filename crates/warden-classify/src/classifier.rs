// classifier.rs — Runs the detector set over flat or nested payloads.
//
// For flat text every detector scans the whole string and detections carry
// byte spans. For nested JSON the classifier walks every string leaf up to a
// configured depth/leaf budget and detections carry the structural path of
// the leaf instead (e.g., "user.preferences.api_key", "tools[1].params").
//
// Failure semantics: a detector returning Err is recorded in the report's
// failure list and scanning continues with the remaining detectors. The
// report is then "degraded" and upstream interceptors treat the payload as
// if a secret-tagged detection were present (fail closed).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::detection::{Detection, Location};
use crate::registry::DetectorRegistry;

/// A payload crossing a boundary: flat text or nested structured data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Structured(Value),
}

impl Payload {
    pub fn text(s: impl Into<String>) -> Self {
        Payload::Text(s.into())
    }

    pub fn structured(value: Value) -> Self {
        Payload::Structured(value)
    }

    /// Canonical string rendering, used for content hashing.
    pub fn canonical_string(&self) -> String {
        match self {
            Payload::Text(s) => s.clone(),
            Payload::Structured(v) => v.to_string(),
        }
    }
}

/// Budgets for walking nested payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Maximum nesting depth to descend into structured payloads.
    pub max_depth: usize,

    /// Maximum number of string leaves to scan in one payload.
    pub max_leaves: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_depth: 16,
            max_leaves: 1024,
        }
    }
}

/// A detector that errored during a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorFailure {
    pub detector: String,
    pub message: String,
}

/// The result of one classify call: the union of all detector outputs,
/// plus any per-detector failures.
#[derive(Debug, Clone, Default)]
pub struct ClassifierReport {
    /// All findings across all detectors.
    pub detections: Vec<Detection>,

    /// Detectors that errored. Non-empty means the report is degraded.
    pub failures: Vec<DetectorFailure>,

    /// True when the walk budget (depth or leaf count) was exhausted and
    /// part of the payload went unscanned.
    pub truncated: bool,
}

impl ClassifierReport {
    /// Whether the report is incomplete in a way that calls for failing
    /// closed: a detector errored, or the payload was only partially walked.
    pub fn degraded(&self) -> bool {
        !self.failures.is_empty() || self.truncated
    }

    /// Distinct data tags across all detections, in first-seen order.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for d in &self.detections {
            if !tags.contains(&d.tag) {
                tags.push(d.tag.clone());
            }
        }
        tags
    }
}

/// Runs the detector set over payloads.
pub struct Classifier {
    registry: DetectorRegistry,
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(registry: DetectorRegistry) -> Self {
        Self {
            registry,
            config: ClassifierConfig::default(),
        }
    }

    pub fn with_config(registry: DetectorRegistry, config: ClassifierConfig) -> Self {
        Self { registry, config }
    }

    /// Classify a payload. Never fails as a whole; see [`ClassifierReport`].
    pub fn classify(&self, payload: &Payload) -> ClassifierReport {
        let mut report = ClassifierReport::default();
        match payload {
            Payload::Text(text) => self.scan_text(text, None, &mut report),
            Payload::Structured(value) => {
                let mut leaves_scanned = 0usize;
                self.walk(value, String::new(), 0, &mut leaves_scanned, &mut report);
            }
        }
        if report.degraded() {
            warn!(
                failures = report.failures.len(),
                truncated = report.truncated,
                "classifier report degraded"
            );
        }
        report
    }

    /// Run every detector over one piece of text. When `path` is set the
    /// detections are re-located to the structural path of the leaf.
    fn scan_text(&self, text: &str, path: Option<&str>, report: &mut ClassifierReport) {
        for detector in self.registry.iter() {
            match detector.scan(text) {
                Ok(detections) => {
                    for mut detection in detections {
                        if let Some(path) = path {
                            detection.location = Location::Path {
                                path: path.to_string(),
                            };
                        }
                        report.detections.push(detection);
                    }
                }
                Err(err) => {
                    report.failures.push(DetectorFailure {
                        detector: detector.name().to_string(),
                        message: err.message,
                    });
                }
            }
        }
    }

    /// Depth-first walk over a JSON value, scanning every string leaf.
    fn walk(
        &self,
        value: &Value,
        path: String,
        depth: usize,
        leaves_scanned: &mut usize,
        report: &mut ClassifierReport,
    ) {
        if depth > self.config.max_depth {
            report.truncated = true;
            return;
        }
        match value {
            Value::String(s) => {
                if *leaves_scanned >= self.config.max_leaves {
                    report.truncated = true;
                    return;
                }
                *leaves_scanned += 1;
                self.scan_text(s, Some(&path), report);
            }
            Value::Object(map) => {
                for (key, child) in map {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };
                    self.walk(child, child_path, depth + 1, leaves_scanned, report);
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    let child_path = format!("{}[{}]", path, index);
                    self.walk(child, child_path, depth + 1, leaves_scanned, report);
                }
            }
            // Numbers, booleans, and nulls carry no scannable text.
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::Detector;
    use crate::error::DetectorError;
    use serde_json::json;

    /// A detector that always errors, for fail-closed tests.
    struct FailingDetector;

    impl Detector for FailingDetector {
        fn name(&self) -> &str {
            "failing"
        }

        fn tag(&self) -> &str {
            "secret.broken"
        }

        fn scan(&self, _text: &str) -> Result<Vec<Detection>, DetectorError> {
            Err(DetectorError::new("backing model unavailable"))
        }
    }

    fn classifier() -> Classifier {
        Classifier::new(DetectorRegistry::with_builtins())
    }

    #[test]
    fn flat_text_detections_carry_spans() {
        let report = classifier().classify(&Payload::text("write to jo@example.com"));
        assert_eq!(report.detections.len(), 1);
        assert!(report.detections[0].span().is_some());
        assert!(!report.degraded());
    }

    #[test]
    fn nested_payload_detections_carry_paths() {
        let payload = Payload::structured(json!({
            "user": {
                "preferences": {
                    "api_key": "sk-abcdef0123456789abcdef"
                }
            },
            "tools": [
                {"name": "db"},
                {"params": {"connection": "postgres://admin:s3cret@db:5432/prod"}}
            ]
        }));
        let report = classifier().classify(&payload);

        let paths: Vec<&str> = report.detections.iter().filter_map(|d| d.path()).collect();
        assert!(paths.contains(&"user.preferences.api_key"));
        assert!(paths.contains(&"tools[1].params.connection"));
    }

    #[test]
    fn union_of_detectors_not_first_match() {
        let report = classifier().classify(&Payload::text(
            "mail jo@example.com, db postgres://u:p@h/db",
        ));
        let tags = report.tags();
        assert!(tags.contains(&"personal.pii.email".to_string()));
        assert!(tags.contains(&"secret.database_url".to_string()));
    }

    #[test]
    fn failing_detector_degrades_without_aborting() {
        let mut registry = DetectorRegistry::with_builtins();
        registry.register(Box::new(FailingDetector));
        let classifier = Classifier::new(registry);

        let report = classifier.classify(&Payload::text("mail jo@example.com"));
        // The healthy detectors still produced results.
        assert!(!report.detections.is_empty());
        // The failure is recorded and the report is degraded.
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].detector, "failing");
        assert!(report.degraded());
    }

    #[test]
    fn depth_budget_truncates() {
        let mut deep = json!("postgres://u:p@h/db");
        for _ in 0..40 {
            deep = json!({ "inner": deep });
        }
        let config = ClassifierConfig {
            max_depth: 4,
            max_leaves: 1024,
        };
        let classifier = Classifier::with_config(DetectorRegistry::with_builtins(), config);
        let report = classifier.classify(&Payload::structured(deep));

        assert!(report.detections.is_empty());
        assert!(report.truncated);
        assert!(report.degraded());
    }

    #[test]
    fn leaf_budget_truncates() {
        let items: Vec<Value> = (0..20).map(|i| json!(format!("value {}", i))).collect();
        let config = ClassifierConfig {
            max_depth: 16,
            max_leaves: 5,
        };
        let classifier = Classifier::with_config(DetectorRegistry::with_builtins(), config);
        let report = classifier.classify(&Payload::structured(json!(items)));
        assert!(report.truncated);
    }

    #[test]
    fn non_string_leaves_are_skipped() {
        let report = classifier().classify(&Payload::structured(json!({
            "count": 42,
            "enabled": true,
            "nothing": null
        })));
        assert!(report.detections.is_empty());
        assert!(!report.degraded());
    }

    #[test]
    fn tags_are_deduplicated() {
        let report = classifier().classify(&Payload::text("a@x.com and b@y.org"));
        assert_eq!(report.detections.len(), 2);
        assert_eq!(report.tags(), vec!["personal.pii.email".to_string()]);
    }

    #[test]
    fn classify_is_deterministic() {
        let payload = Payload::text("jo@example.com and postgres://u:p@h/db");
        let first = classifier().classify(&payload);
        let second = classifier().classify(&payload);
        assert_eq!(first.detections.len(), second.detections.len());
        assert_eq!(first.tags(), second.tags());
    }
}
