// detection.rs — Detection records and value masking.
//
// A Detection is an immutable finding produced by one detector: which
// detector fired, what data tag it assigns, where in the payload it found
// the value, a masked rendering of the value, and a confidence score.
// Detections are produced once and never mutated; they are owned by the
// scan/guard/intercept call that created them.
//
// The raw matched value never leaves this module unmasked. Anything that
// ends up in an outcome, a log line, or an audit event goes through
// `mask_value` first.

use serde::{Deserialize, Serialize};

/// Where in the payload a detection was found.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    /// Byte span within a flat text payload.
    Span { start: usize, end: usize },

    /// Structural path to a leaf within a nested payload
    /// (e.g., "user.preferences.api_key" or "tools[1].params.connection").
    Path { path: String },
}

/// A single finding produced by a detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// Name of the detector that produced this finding.
    pub detector: String,

    /// Hierarchical data tag (e.g., "personal.pii.email", "secret.database_url").
    pub tag: String,

    /// Where the value was found.
    pub location: Location,

    /// Masked rendering of the matched value. Never the raw value.
    pub masked_value: String,

    /// Detector confidence in [0, 1].
    pub confidence: f64,
}

impl Detection {
    /// Byte span of this detection, if it was found in flat text.
    pub fn span(&self) -> Option<(usize, usize)> {
        match self.location {
            Location::Span { start, end } => Some((start, end)),
            Location::Path { .. } => None,
        }
    }

    /// Structural path of this detection, if it was found in nested data.
    pub fn path(&self) -> Option<&str> {
        match &self.location {
            Location::Span { .. } => None,
            Location::Path { path } => Some(path),
        }
    }
}

/// Mask a detected value for display and audit.
///
/// Short values are fully masked. Longer values keep the first and last two
/// characters so a human reviewer can recognize *which* credential leaked
/// without the log reproducing it.
pub fn mask_value(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len().max(4));
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 4), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_values_fully_masked() {
        assert_eq!(mask_value("abc"), "****");
        assert_eq!(mask_value("12345678"), "********");
    }

    #[test]
    fn long_values_keep_edges() {
        let masked = mask_value("jo@example.com");
        assert!(masked.starts_with("jo"));
        assert!(masked.ends_with("om"));
        assert!(!masked.contains("example"));
    }

    #[test]
    fn mask_never_contains_middle() {
        let masked = mask_value("postgres://admin:s3cret@db:5432/prod");
        assert!(!masked.contains("s3cret"));
        assert!(!masked.contains("admin"));
    }

    #[test]
    fn span_and_path_accessors() {
        let d = Detection {
            detector: "email".to_string(),
            tag: "personal.pii.email".to_string(),
            location: Location::Span { start: 3, end: 10 },
            masked_value: "jo***om".to_string(),
            confidence: 0.9,
        };
        assert_eq!(d.span(), Some((3, 10)));
        assert_eq!(d.path(), None);

        let d = Detection {
            location: Location::Path {
                path: "user.api_key".to_string(),
            },
            ..d
        };
        assert_eq!(d.span(), None);
        assert_eq!(d.path(), Some("user.api_key"));
    }

    #[test]
    fn detection_serialization_round_trip() {
        let d = Detection {
            detector: "database_url".to_string(),
            tag: "secret.database_url".to_string(),
            location: Location::Path {
                path: "tools[1].params.connection".to_string(),
            },
            masked_value: "po***od".to_string(),
            confidence: 0.95,
        };
        let json = serde_json::to_string(&d).unwrap();
        let restored: Detection = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.tag, d.tag);
        assert_eq!(restored.path(), Some("tools[1].params.connection"));
    }
}
