// registry.rs — Explicit detector registry.
//
// The registry is a closed, validated list of detectors populated at
// construction from static configuration. There is deliberately no dynamic
// discovery and no runtime code loading: what the registry holds after
// construction is exactly what will ever run.

use crate::detectors::{builtin_specs, Detector, DetectorSpec, RegexDetector};
use crate::error::ClassifyError;

/// A closed set of detectors.
pub struct DetectorRegistry {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectorRegistry {
    /// An empty registry. Useful for tests that register hand-built detectors.
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    /// Registry holding the built-in detector set.
    pub fn with_builtins() -> Self {
        // Built-in specs are covered by tests; compilation cannot fail here,
        // but we still go through the validating path.
        Self::from_specs(&builtin_specs()).unwrap_or_else(|_| Self::new())
    }

    /// Build a registry from a validated list of detector specs.
    ///
    /// Rejects duplicate names and invalid patterns/tags so a bad config
    /// document never produces a half-working detector set.
    pub fn from_specs(specs: &[DetectorSpec]) -> Result<Self, ClassifyError> {
        let mut registry = Self::new();
        for spec in specs {
            if registry.detectors.iter().any(|d| d.name() == spec.name) {
                return Err(ClassifyError::DuplicateDetector(spec.name.clone()));
            }
            registry.register(Box::new(RegexDetector::compile(spec)?));
        }
        Ok(registry)
    }

    /// Add a detector. Intended for construction time only.
    pub fn register(&mut self, detector: Box<dyn Detector>) {
        self.detectors.push(detector);
    }

    /// Iterate over the registered detectors.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Detector> {
        self.detectors.iter().map(|d| d.as_ref())
    }

    /// Number of registered detectors.
    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
