//! # warden-classify
//!
//! Detector set and payload classifier for Warden.
//!
//! A [`Classifier`] runs every registered [`Detector`] over a payload (flat
//! text or nested JSON) and aggregates the findings into [`Detection`]
//! records carrying a hierarchical data tag, a location, a masked value, and
//! a confidence score. Detectors are independent and order-independent; the
//! result is the union of all detector outputs.
//!
//! A single failing detector never aborts a classify call. Partial results
//! are kept and the report is marked degraded so upstream interceptors can
//! fail closed.
//!
//! ## Quick Example
//!
//! ```rust
//! use warden_classify::{Classifier, DetectorRegistry, Payload};
//!
//! let classifier = Classifier::new(DetectorRegistry::with_builtins());
//! let report = classifier.classify(&Payload::text("reach me at jo@example.com"));
//! assert_eq!(report.detections[0].tag, "personal.pii.email");
//! ```

pub mod classifier;
pub mod detection;
pub mod detectors;
pub mod error;
pub mod registry;

pub use classifier::{Classifier, ClassifierConfig, ClassifierReport, DetectorFailure, Payload};
pub use detection::{mask_value, Detection, Location};
pub use detectors::{builtin_specs, Detector, DetectorSpec, RegexDetector};
pub use error::{ClassifyError, DetectorError};
pub use registry::DetectorRegistry;
