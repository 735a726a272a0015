//! # warden-boundary
//!
//! The three boundary interceptors, orchestrating everything else.
//!
//! Every intercepted call runs the same skeleton: classify the payload,
//! merge declared and detected tags, evaluate policy against an immutable
//! rule-set snapshot, apply the action, and record an audit event. The
//! interceptors differ in which boundary they evaluate and which extra
//! checks they run:
//!
//! - [`InputScanner`] guards data arriving from the outside world.
//! - [`ActionInterceptor`] guards tool requests, tool responses, and
//!   agent-to-agent messages, adding identity, clearance, contract, and
//!   capability-token handling.
//! - [`OutputGuard`] guards outbound data, with a fallback template for
//!   blocked payloads and a [`StreamGuard`] for chunked output.
//!
//! All shared state (policy engine, directories, stores, audit log) is
//! passed in at construction, so several isolated enforcement stacks can
//! coexist in one process.

pub mod action;
pub mod input;
pub mod output;
pub mod pipeline;

pub use action::{ActionInterceptor, MessageOutcome, RequestOutcome, ResponseOutcome};
pub use input::{InputScanner, ScanOutcome};
pub use output::{OutputGuard, StreamEvent, StreamGuard};
pub use pipeline::{content_hash, effective_tags, redact_payload, redact_text};
