//! # warden-audit
//!
//! Append-only audit log for every boundary enforcement decision.
//!
//! Events are enqueued into a bounded channel and drained by a dedicated
//! writer thread into a JSONL file, so the boundary decision path never
//! waits on the slowest log destination. Each line links to the previous
//! one via a SHA-256 hash chain, making insertion, deletion, or
//! modification detectable.
//!
//! Audit storage never contains raw sensitive payloads, only content
//! hashes, tags, and decisions.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use warden_audit::{AuditEvent, AuditFilter, AuditLog};
//! use warden_policy::{Boundary, RuleAction};
//!
//! let log = AuditLog::open("/tmp/warden-audit.jsonl", 1024).unwrap();
//! log.record(
//!     AuditEvent::new(Boundary::Output, RuleAction::Block, "blocked by rule 'no-secrets'")
//!         .with_agent("support-bot")
//!         .with_tags(vec!["secret.database_url".to_string()]),
//! );
//! let blocked = log.query(&AuditFilter {
//!     action: Some(RuleAction::Block),
//!     ..Default::default()
//! }).unwrap();
//! ```

pub mod error;
pub mod event;
pub mod hasher;
pub mod log;

pub use error::AuditError;
pub use event::{AuditEvent, BoundaryPhase};
pub use log::{AuditFilter, AuditLog};
