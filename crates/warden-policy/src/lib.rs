//! # warden-policy
//!
//! The policy half of Warden's enforcement core: hierarchical data tags,
//! declarative policy rules, the pure evaluation engine, tool contracts,
//! and agent identities.
//!
//! Everything here follows a default-deny model: an empty rule set blocks,
//! an unknown agent is denied, an unknown tool is denied, and an invalid
//! config document is rejected wholesale while the last-known-good snapshot
//! keeps serving.
//!
//! ## Quick Example
//!
//! ```rust
//! use warden_policy::{
//!     Boundary, Decision, DecisionContext, PolicyEngine, PolicyRule, RuleAction,
//!     RuleCondition, RuleSetDocument,
//! };
//!
//! let engine = PolicyEngine::default_deny();
//! let decision = engine.evaluate(&DecisionContext {
//!     boundary: Boundary::Output,
//!     agent_id: None,
//!     tool_name: None,
//!     data_tags: vec!["secret.database_url".to_string()],
//! });
//! assert_eq!(decision.action, RuleAction::Block);
//! ```

pub mod contract;
pub mod engine;
pub mod error;
pub mod identity;
pub mod rule;
pub mod tag;

pub use contract::{ContractDirectory, CredentialRequirement, ToolContract};
pub use engine::{evaluate_snapshot, Decision, DecisionContext, PolicyEngine};
pub use error::PolicyError;
pub use identity::{AgentIdentity, IdentityDirectory};
pub use rule::{Boundary, PolicyRule, RuleAction, RuleCondition, RuleSet, RuleSetDocument};
pub use tag::{first_uncovered, tag_matches};
