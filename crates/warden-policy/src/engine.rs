// engine.rs — Policy evaluation engine.
//
// `evaluate()` is a pure function of (context, rule-set snapshot): identical
// inputs always yield the identical Decision. No randomness, no hidden
// state, no I/O.
//
// Algorithm:
//   1. Filter rules whose boundary matches the context boundary (or `*`).
//   2. Filter rules whose condition is satisfied (tags match hierarchically).
//   3. Of the matches, take the first in snapshot order — snapshots are
//      pre-sorted so lower priority number = higher precedence.
//   4. If none match, return the configured default (always fail-closed;
//      `RuleSet::compile` rejects a fail-open default).
//
// Hot reload swaps the snapshot Arc atomically: an in-flight evaluation
// holds its own Arc and never sees a mix of old and new rules. Reads never
// block a reload and a reload never blocks reads beyond the pointer swap.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PolicyError;
use crate::rule::{Boundary, RuleAction, RuleSet, RuleSetDocument};

/// Everything the engine needs to decide one boundary crossing.
#[derive(Debug, Clone)]
pub struct DecisionContext {
    /// Which boundary is being crossed.
    pub boundary: Boundary,

    /// The agent involved, when known.
    pub agent_id: Option<String>,

    /// The tool involved, for action-boundary crossings.
    pub tool_name: Option<String>,

    /// All data tags attached to the crossing (declared plus detected).
    pub data_tags: Vec<String>,
}

/// The outcome of one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Decision {
    /// What to do with the crossing.
    pub action: RuleAction,

    /// The rule that fired, or None when the default applied.
    pub matched_rule: Option<String>,

    /// Human explanation sufficient to locate the triggering rule.
    pub reason: String,
}

/// The policy engine: a hot-swappable, immutable rule-set snapshot.
pub struct PolicyEngine {
    snapshot: RwLock<Arc<RuleSet>>,
}

impl PolicyEngine {
    /// Engine serving the given snapshot.
    pub fn new(rules: RuleSet) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(rules)),
        }
    }

    /// Engine with an empty rule set: every evaluation blocks.
    pub fn default_deny() -> Self {
        Self::new(RuleSet::deny_all())
    }

    /// Validate a rule-set document and install it atomically.
    ///
    /// On `ConfigInvalid` the previous snapshot keeps serving — the engine
    /// never runs with zero or partial policy because a reload went bad.
    pub fn load(&self, document: RuleSetDocument) -> Result<(), PolicyError> {
        let compiled = match RuleSet::compile(document) {
            Ok(set) => set,
            Err(err) => {
                warn!(error = %err, "rule set reload rejected, keeping last-known-good");
                return Err(err);
            }
        };
        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(compiled);
        debug!("rule set reloaded");
        Ok(())
    }

    /// The snapshot currently serving. In-flight callers keep their Arc
    /// across any concurrent reload.
    pub fn snapshot(&self) -> Arc<RuleSet> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Evaluate a decision context against the current snapshot.
    pub fn evaluate(&self, context: &DecisionContext) -> Decision {
        let snapshot = self.snapshot();
        let decision = evaluate_snapshot(context, &snapshot);
        debug!(
            boundary = %context.boundary,
            action = %decision.action,
            matched_rule = decision.matched_rule.as_deref().unwrap_or("<default>"),
            "policy decision"
        );
        decision
    }
}

/// Pure evaluation against one snapshot.
pub fn evaluate_snapshot(context: &DecisionContext, rules: &RuleSet) -> Decision {
    for rule in rules.rules() {
        if !rule.boundary.applies_to(context.boundary) {
            continue;
        }
        if !rule.condition_matches(
            context.agent_id.as_deref(),
            context.tool_name.as_deref(),
            &context.data_tags,
        ) {
            continue;
        }
        return Decision {
            action: rule.action,
            matched_rule: Some(rule.name.clone()),
            reason: format!("rule '{}': {}", rule.name, rule.reason),
        };
    }

    Decision {
        action: rules.default_action(),
        matched_rule: None,
        reason: format!(
            "no rule matched at boundary '{}'; default action '{}' applies",
            context.boundary,
            rules.default_action()
        ),
    }
}
