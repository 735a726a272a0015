// rule.rs — Policy rule documents and the validated RuleSet snapshot.
//
// A rule maps a condition (boundary, data tags, optional tool/agent) to an
// action. Rules arrive as serde documents from an external config loader;
// `RuleSet::compile` validates them into an immutable snapshot. The engine
// only ever evaluates against one snapshot at a time, so a reload can never
// mix old and new rules in one evaluation.
//
// Priority convention (held system-wide): lower priority number = higher
// precedence. Ties are broken by document order. The sort happens once at
// compile time, so evaluation is a plain first-match scan.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::tag::any_tag_matches;

/// The boundary a rule applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// Data entering an agent.
    Input,
    /// A tool call made by an agent.
    Action,
    /// Data leaving an agent.
    Output,
    /// A message from one agent to another.
    AgentMessage,
    /// Any boundary.
    #[serde(rename = "*")]
    Any,
}

impl Boundary {
    /// Whether a rule declared for `self` applies to a crossing at `at`.
    pub fn applies_to(&self, at: Boundary) -> bool {
        *self == Boundary::Any || *self == at
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::Input => write!(f, "input"),
            Boundary::Action => write!(f, "action"),
            Boundary::Output => write!(f, "output"),
            Boundary::AgentMessage => write!(f, "agent_message"),
            Boundary::Any => write!(f, "*"),
        }
    }
}

/// What a matched rule does to the crossing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Let the payload through unchanged.
    Allow,
    /// Let the payload through with detected values masked.
    Redact,
    /// Withhold the payload.
    Block,
    /// Pause the crossing until a human resolves an approval request.
    RequireApproval,
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::Allow => write!(f, "allow"),
            RuleAction::Redact => write!(f, "redact"),
            RuleAction::Block => write!(f, "block"),
            RuleAction::RequireApproval => write!(f, "require_approval"),
        }
    }
}

/// The condition half of a rule. Every *specified* field must match; the
/// tag list matches when any rule tag hierarchically covers any context tag.
/// An empty tag list leaves that dimension unconstrained.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleCondition {
    /// Tags this rule fires on (hierarchical prefix matching).
    #[serde(default)]
    pub data_tags: Vec<String>,

    /// Restrict the rule to one tool.
    #[serde(default)]
    pub tool_name: Option<String>,

    /// Restrict the rule to one agent.
    #[serde(default)]
    pub agent_id: Option<String>,
}

/// One declarative policy rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Unique rule name, referenced by decisions and audit events.
    pub name: String,

    /// Which boundary this rule applies to.
    pub boundary: Boundary,

    /// Lower number = higher precedence.
    pub priority: u32,

    /// When this rule fires.
    #[serde(default)]
    pub condition: RuleCondition,

    /// What happens when it fires.
    pub action: RuleAction,

    /// Human explanation, surfaced in decisions and audit events.
    pub reason: String,
}

impl PolicyRule {
    /// Whether this rule's condition is satisfied by the given context fields.
    pub fn condition_matches(
        &self,
        agent_id: Option<&str>,
        tool_name: Option<&str>,
        data_tags: &[String],
    ) -> bool {
        if let Some(rule_tool) = &self.condition.tool_name {
            if tool_name != Some(rule_tool.as_str()) {
                return false;
            }
        }
        if let Some(rule_agent) = &self.condition.agent_id {
            if agent_id != Some(rule_agent.as_str()) {
                return false;
            }
        }
        if !self.condition.data_tags.is_empty()
            && !any_tag_matches(&self.condition.data_tags, data_tags)
        {
            return false;
        }
        true
    }
}

/// The serde form a rule set arrives in from the external config loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetDocument {
    /// Decision when no rule matches. Must be `block` or `require_approval`;
    /// a fail-open default is a configuration error, not a runtime fallback.
    pub default_action: RuleAction,

    /// Rules, in document order.
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

/// An immutable, validated rule-set snapshot.
///
/// Rules are pre-sorted by (priority, document order) so evaluation is a
/// first-match scan. Snapshots are shared behind an `Arc` and replaced
/// atomically on reload.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<PolicyRule>,
    default_action: RuleAction,
}

impl RuleSet {
    /// Validate and compile a rule-set document into a snapshot.
    pub fn compile(document: RuleSetDocument) -> Result<Self, PolicyError> {
        if matches!(
            document.default_action,
            RuleAction::Allow | RuleAction::Redact
        ) {
            return Err(PolicyError::DefaultNotClosed(
                document.default_action.to_string(),
            ));
        }

        let mut seen: Vec<&str> = Vec::new();
        for rule in &document.rules {
            if seen.contains(&rule.name.as_str()) {
                return Err(PolicyError::DuplicateRuleName(rule.name.clone()));
            }
            seen.push(&rule.name);

            for tag in &rule.condition.data_tags {
                let malformed =
                    tag.is_empty() || (tag != "*" && tag.split('.').any(|seg| seg.is_empty()));
                if malformed {
                    return Err(PolicyError::MalformedTag {
                        rule: rule.name.clone(),
                        tag: tag.clone(),
                    });
                }
            }
        }

        let mut rules = document.rules;
        // Stable sort keeps document order within equal priorities.
        rules.sort_by_key(|r| r.priority);

        Ok(Self {
            rules,
            default_action: document.default_action,
        })
    }

    /// An empty snapshot that blocks everything.
    pub fn deny_all() -> Self {
        Self {
            rules: Vec::new(),
            default_action: RuleAction::Block,
        }
    }

    /// The rules in evaluation order.
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// The configured default action.
    pub fn default_action(&self) -> RuleAction {
        self.default_action
    }
}
