//! Declarative policy definitions.
//!
//! Policies are data, not code: JSON/YAML-friendly documents parsed once
//! into this typed representation. A policy participates in evaluation only
//! when its `scope` matches the request context; its `conditions` tree then
//! decides whether the policy's `effect` is proposed.

use serde::{Deserialize, Serialize};

/// The outcome a single policy proposes when it matches.
///
/// `Deny`, `Review`, and `Allow` can decide a request. `Warn` and `Redact`
/// are advisory flags: they never decide the outcome by themselves, but
/// matching advisory policies are reported on the final decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Effect {
    Allow,
    Deny,
    Review,
    Warn,
    Redact,
}

impl Effect {
    /// Total restrictiveness order used for conflict resolution,
    /// most restrictive first: `Deny > Review > Warn = Redact > Allow`.
    ///
    /// When policies at the same priority tier propose different effects,
    /// the higher rank always wins — failing toward safety.
    pub fn restrictiveness(self) -> u8 {
        match self {
            Effect::Deny => 3,
            Effect::Review => 2,
            Effect::Warn | Effect::Redact => 1,
            Effect::Allow => 0,
        }
    }

    /// True for the advisory effects that cannot decide a request.
    pub fn is_advisory(self) -> bool {
        matches!(self, Effect::Warn | Effect::Redact)
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Effect::Allow => "ALLOW",
            Effect::Deny => "DENY",
            Effect::Review => "REVIEW",
            Effect::Warn => "WARN",
            Effect::Redact => "REDACT",
        };
        f.write_str(s)
    }
}

/// Optional participation filters for a policy.
///
/// Each present list must contain the corresponding context value for the
/// policy to participate; an absent list matches anything. An entirely
/// empty scope applies the policy to every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Environments this policy applies to (e.g. ["production"]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Vec<String>>,
    /// Resource types this policy applies to (e.g. ["model", "agent"]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<Vec<String>>,
    /// Actor roles this policy applies to (e.g. ["developer"]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_role: Option<Vec<String>>,
}

impl Scope {
    /// True when every present filter admits the given context values.
    pub fn matches(&self, environment: &str, resource_type: &str, actor_role: &str) -> bool {
        let admits = |filter: &Option<Vec<String>>, value: &str| match filter {
            Some(allowed) => allowed.iter().any(|v| v == value),
            None => true,
        };
        admits(&self.environment, environment)
            && admits(&self.resource_type, resource_type)
            && admits(&self.actor_role, actor_role)
    }
}

/// A leaf predicate comparing one context field against a literal.
///
/// The operator is flattened into the document alongside `field`:
///
/// ```yaml
/// field: tags
/// contains: pii
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Dotted field path resolved via `RequestContext::lookup`.
    pub field: String,
    #[serde(flatten)]
    pub op: PredicateOp,
}

/// The comparison a leaf predicate performs.
///
/// Numeric comparisons coerce JSON numbers directly and parse numeric
/// strings; any value that cannot be coerced makes the predicate false,
/// never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredicateOp {
    /// Exact value equality.
    Equals(serde_json::Value),
    /// Membership of the field value in the given list.
    In(Vec<serde_json::Value>),
    /// Substring match for strings; element membership for lists.
    Contains(serde_json::Value),
    /// Regular expression match on the string form of the field value.
    Matches(String),
    /// Numeric `>`.
    Gt(f64),
    /// Numeric `>=`.
    Gte(f64),
    /// Numeric `<`.
    Lt(f64),
    /// Numeric `<=`.
    Lte(f64),
}

/// A boolean expression tree over request context fields.
///
/// Logical nodes are externally tagged (`and:`, `or:`, `not:`); a bare
/// `{field, op, value}` mapping is a leaf predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    /// All children must be true.
    And(Vec<Condition>),
    /// At least one child must be true.
    Or(Vec<Condition>),
    /// Inverts a single child.
    Not(Box<Condition>),
    /// A single field comparison.
    #[serde(untagged)]
    Leaf(Predicate),
}

/// A versioned, declarative governance policy.
///
/// Example document:
///
/// ```yaml
/// id: prod-pii-requires-review
/// version: "1.0.0"
/// description: Access to PII in production requires human approval
/// scope:
///   environment: [production]
/// conditions:
///   field: tags
///   contains: pii
/// effect: REVIEW
/// priority: 100
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Stable identifier used in decisions and audit entries.
    pub id: String,
    /// Document version string.
    #[serde(default = "default_version")]
    pub version: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// What this policy controls, quoted in decision reasons.
    #[serde(default)]
    pub description: String,
    /// Participation filters; empty scope applies everywhere.
    #[serde(default)]
    pub scope: Scope,
    /// When the policy triggers; absent conditions always trigger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Condition>,
    /// What happens when the policy matches.
    pub effect: Effect,
    /// Conflict resolution order: higher priorities evaluate first.
    /// Ties break by policy id ascending for full determinism.
    #[serde(default)]
    pub priority: i64,
}

fn default_version() -> String {
    "1.0.0".to_string()
}
