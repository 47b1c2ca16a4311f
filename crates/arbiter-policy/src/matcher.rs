//! The condition matcher: a compiled predicate tree with never-throw evaluation.
//!
//! Declarative condition documents are compiled once at load time into this
//! typed AST — regular expressions compile here, malformed trees are rejected
//! here — so evaluation is a pure, infallible walk. A predicate that cannot
//! be evaluated (missing field, type mismatch, non-numeric comparison value)
//! is false, never an error.

use regex::Regex;
use tracing::trace;

use arbiter_contracts::{
    context::RequestContext,
    error::{ArbiterError, ArbiterResult},
    policy::{Condition, Predicate, PredicateOp},
};

/// A compiled boolean expression tree, ready for evaluation.
#[derive(Debug, Clone)]
pub enum CompiledCondition {
    And(Vec<CompiledCondition>),
    Or(Vec<CompiledCondition>),
    Not(Box<CompiledCondition>),
    Leaf(CompiledPredicate),
}

/// A compiled leaf predicate.
#[derive(Debug, Clone)]
pub struct CompiledPredicate {
    field: String,
    op: CompiledOp,
}

#[derive(Debug, Clone)]
enum CompiledOp {
    Equals(serde_json::Value),
    In(Vec<serde_json::Value>),
    Contains(serde_json::Value),
    Matches(Regex),
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
}

impl CompiledCondition {
    /// Compile a condition document into an evaluable tree.
    ///
    /// Rejected at load time, never at evaluation time:
    /// - `and`/`or` nodes with no children
    /// - leaf predicates with an empty `field`
    /// - `matches` predicates whose pattern is not a valid regex
    pub fn compile(condition: &Condition) -> ArbiterResult<Self> {
        match condition {
            Condition::And(children) => {
                if children.is_empty() {
                    return Err(ArbiterError::PolicyLoad {
                        reason: "'and' condition requires at least one child".to_string(),
                    });
                }
                let compiled = children.iter().map(Self::compile).collect::<Result<_, _>>()?;
                Ok(CompiledCondition::And(compiled))
            }
            Condition::Or(children) => {
                if children.is_empty() {
                    return Err(ArbiterError::PolicyLoad {
                        reason: "'or' condition requires at least one child".to_string(),
                    });
                }
                let compiled = children.iter().map(Self::compile).collect::<Result<_, _>>()?;
                Ok(CompiledCondition::Or(compiled))
            }
            Condition::Not(child) => {
                Ok(CompiledCondition::Not(Box::new(Self::compile(child)?)))
            }
            Condition::Leaf(predicate) => {
                Ok(CompiledCondition::Leaf(CompiledPredicate::compile(predicate)?))
            }
        }
    }

    /// Evaluate the tree against a request context. Infallible by design.
    pub fn eval(&self, ctx: &RequestContext) -> bool {
        match self {
            CompiledCondition::And(children) => children.iter().all(|c| c.eval(ctx)),
            CompiledCondition::Or(children) => children.iter().any(|c| c.eval(ctx)),
            CompiledCondition::Not(child) => !child.eval(ctx),
            CompiledCondition::Leaf(predicate) => predicate.eval(ctx),
        }
    }
}

impl CompiledPredicate {
    fn compile(predicate: &Predicate) -> ArbiterResult<Self> {
        if predicate.field.is_empty() {
            return Err(ArbiterError::PolicyLoad {
                reason: "predicate requires a non-empty 'field'".to_string(),
            });
        }

        let op = match &predicate.op {
            PredicateOp::Equals(v) => CompiledOp::Equals(v.clone()),
            PredicateOp::In(list) => CompiledOp::In(list.clone()),
            PredicateOp::Contains(v) => CompiledOp::Contains(v.clone()),
            PredicateOp::Matches(pattern) => {
                let regex = Regex::new(pattern).map_err(|e| ArbiterError::PolicyLoad {
                    reason: format!(
                        "invalid regex '{}' in predicate on field '{}': {}",
                        pattern, predicate.field, e
                    ),
                })?;
                CompiledOp::Matches(regex)
            }
            PredicateOp::Gt(n) => CompiledOp::Gt(*n),
            PredicateOp::Gte(n) => CompiledOp::Gte(*n),
            PredicateOp::Lt(n) => CompiledOp::Lt(*n),
            PredicateOp::Lte(n) => CompiledOp::Lte(*n),
        };

        Ok(Self { field: predicate.field.clone(), op })
    }

    fn eval(&self, ctx: &RequestContext) -> bool {
        let Some(value) = ctx.lookup(&self.field) else {
            trace!(field = %self.field, "predicate field missing; predicate is false");
            return false;
        };

        match &self.op {
            CompiledOp::Equals(expected) => &value == expected,

            CompiledOp::In(list) => list.contains(&value),

            // Substring match for strings, element membership for lists.
            CompiledOp::Contains(needle) => match &value {
                serde_json::Value::String(s) => {
                    needle.as_str().is_some_and(|n| s.contains(n))
                }
                serde_json::Value::Array(items) => items.contains(needle),
                _ => false,
            },

            CompiledOp::Matches(regex) => match string_form(&value) {
                Some(s) => regex.is_match(&s),
                None => false,
            },

            CompiledOp::Gt(n) => numeric_form(&value).is_some_and(|v| v > *n),
            CompiledOp::Gte(n) => numeric_form(&value).is_some_and(|v| v >= *n),
            CompiledOp::Lt(n) => numeric_form(&value).is_some_and(|v| v < *n),
            CompiledOp::Lte(n) => numeric_form(&value).is_some_and(|v| v <= *n),
        }
    }
}

/// The string a `matches` predicate tests. Scalars only; matching a regex
/// against a list or object is a type mismatch and therefore false.
fn string_form(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numeric coercion for comparison operators: JSON numbers directly,
/// numeric strings by parsing. Anything else fails the comparison.
fn numeric_form(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
