//! The deterministic policy evaluator.
//!
//! `evaluate()` is a pure function over `(policy set, context)`: no I/O,
//! no randomness, no wall-clock branching. Given identical inputs it
//! returns a byte-identical `Decision` on every call, on every machine,
//! regardless of thread — the id and timestamp are explicit arguments
//! precisely so nothing inside the function varies between calls.
//!
//! Evaluation algorithm:
//!
//! 1. Filter to policies whose scope matches the context.
//! 2. Walk them in load order (priority descending, id ascending).
//! 3. Collect every match. Any DENY match decides immediately; otherwise
//!    the first REVIEW match decides; otherwise the request is allowed.
//!    WARN/REDACT matches never decide — they accumulate as advisories.
//!
//! DENY is absolute: it wins regardless of the priority of competing
//! ALLOW/REVIEW matches. This is the "fail toward safety" conflict rule.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use arbiter_contracts::{
    context::RequestContext,
    decision::{Advisory, Decision, Outcome},
    error::{ArbiterError, ArbiterResult},
    policy::{Effect, Policy},
};
use arbiter_core::traits::{Clock, DecisionEngine};

use crate::{matcher::CompiledCondition, snapshot::PolicySnapshot};

/// A policy paired with its compiled condition tree.
#[derive(Debug, Clone)]
pub struct LoadedPolicy {
    pub policy: Policy,
    condition: Option<CompiledCondition>,
}

impl LoadedPolicy {
    /// True when both scope and conditions admit the context.
    /// Absent conditions always trigger.
    fn matches(&self, ctx: &RequestContext) -> bool {
        if !self
            .policy
            .scope
            .matches(&ctx.environment, &ctx.resource_type, &ctx.actor_role)
        {
            return false;
        }
        match &self.condition {
            Some(condition) => condition.eval(ctx),
            None => true,
        }
    }
}

/// An immutable, validated, pre-sorted set of policies.
///
/// Construction compiles every condition tree and rejects the whole set on
/// any malformed policy; evaluation never sees an invalid policy. The
/// evaluation order — priority descending, ties broken by id ascending —
/// is fixed at construction for full determinism.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    policies: Vec<LoadedPolicy>,
}

impl PolicySet {
    /// Validate and compile `policies` into an evaluable set.
    ///
    /// The whole load is rejected on the first malformed policy: an empty
    /// id, a duplicate id, or an invalid condition tree. No partial set is
    /// ever produced.
    pub fn from_policies(policies: Vec<Policy>) -> ArbiterResult<Self> {
        let mut seen = std::collections::HashSet::new();
        let mut loaded = Vec::with_capacity(policies.len());

        for policy in policies {
            if policy.id.is_empty() {
                return Err(ArbiterError::PolicyLoad {
                    reason: "policy requires a non-empty id".to_string(),
                });
            }
            if !seen.insert(policy.id.clone()) {
                return Err(ArbiterError::PolicyLoad {
                    reason: format!("duplicate policy id '{}'", policy.id),
                });
            }

            let condition = policy
                .conditions
                .as_ref()
                .map(CompiledCondition::compile)
                .transpose()
                .map_err(|e| match e {
                    ArbiterError::PolicyLoad { reason } => ArbiterError::PolicyLoad {
                        reason: format!("policy '{}': {}", policy.id, reason),
                    },
                    other => other,
                })?;

            loaded.push(LoadedPolicy { policy, condition });
        }

        // Priority descending; ties break by id ascending.
        loaded.sort_by(|a, b| {
            b.policy
                .priority
                .cmp(&a.policy.priority)
                .then_with(|| a.policy.id.cmp(&b.policy.id))
        });

        Ok(Self { policies: loaded })
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Policies in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &Policy> {
        self.policies.iter().map(|l| &l.policy)
    }
}

/// Evaluate a request context against a policy set.
///
/// Pure and infallible: repeated calls with the same arguments produce the
/// same `Decision`. The caller supplies `decision_id` and `now` so that id
/// assignment and timestamping stay outside the deterministic core.
pub fn evaluate(
    set: &PolicySet,
    ctx: &RequestContext,
    decision_id: &str,
    now: DateTime<Utc>,
) -> Decision {
    let mut matched: Vec<String> = Vec::new();
    let mut advisories: Vec<Advisory> = Vec::new();
    let mut first_review: Option<&Policy> = None;

    for loaded in &set.policies {
        if !loaded.matches(ctx) {
            continue;
        }
        let policy = &loaded.policy;
        matched.push(policy.id.clone());

        match policy.effect {
            // DENY has absolute priority: return the moment one matches.
            Effect::Deny => {
                debug!(policy_id = %policy.id, "deny policy matched; evaluation complete");
                front_load(&mut matched, &policy.id);
                return Decision {
                    id: decision_id.to_string(),
                    outcome: Outcome::Deny,
                    matched_policies: matched,
                    deciding_policy: Some(policy.id.clone()),
                    advisories,
                    reason: format!("Denied by policy {}: {}", policy.id, policy.description),
                    timestamp: now,
                };
            }

            // The first REVIEW decides only if no DENY matches anywhere,
            // so the scan continues.
            Effect::Review => {
                first_review.get_or_insert(policy);
            }

            Effect::Warn | Effect::Redact => {
                advisories.push(Advisory {
                    policy_id: policy.id.clone(),
                    effect: policy.effect,
                });
            }

            Effect::Allow => {}
        }
    }

    if let Some(policy) = first_review {
        front_load(&mut matched, &policy.id);
        return Decision {
            id: decision_id.to_string(),
            outcome: Outcome::Review,
            matched_policies: matched,
            deciding_policy: Some(policy.id.clone()),
            advisories,
            reason: format!(
                "Review required by policy {}: {}",
                policy.id, policy.description
            ),
            timestamp: now,
        };
    }

    // No blocking policy matched. Matched ALLOW policies (and advisories)
    // are reported; the first explicit ALLOW is credited as deciding.
    let deciding_allow = set
        .policies
        .iter()
        .filter(|l| l.policy.effect == Effect::Allow)
        .map(|l| &l.policy.id)
        .find(|id| matched.contains(id))
        .cloned();
    if let Some(id) = &deciding_allow {
        front_load(&mut matched, id);
    }

    Decision {
        id: decision_id.to_string(),
        outcome: Outcome::Allow,
        matched_policies: matched,
        deciding_policy: deciding_allow,
        advisories,
        reason: "No blocking policies matched".to_string(),
        timestamp: now,
    }
}

/// Move the deciding policy to the front of the matched list so the order
/// reads most-influential first.
fn front_load(matched: &mut Vec<String>, deciding: &str) {
    if let Some(pos) = matched.iter().position(|id| id == deciding) {
        let id = matched.remove(pos);
        matched.insert(0, id);
    }
}

/// A `DecisionEngine` over the currently published policy snapshot.
///
/// Reads the snapshot once per call, so a concurrent reload never changes
/// the policy set mid-evaluation. Ids are fresh uuids; time comes from the
/// injected clock.
pub struct SnapshotEvaluator {
    snapshot: Arc<PolicySnapshot>,
    clock: Arc<dyn Clock>,
}

impl SnapshotEvaluator {
    pub fn new(snapshot: Arc<PolicySnapshot>, clock: Arc<dyn Clock>) -> Self {
        Self { snapshot, clock }
    }
}

impl DecisionEngine for SnapshotEvaluator {
    fn evaluate(&self, ctx: &RequestContext) -> ArbiterResult<Decision> {
        let set = self.snapshot.current();
        let decision_id = format!("dec-{}", Uuid::new_v4());
        Ok(evaluate(&set, ctx, &decision_id, self.clock.now()))
    }
}
