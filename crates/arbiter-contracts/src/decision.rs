//! The canonical decision output of one policy evaluation.
//!
//! Every evaluation produces exactly one of three outcomes: ALLOW, DENY, or
//! REVIEW. No ambiguity, no "probably allowed". Everything else on the
//! decision is explanatory metadata for audit and review surfaces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::Effect;

/// The final outcome of evaluating a request against all applicable policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    /// Proceed automatically.
    Allow,
    /// Block outright.
    Deny,
    /// Pause for a human decision.
    Review,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Allow => "ALLOW",
            Outcome::Deny => "DENY",
            Outcome::Review => "REVIEW",
        };
        f.write_str(s)
    }
}

/// An advisory flag proposed by a matching WARN/REDACT policy.
///
/// Advisories never decide the outcome; downstream consumers act on them
/// (log prominently, redact response fields) alongside an ALLOW.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    /// The policy that proposed the flag.
    pub policy_id: String,
    /// `Warn` or `Redact`.
    pub effect: Effect,
}

/// The immutable result of one policy evaluation.
///
/// Created by the evaluator, consumed immediately by the orchestrator,
/// referenced (never owned) by audit entries and approval requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Unique id; approval requests refer to it as `related_decision_id`.
    pub id: String,
    /// ALLOW, DENY, or REVIEW.
    pub outcome: Outcome,
    /// Ids of every policy that matched, most influential first.
    pub matched_policies: Vec<String>,
    /// The single policy whose effect determined the outcome, when one did.
    /// `None` only for the default ALLOW with no matching policies.
    pub deciding_policy: Option<String>,
    /// Advisory WARN/REDACT flags from matching soft policies.
    pub advisories: Vec<Advisory>,
    /// Human-readable explanation of why the outcome was reached.
    pub reason: String,
    /// Wall-clock time (UTC) the decision was produced.
    pub timestamp: DateTime<Utc>,
}
