//! The decision service: the single public entry point of the governance layer.
//!
//! Every inbound request flows through `DecisionService::decide`:
//!
//!   RequestContext → audit(submitted) → evaluate → audit(evaluated)
//!                  → [approval workflow if REVIEW] → GovernanceOutcome
//!
//! The governing principle is fail closed: any internal fault — an evaluator
//! defect, a failed audit write, an approval engine error — manifests
//! externally as a blocked request with a truthful generic reason, never as
//! a silent allow. A decision that cannot be recorded does not take effect.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use arbiter_contracts::{
    approval::ApprovalRequest,
    audit::AuditEventKind,
    context::RequestContext,
    decision::{Decision, Outcome},
    error::ArbiterResult,
};

use crate::traits::{Approvals, AuditStore, DecisionEngine};

/// The reason reported to callers when the pipeline itself failed.
pub const UNAVAILABLE_REASON: &str = "governance system unavailable — request blocked";

/// What the governance layer tells the caller to do with the request.
#[derive(Debug)]
pub enum GovernanceOutcome {
    /// Proceed automatically.
    Allowed { decision: Decision },

    /// Block outright: a policy denied the request.
    Denied { decision: Decision },

    /// Pause: a policy required human review. The caller must wait for the
    /// approval request to resolve before proceeding.
    PendingApproval {
        decision: Decision,
        request: ApprovalRequest,
    },

    /// Fail-closed block: the governance pipeline itself failed and the
    /// request must not proceed. No decision is attached because none could
    /// be recorded.
    Unavailable { request_id: String, reason: String },
}

impl GovernanceOutcome {
    /// True when the caller may execute the request now.
    pub fn is_allowed(&self) -> bool {
        matches!(self, GovernanceOutcome::Allowed { .. })
    }
}

/// The orchestrator wiring evaluator, audit trail, and approval engine.
///
/// Construct once at startup with the trusted components; `decide` may then
/// be called from any number of threads concurrently.
pub struct DecisionService {
    engine: Box<dyn DecisionEngine>,
    audit: Arc<dyn AuditStore>,
    approvals: Arc<dyn Approvals>,
    /// The workflow opened for REVIEW outcomes.
    review_workflow_id: String,
}

impl DecisionService {
    pub fn new(
        engine: Box<dyn DecisionEngine>,
        audit: Arc<dyn AuditStore>,
        approvals: Arc<dyn Approvals>,
        review_workflow_id: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            audit,
            approvals,
            review_workflow_id: review_workflow_id.into(),
        }
    }

    /// Run one request through the full governance pipeline.
    ///
    /// # Pipeline
    ///
    /// 1. Assign a `request_id` and audit `request.submitted`
    /// 2. Evaluate the context against the active policy snapshot
    /// 3. Audit `policy.evaluated` with the full decision
    /// 4. DENY → audit `request.blocked`, return `Denied`
    /// 5. REVIEW → open an approval request, return `PendingApproval`
    /// 6. ALLOW → return `Allowed`
    ///
    /// Any failure in steps 1–5 short-circuits to `Unavailable` — the
    /// request is blocked, loudly logged, and never silently allowed.
    /// The `Err` path of this method is reserved for caller mistakes
    /// (none today); pipeline faults are always expressed as an outcome.
    pub fn decide(&self, ctx: &RequestContext) -> ArbiterResult<GovernanceOutcome> {
        let request_id = format!("req-{}", Uuid::new_v4());

        debug!(
            request_id = %request_id,
            actor_id = %ctx.actor_id,
            resource_id = %ctx.resource_id,
            environment = %ctx.environment,
            "governance decision starting"
        );

        // ── Step 1: the request enters the record ────────────────────────────
        let submitted = self.audit.append(
            AuditEventKind::RequestSubmitted,
            json!({
                "actor_id": ctx.actor_id,
                "actor_role": ctx.actor_role,
                "resource_id": ctx.resource_id,
                "resource_type": ctx.resource_type,
                "environment": ctx.environment,
                "intent": ctx.intent,
                "tags": ctx.tags,
            }),
            &[request_id.clone()],
        );
        if let Err(e) = submitted {
            error!(request_id = %request_id, error = %e, "audit write failed; failing closed");
            return Ok(self.unavailable(request_id));
        }

        // ── Step 2: deterministic evaluation ─────────────────────────────────
        //
        // The evaluator never throws on bad request data; an error here is a
        // programming defect and must block the request.
        let decision = match self.engine.evaluate(ctx) {
            Ok(decision) => decision,
            Err(e) => {
                error!(request_id = %request_id, error = %e, "evaluation fault; failing closed");
                self.audit_blocked(&request_id, None, &e.to_string());
                return Ok(self.unavailable(request_id));
            }
        };

        // ── Step 3: the decision enters the record before it takes effect ───
        let evaluated = self.audit.append(
            AuditEventKind::PolicyEvaluated,
            json!({
                "request_id": request_id,
                "decision_id": decision.id,
                "outcome": decision.outcome,
                "matched_policies": decision.matched_policies,
                "deciding_policy": decision.deciding_policy,
                "advisories": decision.advisories,
                "reason": decision.reason,
            }),
            &[request_id.clone(), decision.id.clone()],
        );
        if let Err(e) = evaluated {
            error!(request_id = %request_id, error = %e, "audit write failed; failing closed");
            return Ok(self.unavailable(request_id));
        }

        // ── Steps 4–6: act on the outcome ────────────────────────────────────
        match decision.outcome {
            Outcome::Deny => {
                warn!(
                    request_id = %request_id,
                    deciding_policy = decision.deciding_policy.as_deref().unwrap_or(""),
                    reason = %decision.reason,
                    "request denied by policy"
                );
                self.audit_blocked(&request_id, Some(&decision), &decision.reason);
                Ok(GovernanceOutcome::Denied { decision })
            }

            Outcome::Review => {
                info!(
                    request_id = %request_id,
                    decision_id = %decision.id,
                    workflow = %self.review_workflow_id,
                    "request paused for human review"
                );
                match self
                    .approvals
                    .request_approval(&decision, &self.review_workflow_id)
                {
                    Ok(request) => Ok(GovernanceOutcome::PendingApproval { decision, request }),
                    Err(e) => {
                        error!(
                            request_id = %request_id,
                            error = %e,
                            "approval workflow failed; failing closed"
                        );
                        self.audit_blocked(&request_id, Some(&decision), &e.to_string());
                        Ok(self.unavailable(request_id))
                    }
                }
            }

            Outcome::Allow => {
                debug!(request_id = %request_id, decision_id = %decision.id, "request allowed");
                Ok(GovernanceOutcome::Allowed { decision })
            }
        }
    }

    fn unavailable(&self, request_id: String) -> GovernanceOutcome {
        GovernanceOutcome::Unavailable {
            request_id,
            reason: UNAVAILABLE_REASON.to_string(),
        }
    }

    /// Best-effort `request.blocked` entry. A failure here is logged but not
    /// propagated: the request is already being blocked, and the earlier
    /// pipeline entries carry the evidence.
    fn audit_blocked(&self, request_id: &str, decision: Option<&Decision>, reason: &str) {
        let mut correlation = vec![request_id.to_string()];
        if let Some(d) = decision {
            correlation.push(d.id.clone());
        }
        let result = self.audit.append(
            AuditEventKind::RequestBlocked,
            json!({
                "request_id": request_id,
                "decision_id": decision.map(|d| d.id.clone()),
                "reason": reason,
            }),
            &correlation,
        );
        if let Err(e) = result {
            error!(request_id = %request_id, error = %e, "could not record blocked request");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
