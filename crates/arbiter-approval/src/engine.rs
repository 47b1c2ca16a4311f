//! The approval workflow state machine.
//!
//! `ApprovalEngine` owns every live `ApprovalRequest` and drives its
//! lifecycle: `PENDING → (APPROVED | REJECTED | ESCALATED | EXPIRED)`.
//! Reviewers call `approve`/`reject`; an external scheduler calls
//! `check_timeouts` on a fixed interval.
//!
//! Two rules govern every transition:
//!
//! 1. **Audit before commit.** The audit entry for a transition is appended
//!    first; only if the append succeeds does the in-memory state change.
//!    A request whose transition could not be recorded stays where it was.
//! 2. **Per-request serialization.** Each request carries its own lock, so
//!    a human vote racing a timeout sweep resolves to exactly one winner;
//!    the loser observes a terminal status and errors out (or skips, for
//!    the idempotent sweep).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use arbiter_contracts::{
    approval::{ApprovalRequest, ApprovalStatus, ApprovalVote},
    audit::AuditEventKind,
    decision::Decision,
    error::{ArbiterError, ArbiterResult},
};
use arbiter_core::traits::{Approvals, AuditStore, Clock, SystemClock};

use crate::workflow::{FinalAction, TimeoutAction, WorkflowSet};

/// Human-in-the-loop approval engine over a static `WorkflowSet`.
pub struct ApprovalEngine {
    workflows: WorkflowSet,
    audit: Arc<dyn AuditStore>,
    clock: Arc<dyn Clock>,
    // Outer lock guards the map only; each request serializes its own
    // transitions behind its inner lock. Lock order is outer then inner,
    // except escalation which re-enters the outer lock after releasing it.
    requests: Mutex<HashMap<String, Arc<Mutex<ApprovalRequest>>>>,
}

impl ApprovalEngine {
    pub fn new(workflows: WorkflowSet, audit: Arc<dyn AuditStore>) -> Self {
        Self::with_clock(workflows, audit, Arc::new(SystemClock))
    }

    pub fn with_clock(
        workflows: WorkflowSet,
        audit: Arc<dyn AuditStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            workflows,
            audit,
            clock,
            requests: Mutex::new(HashMap::new()),
        }
    }

    fn handle(&self, request_id: &str) -> ArbiterResult<Arc<Mutex<ApprovalRequest>>> {
        let requests = self.requests.lock().map_err(|_| ArbiterError::EvaluationFault {
            reason: "approval request table lock poisoned".to_string(),
        })?;
        requests
            .get(request_id)
            .cloned()
            .ok_or_else(|| ArbiterError::ApprovalNotFound {
                id: request_id.to_string(),
            })
    }

    /// Build a new PENDING request at `escalation_level` under `workflow_id`
    /// and append its `approval.requested` entry, without registering it.
    ///
    /// Callers register the request separately, after any transition it
    /// depends on has committed; a failed append means no request exists.
    fn build_request(
        &self,
        related_decision_id: &str,
        workflow_id: &str,
        escalation_level: u32,
    ) -> ArbiterResult<ApprovalRequest> {
        let workflow = self.workflows.get(workflow_id)?;
        let now = self.clock.now();
        let request = ApprovalRequest {
            id: format!("apr-{}", Uuid::new_v4()),
            related_decision_id: related_decision_id.to_string(),
            workflow_id: workflow_id.to_string(),
            escalation_level,
            status: ApprovalStatus::Pending,
            required_approvals: workflow.required_approvals,
            received_approvals: Vec::new(),
            created_at: now,
            deadline: now + workflow.timeout(),
            superseded_by: None,
        };

        self.audit.append(
            AuditEventKind::ApprovalRequested,
            json!({
                "workflow_id": workflow_id,
                "escalation_level": escalation_level,
                "required_approvals": workflow.required_approvals,
                "deadline": request.deadline.to_rfc3339(),
            }),
            &[request.id.clone(), related_decision_id.to_string()],
        )?;

        info!(
            request_id = %request.id,
            workflow_id = %workflow_id,
            escalation_level,
            "approval request opened"
        );
        Ok(request)
    }

    /// Insert a built request into the live table, making it visible to
    /// votes, sweeps, and `pending()`.
    fn register(&self, request: ApprovalRequest) -> ArbiterResult<ApprovalRequest> {
        let mut requests = self.requests.lock().map_err(|_| ArbiterError::EvaluationFault {
            reason: "approval request table lock poisoned".to_string(),
        })?;
        requests.insert(request.id.clone(), Arc::new(Mutex::new(request.clone())));
        Ok(request)
    }

    /// Record one qualifying approval vote.
    ///
    /// Errors on an empty rationale, an unauthorized role, an unknown id,
    /// a repeat vote from the same approver, or a request already in a
    /// terminal state. When the vote reaches the workflow's quorum of
    /// distinct approvers the request transitions to APPROVED.
    pub fn approve(
        &self,
        request_id: &str,
        approver_id: &str,
        approver_role: &str,
        rationale: &str,
    ) -> ArbiterResult<ApprovalRequest> {
        if rationale.trim().is_empty() {
            return Err(ArbiterError::RationaleRequired);
        }
        let handle = self.handle(request_id)?;
        let mut request = handle.lock().map_err(|_| ArbiterError::EvaluationFault {
            reason: "approval request lock poisoned".to_string(),
        })?;

        if request.status.is_terminal() {
            return Err(ArbiterError::ApprovalAlreadyResolved {
                id: request.id.clone(),
                status: request.status.to_string(),
            });
        }
        let workflow = self.workflows.get(&request.workflow_id)?;
        if !workflow.allows_role(approver_role) {
            return Err(ArbiterError::ApproverNotAuthorized {
                role: approver_role.to_string(),
                workflow: request.workflow_id.clone(),
            });
        }
        // Quorum counts distinct approvers; a second vote from the same
        // approver is rejected rather than counted.
        if request
            .received_approvals
            .iter()
            .any(|vote| vote.approver_id == approver_id)
        {
            return Err(ArbiterError::DuplicateApproval {
                id: request.id.clone(),
                approver_id: approver_id.to_string(),
            });
        }

        let vote = ApprovalVote {
            approver_id: approver_id.to_string(),
            approver_role: approver_role.to_string(),
            rationale: rationale.to_string(),
            timestamp: self.clock.now(),
        };
        let votes_after = request.received_approvals.len() as u32 + 1;
        let quorum_reached = votes_after >= request.required_approvals;

        self.audit.append(
            AuditEventKind::ApprovalGranted,
            json!({
                "approver_id": approver_id,
                "approver_role": approver_role,
                "rationale": rationale,
                "votes": votes_after,
                "required_approvals": request.required_approvals,
                "quorum_reached": quorum_reached,
            }),
            &[request.id.clone(), request.related_decision_id.clone()],
        )?;

        request.received_approvals.push(vote);
        if quorum_reached {
            request.status = ApprovalStatus::Approved;
            info!(request_id = %request.id, votes = votes_after, "approval quorum reached");
        } else {
            debug!(
                request_id = %request.id,
                votes = votes_after,
                required = request.required_approvals,
                "approval vote recorded, quorum not yet reached"
            );
        }
        Ok(request.clone())
    }

    /// Record a rejection. A single qualifying rejection is terminal;
    /// rejection never requires quorum.
    pub fn reject(
        &self,
        request_id: &str,
        approver_id: &str,
        approver_role: &str,
        rationale: &str,
    ) -> ArbiterResult<ApprovalRequest> {
        if rationale.trim().is_empty() {
            return Err(ArbiterError::RationaleRequired);
        }
        let handle = self.handle(request_id)?;
        let mut request = handle.lock().map_err(|_| ArbiterError::EvaluationFault {
            reason: "approval request lock poisoned".to_string(),
        })?;

        if request.status.is_terminal() {
            return Err(ArbiterError::ApprovalAlreadyResolved {
                id: request.id.clone(),
                status: request.status.to_string(),
            });
        }
        let workflow = self.workflows.get(&request.workflow_id)?;
        if !workflow.allows_role(approver_role) {
            return Err(ArbiterError::ApproverNotAuthorized {
                role: approver_role.to_string(),
                workflow: request.workflow_id.clone(),
            });
        }

        self.audit.append(
            AuditEventKind::ApprovalRejected,
            json!({
                "approver_id": approver_id,
                "approver_role": approver_role,
                "rationale": rationale,
                "timed_out": false,
            }),
            &[request.id.clone(), request.related_decision_id.clone()],
        )?;

        request.status = ApprovalStatus::Rejected;
        info!(request_id = %request.id, approver_id, "approval request rejected");
        Ok(request.clone())
    }

    /// Sweep every PENDING request whose deadline has passed and apply its
    /// workflow's timeout action. Returns the requests that transitioned.
    ///
    /// Idempotent: the status check-and-set happens under the per-request
    /// lock, so a second sweep (or a racing vote) finds the request already
    /// transitioned and skips it.
    pub fn check_timeouts(&self, now: DateTime<Utc>) -> ArbiterResult<Vec<ApprovalRequest>> {
        let handles: Vec<Arc<Mutex<ApprovalRequest>>> = {
            let requests = self.requests.lock().map_err(|_| ArbiterError::EvaluationFault {
                reason: "approval request table lock poisoned".to_string(),
            })?;
            requests.values().cloned().collect()
        };

        let mut transitioned = Vec::new();
        for handle in handles {
            let mut request = handle.lock().map_err(|_| ArbiterError::EvaluationFault {
                reason: "approval request lock poisoned".to_string(),
            })?;
            if request.status != ApprovalStatus::Pending || now < request.deadline {
                continue;
            }

            let workflow = self.workflows.get(&request.workflow_id)?;
            let rationale = format!(
                "timeout after {}s with no qualifying response",
                workflow.timeout_seconds
            );

            match workflow.on_timeout {
                TimeoutAction::Escalate => match &workflow.next_level_workflow {
                    Some(next_id) => {
                        // The replacement is registered only after the
                        // original's transition commits. If either append
                        // fails, the original stays PENDING and no orphan
                        // next-level request exists; the next sweep retries.
                        let next = self.build_request(
                            &request.related_decision_id,
                            next_id,
                            request.escalation_level + 1,
                        )?;
                        self.audit.append(
                            AuditEventKind::ApprovalEscalated,
                            json!({
                                "from_workflow": request.workflow_id,
                                "to_workflow": next_id,
                                "from_level": request.escalation_level,
                                "to_level": next.escalation_level,
                            }),
                            &[
                                request.id.clone(),
                                next.id.clone(),
                                request.related_decision_id.clone(),
                            ],
                        )?;
                        request.status = ApprovalStatus::Escalated;
                        request.superseded_by = Some(next.id.clone());
                        warn!(
                            request_id = %request.id,
                            next_request_id = %next.id,
                            to_level = next.escalation_level,
                            "approval request escalated on timeout"
                        );
                        self.register(next)?;
                    }
                    None => self.apply_final_action(&mut request, workflow.on_final_timeout, &rationale)?,
                },
                TimeoutAction::Reject => {
                    self.audit.append(
                        AuditEventKind::ApprovalRejected,
                        json!({ "rationale": rationale, "timed_out": true }),
                        &[request.id.clone(), request.related_decision_id.clone()],
                    )?;
                    request.status = ApprovalStatus::Rejected;
                    warn!(request_id = %request.id, "approval request rejected on timeout");
                }
                TimeoutAction::Approve => {
                    self.audit.append(
                        AuditEventKind::ApprovalGranted,
                        json!({ "rationale": rationale, "timed_out": true, "quorum_reached": true }),
                        &[request.id.clone(), request.related_decision_id.clone()],
                    )?;
                    request.status = ApprovalStatus::Approved;
                    warn!(request_id = %request.id, "approval request auto-approved on timeout");
                }
            }
            transitioned.push(request.clone());
        }
        Ok(transitioned)
    }

    /// Terminal fallback at the top of an escalation chain.
    fn apply_final_action(
        &self,
        request: &mut ApprovalRequest,
        action: FinalAction,
        rationale: &str,
    ) -> ArbiterResult<()> {
        let (kind, status) = match action {
            FinalAction::Expire => (AuditEventKind::ApprovalExpired, ApprovalStatus::Expired),
            FinalAction::Reject => (AuditEventKind::ApprovalRejected, ApprovalStatus::Rejected),
            FinalAction::Approve => (AuditEventKind::ApprovalGranted, ApprovalStatus::Approved),
        };
        self.audit.append(
            kind,
            json!({
                "rationale": rationale,
                "timed_out": true,
                "escalation_level": request.escalation_level,
            }),
            &[request.id.clone(), request.related_decision_id.clone()],
        )?;
        request.status = status;
        warn!(
            request_id = %request.id,
            status = %status,
            "approval request resolved at top of escalation chain"
        );
        Ok(())
    }

    /// Snapshot of every PENDING request, ordered by creation time then id.
    pub fn pending(&self) -> Vec<ApprovalRequest> {
        // Snapshot the handles first; inner locks are never taken while the
        // table lock is held.
        let handles: Vec<Arc<Mutex<ApprovalRequest>>> = match self.requests.lock() {
            Ok(requests) => requests.values().cloned().collect(),
            Err(_) => return Vec::new(),
        };
        let mut pending: Vec<ApprovalRequest> = handles
            .iter()
            .filter_map(|handle| handle.lock().ok())
            .filter(|request| request.status == ApprovalStatus::Pending)
            .map(|request| request.clone())
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        pending
    }

    /// Snapshot of one request by id, if it exists.
    pub fn get(&self, request_id: &str) -> Option<ApprovalRequest> {
        let handle = self.handle(request_id).ok()?;
        let request = handle.lock().ok()?;
        Some(request.clone())
    }
}

impl Approvals for ApprovalEngine {
    fn request_approval(
        &self,
        decision: &Decision,
        workflow_id: &str,
    ) -> ArbiterResult<ApprovalRequest> {
        let request = self.build_request(&decision.id, workflow_id, 1)?;
        self.register(request)
    }
}
