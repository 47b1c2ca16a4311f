//! # arbiter-approval
//!
//! Human-in-the-loop approval workflows for the ARBITER governance layer.
//!
//! When policy evaluation yields REVIEW, the decision service opens an
//! `ApprovalRequest` here under a configured `ApprovalWorkflow`. Reviewers
//! drive it to APPROVED or REJECTED; an external scheduler sweeps deadlines
//! and applies each workflow's timeout action, escalating up the chain
//! (L1 → L2 → …) until a terminal state is reached.
//!
//! Every state transition appends its audit entry before the in-memory
//! state commits, so the full decision history — every vote, rationale, and
//! escalation — survives forever in the audit trail.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use arbiter_approval::{ApprovalEngine, WorkflowSet};
//!
//! let workflows = WorkflowSet::from_file(Path::new("config/workflows.toml"))?;
//! let engine = ApprovalEngine::new(workflows, audit.clone());
//!
//! let request = engine.request_approval(&decision, "review-l1")?;
//! engine.approve(&request.id, "alice", "reviewer", "data use is in scope")?;
//! ```

pub mod engine;
pub mod workflow;

pub use engine::ApprovalEngine;
pub use workflow::{ApprovalWorkflow, FinalAction, TimeoutAction, WorkflowSet};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;

    use arbiter_contracts::{
        approval::ApprovalStatus,
        audit::{AuditEntry, AuditEventKind, ChainVerification, ExportOptions},
        decision::{Decision, Outcome},
        error::{ArbiterError, ArbiterResult},
    };
    use arbiter_core::traits::{Approvals, AuditStore, Clock};

    use super::{ApprovalEngine, FinalAction, TimeoutAction, WorkflowSet};

    // ── Mock collaborators ───────────────────────────────────────────────────

    /// An `AuditStore` that records appended entries for assertions.
    struct RecordingAudit {
        entries: Mutex<Vec<AuditEntry>>,
    }

    impl RecordingAudit {
        fn new() -> Arc<Self> {
            Arc::new(Self { entries: Mutex::new(Vec::new()) })
        }

        fn kinds(&self) -> Vec<AuditEventKind> {
            self.entries.lock().unwrap().iter().map(|e| e.event_type).collect()
        }
    }

    impl AuditStore for RecordingAudit {
        fn append(
            &self,
            event_type: AuditEventKind,
            payload: serde_json::Value,
            correlation_ids: &[String],
        ) -> ArbiterResult<AuditEntry> {
            let mut entries = self.entries.lock().unwrap();
            let entry = AuditEntry {
                sequence: entries.len() as u64,
                event_type,
                payload,
                correlation_ids: correlation_ids.to_vec(),
                timestamp: Utc::now(),
                prev_hash: AuditEntry::GENESIS_HASH.to_string(),
                hash: format!("{:064x}", entries.len()),
                signature: String::new(),
            };
            entries.push(entry.clone());
            Ok(entry)
        }

        fn verify_integrity(&self) -> ChainVerification {
            ChainVerification::intact(self.len() as u64)
        }

        fn chain_of_custody(&self, correlation_id: &str) -> Vec<AuditEntry> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.correlation_ids.iter().any(|id| id == correlation_id))
                .cloned()
                .collect()
        }

        fn export(&self, _options: &ExportOptions) -> ArbiterResult<Vec<u8>> {
            Err(ArbiterError::AuditWrite { reason: "export not supported by mock".to_string() })
        }

        fn entries(&self) -> Vec<AuditEntry> {
            self.entries.lock().unwrap().clone()
        }

        fn len(&self) -> usize {
            self.entries.lock().unwrap().len()
        }
    }

    /// An `AuditStore` whose appends always fail.
    struct FailingAudit;

    impl AuditStore for FailingAudit {
        fn append(
            &self,
            _event_type: AuditEventKind,
            _payload: serde_json::Value,
            _correlation_ids: &[String],
        ) -> ArbiterResult<AuditEntry> {
            Err(ArbiterError::AuditWrite { reason: "storage offline".to_string() })
        }

        fn verify_integrity(&self) -> ChainVerification {
            ChainVerification::intact(0)
        }

        fn chain_of_custody(&self, _correlation_id: &str) -> Vec<AuditEntry> {
            Vec::new()
        }

        fn export(&self, _options: &ExportOptions) -> ArbiterResult<Vec<u8>> {
            Err(ArbiterError::AuditWrite { reason: "storage offline".to_string() })
        }

        fn entries(&self) -> Vec<AuditEntry> {
            Vec::new()
        }

        fn len(&self) -> usize {
            0
        }
    }

    /// An `AuditStore` that records entries but fails appends of one event
    /// kind while `broken` is set.
    struct FlakyAudit {
        inner: Arc<RecordingAudit>,
        failing_kind: AuditEventKind,
        broken: Mutex<bool>,
    }

    impl FlakyAudit {
        fn new(failing_kind: AuditEventKind) -> Arc<Self> {
            Arc::new(Self {
                inner: RecordingAudit::new(),
                failing_kind,
                broken: Mutex::new(true),
            })
        }

        fn heal(&self) {
            *self.broken.lock().unwrap() = false;
        }

        fn kinds(&self) -> Vec<AuditEventKind> {
            self.inner.kinds()
        }
    }

    impl AuditStore for FlakyAudit {
        fn append(
            &self,
            event_type: AuditEventKind,
            payload: serde_json::Value,
            correlation_ids: &[String],
        ) -> ArbiterResult<AuditEntry> {
            if event_type == self.failing_kind && *self.broken.lock().unwrap() {
                return Err(ArbiterError::AuditWrite { reason: "storage offline".to_string() });
            }
            self.inner.append(event_type, payload, correlation_ids)
        }

        fn verify_integrity(&self) -> ChainVerification {
            self.inner.verify_integrity()
        }

        fn chain_of_custody(&self, correlation_id: &str) -> Vec<AuditEntry> {
            self.inner.chain_of_custody(correlation_id)
        }

        fn export(&self, options: &ExportOptions) -> ArbiterResult<Vec<u8>> {
            self.inner.export(options)
        }

        fn entries(&self) -> Vec<AuditEntry> {
            self.inner.entries()
        }

        fn len(&self) -> usize {
            self.inner.len()
        }
    }

    /// A clock the test sets explicitly.
    struct FixedClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        fn at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self { now: Mutex::new(now) })
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn review_decision() -> Decision {
        Decision {
            id: "dec-1".to_string(),
            outcome: Outcome::Review,
            matched_policies: vec!["pii-review".to_string()],
            deciding_policy: Some("pii-review".to_string()),
            advisories: Vec::new(),
            reason: "Review required by policy pii-review: PII in production".to_string(),
            timestamp: t0(),
        }
    }

    const WORKFLOWS: &str = r#"
        [[workflow]]
        id = "review-l1"
        name = "First-line review"
        required_approvals = 2
        allowed_approver_roles = ["reviewer", "compliance-officer"]
        timeout_seconds = 3600
        on_timeout = "escalate"
        next_level_workflow = "review-l2"

        [[workflow]]
        id = "review-l2"
        name = "Escalated review"
        required_approvals = 1
        allowed_approver_roles = ["compliance-officer"]
        timeout_seconds = 7200
        on_timeout = "escalate"
    "#;

    fn engine_with(audit: Arc<dyn AuditStore>) -> ApprovalEngine {
        let workflows = WorkflowSet::from_toml_str(WORKFLOWS).unwrap();
        ApprovalEngine::with_clock(workflows, audit, FixedClock::at(t0()))
    }

    // ── Workflow loading ─────────────────────────────────────────────────────

    /// TOML definitions parse with defaults applied.
    #[test]
    fn test_workflow_toml_parsing() {
        let workflows = WorkflowSet::from_toml_str(WORKFLOWS).unwrap();
        assert_eq!(workflows.len(), 2);

        let l1 = workflows.get("review-l1").unwrap();
        assert_eq!(l1.required_approvals, 2);
        assert_eq!(l1.on_timeout, TimeoutAction::Escalate);
        assert_eq!(l1.next_level_workflow.as_deref(), Some("review-l2"));
        assert_eq!(l1.on_final_timeout, FinalAction::Expire);

        let l2 = workflows.get("review-l2").unwrap();
        assert!(l2.next_level_workflow.is_none());
        assert!(l2.allows_role("compliance-officer"));
        assert!(!l2.allows_role("reviewer"));
    }

    /// An escalation link to an unknown workflow rejects the whole set.
    #[test]
    fn test_dangling_escalation_link_rejected() {
        let toml = r#"
            [[workflow]]
            id = "only"
            name = "Only"
            allowed_approver_roles = ["reviewer"]
            timeout_seconds = 60
            on_timeout = "escalate"
            next_level_workflow = "missing"
        "#;
        let err = WorkflowSet::from_toml_str(toml).unwrap_err();
        match err {
            ArbiterError::Config { reason } => {
                assert!(reason.contains("missing"), "unexpected reason: {reason}");
            }
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    /// `required_approvals = 0` is a configuration error.
    #[test]
    fn test_zero_quorum_rejected() {
        let toml = r#"
            [[workflow]]
            id = "bad"
            name = "Bad"
            required_approvals = 0
            allowed_approver_roles = ["reviewer"]
            timeout_seconds = 60
            on_timeout = "reject"
        "#;
        assert!(matches!(
            WorkflowSet::from_toml_str(toml),
            Err(ArbiterError::Config { .. })
        ));
    }

    // ── Quorum and rejection ─────────────────────────────────────────────────

    /// A 2-of-2 workflow stays PENDING after one vote and transitions to
    /// APPROVED on the second.
    #[test]
    fn test_approval_quorum() {
        let audit = RecordingAudit::new();
        let engine = engine_with(audit.clone());
        let request = engine.request_approval(&review_decision(), "review-l1").unwrap();

        let after_one = engine
            .approve(&request.id, "alice", "reviewer", "data use is in scope")
            .unwrap();
        assert_eq!(after_one.status, ApprovalStatus::Pending);
        assert_eq!(after_one.received_approvals.len(), 1);

        let after_two = engine
            .approve(&request.id, "bob", "compliance-officer", "no policy conflict")
            .unwrap();
        assert_eq!(after_two.status, ApprovalStatus::Approved);
        assert_eq!(after_two.received_approvals.len(), 2);
        assert_eq!(after_two.received_approvals[1].approver_id, "bob");

        assert_eq!(
            audit.kinds(),
            vec![
                AuditEventKind::ApprovalRequested,
                AuditEventKind::ApprovalGranted,
                AuditEventKind::ApprovalGranted,
            ]
        );
    }

    /// One qualifying rejection is terminal on a 2-of-2 workflow; no second
    /// vote is awaited.
    #[test]
    fn test_rejection_short_circuit() {
        let audit = RecordingAudit::new();
        let engine = engine_with(audit.clone());
        let request = engine.request_approval(&review_decision(), "review-l1").unwrap();

        let rejected = engine
            .reject(&request.id, "alice", "reviewer", "request exceeds data minimization")
            .unwrap();
        assert_eq!(rejected.status, ApprovalStatus::Rejected);

        let last = audit.entries().pop().unwrap();
        assert_eq!(last.event_type, AuditEventKind::ApprovalRejected);
        assert_eq!(last.payload["rationale"], json!("request exceeds data minimization"));
        assert_eq!(last.payload["timed_out"], json!(false));
    }

    // ── Vote validation ──────────────────────────────────────────────────────

    /// A vote without a rationale is refused before anything else happens.
    #[test]
    fn test_rationale_mandatory() {
        let audit = RecordingAudit::new();
        let engine = engine_with(audit.clone());
        let request = engine.request_approval(&review_decision(), "review-l1").unwrap();

        assert!(matches!(
            engine.approve(&request.id, "alice", "reviewer", "   "),
            Err(ArbiterError::RationaleRequired)
        ));
        assert!(matches!(
            engine.reject(&request.id, "alice", "reviewer", ""),
            Err(ArbiterError::RationaleRequired)
        ));
        assert_eq!(engine.get(&request.id).unwrap().status, ApprovalStatus::Pending);
    }

    /// A vote from a role outside `allowed_approver_roles` is refused.
    #[test]
    fn test_unauthorized_role() {
        let audit = RecordingAudit::new();
        let engine = engine_with(audit.clone());
        let request = engine.request_approval(&review_decision(), "review-l1").unwrap();

        match engine.approve(&request.id, "mallory", "intern", "looks fine to me") {
            Err(ArbiterError::ApproverNotAuthorized { role, workflow }) => {
                assert_eq!(role, "intern");
                assert_eq!(workflow, "review-l1");
            }
            other => panic!("expected ApproverNotAuthorized, got {:?}", other),
        }
        assert!(engine.get(&request.id).unwrap().received_approvals.is_empty());
    }

    /// Quorum counts distinct approvers: a second vote from the same
    /// approver is refused and cannot satisfy a 2-of-2 workflow alone.
    #[test]
    fn test_duplicate_approver_rejected() {
        let audit = RecordingAudit::new();
        let engine = engine_with(audit.clone());
        let request = engine.request_approval(&review_decision(), "review-l1").unwrap();

        engine
            .approve(&request.id, "alice", "reviewer", "data use is in scope")
            .unwrap();
        match engine.approve(&request.id, "alice", "compliance-officer", "still in scope") {
            Err(ArbiterError::DuplicateApproval { id, approver_id }) => {
                assert_eq!(id, request.id);
                assert_eq!(approver_id, "alice");
            }
            other => panic!("expected DuplicateApproval, got {:?}", other),
        }

        let current = engine.get(&request.id).unwrap();
        assert_eq!(current.status, ApprovalStatus::Pending);
        assert_eq!(current.received_approvals.len(), 1);
        // Only the first vote was audited.
        assert_eq!(
            audit.kinds(),
            vec![AuditEventKind::ApprovalRequested, AuditEventKind::ApprovalGranted]
        );
    }

    /// Voting on a terminal request errors explicitly; no silent no-op.
    #[test]
    fn test_terminal_request_rejects_votes() {
        let audit = RecordingAudit::new();
        let engine = engine_with(audit.clone());
        let request = engine.request_approval(&review_decision(), "review-l1").unwrap();
        engine
            .reject(&request.id, "alice", "reviewer", "out of scope")
            .unwrap();

        match engine.approve(&request.id, "bob", "reviewer", "second thoughts") {
            Err(ArbiterError::ApprovalAlreadyResolved { id, status }) => {
                assert_eq!(id, request.id);
                assert_eq!(status, "rejected");
            }
            other => panic!("expected ApprovalAlreadyResolved, got {:?}", other),
        }
    }

    /// Operating on an unknown id errors with `ApprovalNotFound`.
    #[test]
    fn test_unknown_request() {
        let audit = RecordingAudit::new();
        let engine = engine_with(audit);
        assert!(matches!(
            engine.approve("apr-missing", "alice", "reviewer", "x"),
            Err(ArbiterError::ApprovalNotFound { .. })
        ));
    }

    // ── Timeouts and escalation ──────────────────────────────────────────────

    /// An expired L1 request escalates: exactly one new request opens at
    /// level 2 under the next workflow, and the original is marked
    /// ESCALATED with `superseded_by` pointing at its replacement.
    #[test]
    fn test_timeout_escalation_chain() {
        let audit = RecordingAudit::new();
        let engine = engine_with(audit.clone());
        let request = engine.request_approval(&review_decision(), "review-l1").unwrap();

        let transitioned = engine.check_timeouts(t0() + Duration::seconds(3601)).unwrap();
        assert_eq!(transitioned.len(), 1);

        let original = engine.get(&request.id).unwrap();
        assert_eq!(original.status, ApprovalStatus::Escalated);
        let next_id = original.superseded_by.clone().unwrap();

        let next = engine.get(&next_id).unwrap();
        assert_eq!(next.status, ApprovalStatus::Pending);
        assert_eq!(next.escalation_level, 2);
        assert_eq!(next.workflow_id, "review-l2");
        assert_eq!(next.related_decision_id, "dec-1");

        assert_eq!(
            audit.kinds(),
            vec![
                AuditEventKind::ApprovalRequested,
                AuditEventKind::ApprovalRequested,
                AuditEventKind::ApprovalEscalated,
            ]
        );
    }

    /// A second sweep at the same instant must not double-escalate.
    #[test]
    fn test_check_timeouts_idempotent() {
        let audit = RecordingAudit::new();
        let engine = engine_with(audit.clone());
        engine.request_approval(&review_decision(), "review-l1").unwrap();

        let later = t0() + Duration::seconds(3601);
        let first = engine.check_timeouts(later).unwrap();
        let second = engine.check_timeouts(later).unwrap();

        assert_eq!(first.len(), 1);
        // The L2 replacement has a 7200s window and is still in time.
        assert!(second.is_empty(), "second sweep must not re-transition anything");
        assert_eq!(engine.pending().len(), 1);
    }

    /// A zero-timeout workflow with `on_timeout = reject` transitions to
    /// REJECTED on the first sweep, with an auto-generated rationale in the
    /// audit record.
    #[test]
    fn test_timeout_reject() {
        let toml = r#"
            [[workflow]]
            id = "instant"
            name = "Instant"
            required_approvals = 1
            allowed_approver_roles = ["reviewer"]
            timeout_seconds = 0
            on_timeout = "reject"
        "#;
        let audit = RecordingAudit::new();
        let engine = ApprovalEngine::with_clock(
            WorkflowSet::from_toml_str(toml).unwrap(),
            audit.clone(),
            FixedClock::at(t0()),
        );
        let request = engine.request_approval(&review_decision(), "instant").unwrap();

        engine.check_timeouts(t0()).unwrap();
        assert_eq!(engine.get(&request.id).unwrap().status, ApprovalStatus::Rejected);

        let last = audit.entries().pop().unwrap();
        assert_eq!(last.event_type, AuditEventKind::ApprovalRejected);
        assert_eq!(last.payload["timed_out"], json!(true));
        assert!(last.payload["rationale"].as_str().unwrap().contains("timeout"));
    }

    /// Escalating past the top of the chain applies `on_final_timeout`;
    /// by default the request EXPIRES.
    #[test]
    fn test_final_timeout_expires_by_default() {
        let audit = RecordingAudit::new();
        let engine = engine_with(audit.clone());
        let request = engine.request_approval(&review_decision(), "review-l2").unwrap();

        engine.check_timeouts(t0() + Duration::seconds(7201)).unwrap();

        let resolved = engine.get(&request.id).unwrap();
        assert_eq!(resolved.status, ApprovalStatus::Expired);
        assert!(resolved.superseded_by.is_none());
        assert_eq!(
            audit.kinds(),
            vec![AuditEventKind::ApprovalRequested, AuditEventKind::ApprovalExpired]
        );
    }

    /// The full lineage of an escalated request remains reachable from the
    /// original id through the audit trail.
    #[test]
    fn test_escalation_lineage_preserved() {
        let audit = RecordingAudit::new();
        let engine = engine_with(audit.clone());
        let request = engine.request_approval(&review_decision(), "review-l1").unwrap();
        engine.check_timeouts(t0() + Duration::seconds(3601)).unwrap();

        let custody = audit.chain_of_custody(&request.id);
        assert_eq!(custody.len(), 2);
        assert_eq!(custody[0].event_type, AuditEventKind::ApprovalRequested);
        assert_eq!(custody[1].event_type, AuditEventKind::ApprovalEscalated);

        // The escalation entry links the new request id too.
        let next_id = engine.get(&request.id).unwrap().superseded_by.unwrap();
        assert!(custody[1].correlation_ids.contains(&next_id));
    }

    // ── Audit before commit ──────────────────────────────────────────────────

    /// When the audit append fails, no state changes: the request is never
    /// opened, and a pending request stays pending.
    #[test]
    fn test_audit_failure_blocks_transitions() {
        let recording = RecordingAudit::new();
        let engine = engine_with(recording.clone());
        let request = engine.request_approval(&review_decision(), "review-l1").unwrap();

        let failing = engine_with(Arc::new(FailingAudit));
        assert!(matches!(
            failing.request_approval(&review_decision(), "review-l1"),
            Err(ArbiterError::AuditWrite { .. })
        ));
        assert!(failing.pending().is_empty(), "unrecorded request must not exist");

        // Swap-in check on the healthy engine: a vote that cannot be audited
        // is simulated by the failing engine above; here the healthy request
        // is still pending and accepts votes normally.
        let voted = engine
            .approve(&request.id, "alice", "reviewer", "within retention limits")
            .unwrap();
        assert_eq!(voted.status, ApprovalStatus::Pending);
    }

    /// When the escalation entry cannot be appended, the original request
    /// stays PENDING and no replacement is registered. Repeated sweeps retry
    /// cleanly instead of stacking orphan next-level requests, and once the
    /// store recovers exactly one escalation happens.
    #[test]
    fn test_failed_escalation_append_leaves_request_pending() {
        let audit = FlakyAudit::new(AuditEventKind::ApprovalEscalated);
        let engine = engine_with(audit.clone());
        let request = engine.request_approval(&review_decision(), "review-l1").unwrap();

        let later = t0() + Duration::seconds(3601);
        assert!(engine.check_timeouts(later).is_err());
        assert!(engine.check_timeouts(later).is_err());

        let original = engine.get(&request.id).unwrap();
        assert_eq!(original.status, ApprovalStatus::Pending);
        assert!(original.superseded_by.is_none());
        assert_eq!(engine.pending().len(), 1, "no orphan next-level request may exist");

        audit.heal();
        let transitioned = engine.check_timeouts(later).unwrap();
        assert_eq!(transitioned.len(), 1);
        assert_eq!(engine.get(&request.id).unwrap().status, ApprovalStatus::Escalated);

        let pending = engine.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].workflow_id, "review-l2");
        assert_eq!(pending[0].escalation_level, 2);
        assert_eq!(audit.kinds().last(), Some(&AuditEventKind::ApprovalEscalated));
    }
}
