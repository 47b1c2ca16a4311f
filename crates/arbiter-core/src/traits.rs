//! Core trait definitions for the ARBITER governance pipeline.
//!
//! These traits define the seams between the orchestrating decision service
//! and its trusted collaborators:
//!
//! - `DecisionEngine` — deterministic policy evaluation
//! - `AuditStore`     — the tamper-evident, append-only record
//! - `Approvals`      — the human-in-the-loop workflow engine
//! - `Clock`          — injectable time, so state machines test deterministically
//!
//! Every component takes its dependencies as explicit constructor arguments
//! rather than ambient globals; the service wires them together once at
//! startup and tears them down at shutdown.

use chrono::{DateTime, Utc};

use arbiter_contracts::{
    approval::ApprovalRequest,
    audit::{AuditEntry, AuditEventKind, ChainVerification, ExportOptions},
    context::RequestContext,
    decision::Decision,
    error::ArbiterResult,
};

/// Deterministic policy evaluation over an immutable request context.
///
/// Implementations are **trusted** and must be pure over their inputs and
/// the currently published policy snapshot: no I/O, no randomness beyond id
/// assignment, identical decisions for identical `(policies, ctx)` pairs.
pub trait DecisionEngine: Send + Sync {
    /// Evaluate `ctx` against the active policy set.
    ///
    /// By design this never fails on malformed context data; an `Err` here
    /// is a programming defect and the caller fails closed on it.
    fn evaluate(&self, ctx: &RequestContext) -> ArbiterResult<Decision>;
}

/// The append-only, hash-chained audit record.
///
/// Appends are strictly serialized (the hash of entry *n* depends on entry
/// *n−1*), while reads may run concurrently and observe a consistent
/// snapshot. A failed append is fatal to the in-flight decision: no record,
/// no execution.
pub trait AuditStore: Send + Sync {
    /// Append one entry to the chain and return it, signed.
    ///
    /// Must fail closed (rather than write an unsigned entry) when the
    /// signing key is unavailable.
    fn append(
        &self,
        event_type: AuditEventKind,
        payload: serde_json::Value,
        correlation_ids: &[String],
    ) -> ArbiterResult<AuditEntry>;

    /// Walk the full chain, recomputing every hash and signature.
    fn verify_integrity(&self) -> ChainVerification;

    /// All entries sharing a correlation id, in sequence order.
    fn chain_of_custody(&self, correlation_id: &str) -> Vec<AuditEntry>;

    /// Serialize a snapshot of the chain for external compliance review.
    fn export(&self, options: &ExportOptions) -> ArbiterResult<Vec<u8>>;

    /// A consistent snapshot of every entry, in sequence order.
    fn entries(&self) -> Vec<AuditEntry>;

    /// Number of entries appended so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The human-in-the-loop escalation engine.
///
/// The decision service opens a request here whenever evaluation yields
/// REVIEW; reviewers and the timeout scheduler drive it from the outside.
pub trait Approvals: Send + Sync {
    /// Open a PENDING approval request for `decision` under the named
    /// workflow, recording it in the audit trail.
    fn request_approval(
        &self,
        decision: &Decision,
        workflow_id: &str,
    ) -> ArbiterResult<ApprovalRequest>;
}

/// Injectable wall clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The production clock: `Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
