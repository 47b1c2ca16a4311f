//! Error types for the ARBITER governance pipeline.
//!
//! All fallible operations in the pipeline return `ArbiterResult<T>`.
//! Error variants carry enough context to produce actionable audit entries.
//! Note the deliberate absence of an "evaluation error" path for bad request
//! data: the policy evaluator never throws on malformed context values — a
//! predicate that cannot be evaluated is simply false.

use thiserror::Error;

/// The unified error type for the ARBITER governance layer.
#[derive(Debug, Error)]
pub enum ArbiterError {
    /// A policy document failed to parse or validate.
    ///
    /// Fatal to the whole load operation: no partial policy set is ever
    /// applied, and any previously active snapshot remains in effect.
    #[error("policy load failed: {reason}")]
    PolicyLoad { reason: String },

    /// An internal fault inside the evaluator.
    ///
    /// Unreachable by design (the evaluator treats every malformed predicate
    /// as false). If it ever surfaces, the orchestrator fails closed.
    #[error("evaluation fault: {reason}")]
    EvaluationFault { reason: String },

    /// The audit store could not append an entry.
    ///
    /// Covers a missing signing key, serialization failure, and storage
    /// failure alike. Treated as fatal for the in-flight decision: no
    /// record, no execution.
    #[error("audit write failed: {reason}")]
    AuditWrite { reason: String },

    /// The hash chain failed verification at the given sequence number.
    ///
    /// Surfaced to operators; recovery is procedural, never automatic.
    #[error("audit chain integrity violated at sequence {sequence}")]
    IntegrityViolation { sequence: u64 },

    /// No approval request exists with the given id.
    #[error("approval request '{id}' not found")]
    ApprovalNotFound { id: String },

    /// The approval request has already reached a terminal state.
    #[error("approval request '{id}' is already {status}")]
    ApprovalAlreadyResolved { id: String, status: String },

    /// An approve/reject call arrived without a rationale.
    ///
    /// Rationale is mandatory, never optional: it is preserved forever in
    /// the audit trail as the human side of the decision record.
    #[error("a non-empty rationale is required for approval decisions")]
    RationaleRequired,

    /// The approver has already voted on this request.
    ///
    /// Quorum counts distinct approvers, so a repeat vote is rejected
    /// instead of counted.
    #[error("approver '{approver_id}' has already voted on approval request '{id}'")]
    DuplicateApproval { id: String, approver_id: String },

    /// The approver's role is not listed in the workflow's allowed roles.
    #[error("role '{role}' is not authorized to review workflow '{workflow}'")]
    ApproverNotAuthorized { role: String, workflow: String },

    /// No workflow definition exists with the given id.
    #[error("approval workflow '{id}' not found")]
    WorkflowNotFound { id: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

/// Convenience alias used throughout the ARBITER crates.
pub type ArbiterResult<T> = Result<T, ArbiterError>;
