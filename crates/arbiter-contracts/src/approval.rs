//! Approval workflow state machine types.
//!
//! An `ApprovalRequest` is the one mutable state machine in the system:
//! `Pending → (Approved | Rejected | Escalated | Expired)`. Every state
//! transition is committed to the audit trail before the in-memory state
//! counts, so nothing is ever overwritten — only superseded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle states of an approval request.
///
/// `Approved`, `Rejected`, `Escalated`, and `Expired` are terminal for the
/// individual request instance; escalation continues the chain in a new
/// instance at the next level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Escalated,
    Expired,
}

impl ApprovalStatus {
    /// True once the request can no longer accept votes or transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Escalated => "escalated",
            ApprovalStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// One recorded approval vote, with its mandatory rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalVote {
    pub approver_id: String,
    pub approver_role: String,
    /// Why the approver decided as they did. Never empty.
    pub rationale: String,
    pub timestamp: DateTime<Utc>,
}

/// A human-in-the-loop approval request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique request id.
    pub id: String,
    /// The decision that triggered the review.
    pub related_decision_id: String,
    /// The workflow definition governing this request.
    pub workflow_id: String,
    /// Ordinal position in the escalation chain, starting at 1.
    pub escalation_level: u32,
    /// Current lifecycle state.
    pub status: ApprovalStatus,
    /// How many qualifying approvals complete the request.
    pub required_approvals: u32,
    /// Approvals received so far, in arrival order.
    pub received_approvals: Vec<ApprovalVote>,
    /// When the request was opened.
    pub created_at: DateTime<Utc>,
    /// When the request times out and the workflow's timeout action fires.
    pub deadline: DateTime<Utc>,
    /// Id of the next-level request that superseded this one, once escalated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<String>,
}
