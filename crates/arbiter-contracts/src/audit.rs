//! Audit trail entry types.
//!
//! An `AuditEntry` is one link in the SHA-256 hash chain. Each entry commits
//! to the previous entry via `prev_hash`; modifying any stored field breaks
//! its own `hash` and every subsequent `prev_hash`, which integrity
//! verification detects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The well-known event types recorded by the governance pipeline.
///
/// Serialized with dotted names (`"policy.evaluated"`) so exports read
/// naturally in compliance tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventKind {
    #[serde(rename = "request.submitted")]
    RequestSubmitted,
    #[serde(rename = "policy.evaluated")]
    PolicyEvaluated,
    #[serde(rename = "approval.requested")]
    ApprovalRequested,
    #[serde(rename = "approval.granted")]
    ApprovalGranted,
    #[serde(rename = "approval.rejected")]
    ApprovalRejected,
    #[serde(rename = "approval.escalated")]
    ApprovalEscalated,
    #[serde(rename = "approval.expired")]
    ApprovalExpired,
    #[serde(rename = "request.blocked")]
    RequestBlocked,
    #[serde(rename = "request.executed")]
    RequestExecuted,
    #[serde(rename = "request.failed")]
    RequestFailed,
}

impl AuditEventKind {
    /// The dotted wire name, as used in exports and correlation queries.
    pub fn as_str(self) -> &'static str {
        match self {
            AuditEventKind::RequestSubmitted => "request.submitted",
            AuditEventKind::PolicyEvaluated => "policy.evaluated",
            AuditEventKind::ApprovalRequested => "approval.requested",
            AuditEventKind::ApprovalGranted => "approval.granted",
            AuditEventKind::ApprovalRejected => "approval.rejected",
            AuditEventKind::ApprovalEscalated => "approval.escalated",
            AuditEventKind::ApprovalExpired => "approval.expired",
            AuditEventKind::RequestBlocked => "request.blocked",
            AuditEventKind::RequestExecuted => "request.executed",
            AuditEventKind::RequestFailed => "request.failed",
        }
    }
}

impl std::fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single tamper-evident entry in the audit chain.
///
/// Immutable after creation. The hash commits to the entry's position
/// (`sequence`), its link to the predecessor (`prev_hash`), and the
/// canonical JSON of its content; the signature is a keyed MAC over the
/// hash for non-repudiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonically increasing position in the chain, starting at 0.
    pub sequence: u64,
    /// What happened.
    pub event_type: AuditEventKind,
    /// Structured event details.
    pub payload: serde_json::Value,
    /// Ids linking this entry to a request, decision, or approval chain.
    pub correlation_ids: Vec<String>,
    /// Wall-clock time (UTC) the entry was appended.
    pub timestamp: DateTime<Utc>,
    /// Hash (hex) of the previous entry, or [`AuditEntry::GENESIS_HASH`]
    /// for the first entry.
    pub prev_hash: String,
    /// SHA-256 hash (hex) over this entry's canonical content.
    pub hash: String,
    /// HMAC-SHA256 (hex) over `hash`, keyed with the signing key active
    /// at append time.
    pub signature: String,
}

impl AuditEntry {
    /// The sentinel `prev_hash` of the first entry in every chain.
    ///
    /// 64 hex zeros — stable across restarts, so chains started at
    /// different times remain structurally comparable.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// The result of a full-chain integrity walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    /// True when every entry's linkage, hash, and signature verified.
    pub valid: bool,
    /// The first broken sequence number, when invalid. A single tamper
    /// point invalidates everything downstream; no claims are made about
    /// entries after it.
    pub broken_at: Option<u64>,
    /// How many entries were verified before stopping.
    pub checked: u64,
}

impl ChainVerification {
    /// A verification result for an intact chain of `checked` entries.
    pub fn intact(checked: u64) -> Self {
        Self { valid: true, broken_at: None, checked }
    }

    /// A verification result reporting the first broken sequence.
    pub fn broken_at(sequence: u64) -> Self {
        Self { valid: false, broken_at: Some(sequence), checked: sequence }
    }
}

/// Serialization formats for compliance exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

/// Filters and options for a compliance export.
///
/// Exports never mutate the chain; they serialize a consistent snapshot of
/// the entries whose timestamps fall inside the inclusive time range.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Include entries at or after this instant; `None` means from genesis.
    pub start: Option<DateTime<Utc>>,
    /// Include entries at or before this instant; `None` means to the tail.
    pub end: Option<DateTime<Utc>>,
    /// Output serialization format.
    pub format: ExportFormat,
    /// Signatures are redacted unless a re-verification export explicitly
    /// requests them.
    pub include_signatures: bool,
}

impl ExportOptions {
    /// Full-range export in the given format, signatures redacted.
    pub fn full(format: ExportFormat) -> Self {
        Self { start: None, end: None, format, include_signatures: false }
    }
}
