//! ARBITER Governance Layer — Demo CLI
//!
//! Runs the governance pipeline end to end against an in-memory audit trail
//! and a small built-in policy set: allow, deny, and review-with-approval
//! paths, plus tamper detection and compliance export over the resulting
//! audit chain.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- allow
//!   cargo run -p demo -- deny
//!   cargo run -p demo -- review
//!   cargo run -p demo -- tamper-check
//!   cargo run -p demo -- export

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use arbiter_approval::{ApprovalEngine, WorkflowSet};
use arbiter_audit::{verify_chain, InMemoryAuditStore, Keyring};
use arbiter_contracts::{
    audit::{ExportFormat, ExportOptions},
    context::RequestContext,
    error::ArbiterResult,
};
use arbiter_core::{AuditStore, DecisionService, GovernanceOutcome};
use arbiter_policy::{PolicySet, PolicySnapshot, SnapshotEvaluator};

// ── CLI definition ────────────────────────────────────────────────────────────

/// ARBITER — governance decision layer demo.
///
/// Each subcommand drives one governance path through the full pipeline:
/// policy evaluation, hash-chained audit, and human-in-the-loop approval.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "ARBITER governance layer demo",
    long_about = "Runs ARBITER governance scenarios showing deterministic policy\n\
                  evaluation, tamper-evident audit chaining, and approval workflows."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every scenario in sequence.
    RunAll,
    /// A routine request that no blocking policy matches (ALLOW).
    Allow,
    /// A request a policy blocks outright (DENY).
    Deny,
    /// A request that pauses for human review, then gets approved (REVIEW).
    Review,
    /// Tamper with an exported chain copy and watch verification fail.
    TamperCheck,
    /// Export the audit chain for compliance review (JSON and CSV).
    Export,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Structured logging. Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all(),
        Command::Allow => run_allow(),
        Command::Deny => run_deny(),
        Command::Review => run_review(),
        Command::TamperCheck => run_tamper_check(),
        Command::Export => run_export(),
    };

    match result {
        Ok(()) => println!("All selected scenarios completed successfully."),
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── Pipeline wiring ───────────────────────────────────────────────────────────

const SIGNING_KEY: &[u8] = b"demo-audit-signing-key";

const POLICIES: &str = r#"
policies:
  - id: banned-actor
    name: Banned actors
    description: requests from suspended actors are always blocked
    conditions:
      field: actor_role
      equals: suspended
    effect: DENY
    priority: 1000
  - id: pii-production-review
    name: PII in production
    description: any production request touching PII requires human review
    scope:
      environment: [production]
    conditions:
      field: tags
      contains: pii
    effect: REVIEW
    priority: 100
  - id: bulk-read-warning
    name: Large reads
    description: flag reads above 10k records
    conditions:
      field: metadata.record_count
      gt: 10000
    effect: WARN
    priority: 10
"#;

const WORKFLOWS: &str = r#"
[[workflow]]
id = "review-l1"
name = "First-line review"
description = "Initial human review for flagged requests"
required_approvals = 1
allowed_approver_roles = ["reviewer", "compliance-officer"]
timeout_seconds = 3600
on_timeout = "escalate"
next_level_workflow = "review-l2"

[[workflow]]
id = "review-l2"
name = "Compliance escalation"
required_approvals = 1
allowed_approver_roles = ["compliance-officer"]
timeout_seconds = 7200
on_timeout = "escalate"
"#;

struct Pipeline {
    service: DecisionService,
    audit: Arc<InMemoryAuditStore>,
    approvals: Arc<ApprovalEngine>,
}

fn build_pipeline() -> ArbiterResult<Pipeline> {
    let snapshot = Arc::new(PolicySnapshot::new(PolicySet::from_yaml_str(POLICIES)?));
    let audit = Arc::new(InMemoryAuditStore::new(Keyring::new(SIGNING_KEY.to_vec())));
    let approvals = Arc::new(ApprovalEngine::new(
        WorkflowSet::from_toml_str(WORKFLOWS)?,
        audit.clone(),
    ));
    let engine = SnapshotEvaluator::new(snapshot, Arc::new(arbiter_core::SystemClock));
    let service = DecisionService::new(
        Box::new(engine),
        audit.clone(),
        approvals.clone(),
        "review-l1",
    );
    Ok(Pipeline { service, audit, approvals })
}

fn routine_request() -> ArbiterResult<RequestContext> {
    RequestContext::builder("analyst-7", "dataset-weather")
        .actor_role("analyst")
        .resource_type("dataset")
        .environment("staging")
        .intent("read")
        .build()
}

fn pii_request() -> ArbiterResult<RequestContext> {
    RequestContext::builder("analyst-7", "dataset-customers")
        .actor_role("analyst")
        .resource_type("dataset")
        .environment("production")
        .intent("read")
        .tag("pii")
        .metadata(serde_json::json!({ "record_count": 250 }))
        .build()
}

fn print_outcome(outcome: &GovernanceOutcome) {
    match outcome {
        GovernanceOutcome::Allowed { decision } => {
            println!("  -> ALLOW   {}", decision.reason);
        }
        GovernanceOutcome::Denied { decision } => {
            println!("  -> DENY    {}", decision.reason);
        }
        GovernanceOutcome::PendingApproval { decision, request } => {
            println!("  -> REVIEW  {}", decision.reason);
            println!(
                "     approval request {} opened under workflow '{}', deadline {}",
                request.id, request.workflow_id, request.deadline
            );
        }
        GovernanceOutcome::Unavailable { request_id, reason } => {
            println!("  -> BLOCKED ({}): {}", request_id, reason);
        }
    }
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

fn run_all() -> ArbiterResult<()> {
    run_allow()?;
    run_deny()?;
    run_review()?;
    run_tamper_check()?;
    run_export()?;
    Ok(())
}

fn run_allow() -> ArbiterResult<()> {
    println!("[allow] routine staging read, no blocking policy matches");
    let pipeline = build_pipeline()?;
    let outcome = pipeline.service.decide(&routine_request()?)?;
    print_outcome(&outcome);
    println!("     audit entries written: {}", pipeline.audit.len());
    println!();
    Ok(())
}

fn run_deny() -> ArbiterResult<()> {
    println!("[deny] request from a suspended actor");
    let pipeline = build_pipeline()?;
    let ctx = RequestContext::builder("ex-employee-3", "dataset-customers")
        .actor_role("suspended")
        .resource_type("dataset")
        .environment("production")
        .intent("read")
        .build()?;
    let outcome = pipeline.service.decide(&ctx)?;
    print_outcome(&outcome);
    println!("     audit entries written: {}", pipeline.audit.len());
    println!();
    Ok(())
}

fn run_review() -> ArbiterResult<()> {
    println!("[review] production PII read pauses for human review");
    let pipeline = build_pipeline()?;
    let outcome = pipeline.service.decide(&pii_request()?)?;
    print_outcome(&outcome);

    if let GovernanceOutcome::PendingApproval { request, .. } = &outcome {
        let resolved = pipeline.approvals.approve(
            &request.id,
            "casey",
            "reviewer",
            "read is within the approved retention window",
        )?;
        println!("     reviewer casey approved: request now {}", resolved.status);
    }

    let verification = pipeline.audit.verify_integrity();
    println!(
        "     chain verified: {} entries, valid = {}",
        verification.checked, verification.valid
    );
    println!();
    Ok(())
}

fn run_tamper_check() -> ArbiterResult<()> {
    println!("[tamper-check] a doctored chain copy fails verification");
    let pipeline = build_pipeline()?;
    pipeline.service.decide(&pii_request()?)?;

    let mut entries = pipeline.audit.entries();
    println!("     pristine copy:  valid = {}", {
        let v = verify_chain(&entries, &Keyring::new(SIGNING_KEY.to_vec()));
        v.valid
    });

    entries[1].payload = serde_json::json!({ "outcome": "ALLOW", "doctored": true });
    let verification = verify_chain(&entries, &Keyring::new(SIGNING_KEY.to_vec()));
    println!(
        "     doctored copy:  valid = {}, first broken sequence = {:?}",
        verification.valid, verification.broken_at
    );
    println!();
    Ok(())
}

fn run_export() -> ArbiterResult<()> {
    println!("[export] compliance export of the audit chain");
    let pipeline = build_pipeline()?;
    pipeline.service.decide(&routine_request()?)?;
    pipeline.service.decide(&pii_request()?)?;

    let json = pipeline.audit.export(&ExportOptions::full(ExportFormat::Json))?;
    println!("     JSON export: {} bytes (signatures redacted)", json.len());

    let csv = pipeline.audit.export(&ExportOptions::full(ExportFormat::Csv))?;
    let text = String::from_utf8_lossy(&csv);
    for line in text.lines().take(3) {
        println!("     {}", line);
    }
    println!();
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("ARBITER — Governance Decision Layer");
    println!("Demo pipeline");
    println!("===================================");
    println!();
    println!("Pipeline per request:");
    println!("  [1] Evaluator matches policies in priority order → ALLOW / DENY / REVIEW");
    println!("  [2] Every step is appended to the SHA-256 hash-chained, HMAC-signed audit trail");
    println!("  [3] REVIEW opens an approval request; reviewers approve or reject with rationale");
    println!("  [4] Timeouts escalate up the workflow chain (L1 → L2 → …)");
    println!();
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// The wired pipeline decides end to end and serves every audit read
    /// the subcommands depend on.
    #[test]
    fn test_pipeline_wiring() {
        let pipeline = build_pipeline().unwrap();

        let outcome = pipeline.service.decide(&pii_request().unwrap()).unwrap();
        assert!(matches!(outcome, GovernanceOutcome::PendingApproval { .. }));

        assert!(pipeline.audit.len() > 0);
        assert!(pipeline.audit.verify_integrity().valid);
        assert!(!pipeline.audit.entries().is_empty());
        let json = pipeline.audit.export(&ExportOptions::full(ExportFormat::Json)).unwrap();
        assert!(!json.is_empty());
    }
}
