//! TOML-driven approval workflow definitions.
//!
//! A workflow is static configuration, not runtime state: it says how many
//! qualifying approvals complete a request, who may vote, how long the
//! request may sit PENDING, and what happens when the deadline passes.
//! Escalation chains are built by linking workflows through
//! `next_level_workflow` (L1 → L2 → L3 → …).

use std::collections::HashMap;
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use arbiter_contracts::error::{ArbiterError, ArbiterResult};

/// What happens to a PENDING request when its deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutAction {
    /// Open a new request at the next escalation level.
    Escalate,
    /// Reject the request outright.
    Reject,
    /// Approve the request by default.
    Approve,
}

/// The terminal fallback when `escalate` fires at the top of the chain,
/// where no `next_level_workflow` is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalAction {
    /// Mark the request EXPIRED. The default.
    #[default]
    Expire,
    Reject,
    Approve,
}

fn default_required_approvals() -> u32 {
    1
}

/// One approval workflow definition, loaded from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalWorkflow {
    /// Unique workflow id, referenced by policies and escalation links.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Qualifying approvals needed to reach APPROVED.
    #[serde(default = "default_required_approvals")]
    pub required_approvals: u32,
    /// Roles whose votes count. Votes from any other role are rejected.
    pub allowed_approver_roles: Vec<String>,
    /// Seconds a request may sit PENDING before the timeout action fires.
    pub timeout_seconds: u64,
    pub on_timeout: TimeoutAction,
    /// The workflow an escalation hands off to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_level_workflow: Option<String>,
    /// Applied when `on_timeout = escalate` but no next level exists.
    #[serde(default)]
    pub on_final_timeout: FinalAction,
}

impl ApprovalWorkflow {
    /// The PENDING window as a `chrono::Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::seconds(self.timeout_seconds as i64)
    }

    /// True if `role` may vote on requests under this workflow.
    pub fn allows_role(&self, role: &str) -> bool {
        self.allowed_approver_roles.iter().any(|r| r == role)
    }

    fn validate(&self) -> ArbiterResult<()> {
        if self.id.trim().is_empty() {
            return Err(ArbiterError::Config {
                reason: "workflow id must not be empty".to_string(),
            });
        }
        if self.required_approvals == 0 {
            return Err(ArbiterError::Config {
                reason: format!("workflow '{}': required_approvals must be at least 1", self.id),
            });
        }
        if self.allowed_approver_roles.is_empty() {
            return Err(ArbiterError::Config {
                reason: format!("workflow '{}': allowed_approver_roles must not be empty", self.id),
            });
        }
        Ok(())
    }
}

/// The wrapper schema for a workflow TOML document.
///
/// ```toml
/// [[workflow]]
/// id = "review-l1"
/// name = "First-line review"
/// allowed_approver_roles = ["reviewer"]
/// timeout_seconds = 3600
/// on_timeout = "escalate"
/// next_level_workflow = "review-l2"
/// ```
#[derive(Debug, Deserialize)]
struct WorkflowConfig {
    #[serde(default)]
    workflow: Vec<ApprovalWorkflow>,
}

/// A validated, id-indexed set of workflow definitions.
#[derive(Debug, Clone, Default)]
pub struct WorkflowSet {
    workflows: HashMap<String, ApprovalWorkflow>,
}

impl WorkflowSet {
    /// Build a set from already-parsed definitions.
    ///
    /// Rejects duplicate ids, per-workflow schema violations, and escalation
    /// links that point at a workflow the set does not contain. Validation
    /// is all-or-nothing: one bad definition rejects the whole set.
    pub fn from_workflows(workflows: Vec<ApprovalWorkflow>) -> ArbiterResult<Self> {
        let mut indexed = HashMap::with_capacity(workflows.len());
        for workflow in workflows {
            workflow.validate()?;
            if indexed.insert(workflow.id.clone(), workflow.clone()).is_some() {
                return Err(ArbiterError::Config {
                    reason: format!("duplicate workflow id '{}'", workflow.id),
                });
            }
        }
        for workflow in indexed.values() {
            if let Some(next) = &workflow.next_level_workflow {
                if !indexed.contains_key(next) {
                    return Err(ArbiterError::Config {
                        reason: format!(
                            "workflow '{}' escalates to unknown workflow '{}'",
                            workflow.id, next
                        ),
                    });
                }
            }
        }
        Ok(Self { workflows: indexed })
    }

    /// Parse `s` as a workflow TOML document.
    pub fn from_toml_str(s: &str) -> ArbiterResult<Self> {
        let config: WorkflowConfig = toml::from_str(s).map_err(|e| ArbiterError::Config {
            reason: format!("failed to parse workflow TOML: {}", e),
        })?;
        Self::from_workflows(config.workflow)
    }

    /// Read the file at `path` and parse it as workflow TOML.
    pub fn from_file(path: &Path) -> ArbiterResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ArbiterError::Config {
            reason: format!("failed to read workflow file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Look up a workflow by id.
    pub fn get(&self, id: &str) -> ArbiterResult<&ApprovalWorkflow> {
        self.workflows.get(id).ok_or_else(|| ArbiterError::WorkflowNotFound {
            id: id.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}
