//! Policy document loading.
//!
//! Policies are data: JSON or YAML documents checked into version control
//! and reviewed like code. The loader parses a document into typed
//! [`Policy`](arbiter_contracts::policy::Policy) values and validates the
//! whole batch into a [`PolicySet`] — one malformed policy rejects the
//! entire load, so no partial set is ever applied.
//!
//! Accepted document shapes (JSON and YAML alike):
//!
//! ```yaml
//! # a bare list of policies
//! - id: first
//!   effect: ALLOW
//! # or wrapped
//! policies:
//!   - id: first
//!     effect: ALLOW
//! # or a single policy object
//! id: only-one
//! effect: DENY
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use arbiter_contracts::{
    error::{ArbiterError, ArbiterResult},
    policy::Policy,
};

use crate::evaluator::PolicySet;

/// The shapes a policy document may take.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PolicyDocument {
    List(Vec<Policy>),
    Wrapped { policies: Vec<Policy> },
    Single(Policy),
}

impl PolicyDocument {
    fn into_policies(self) -> Vec<Policy> {
        match self {
            PolicyDocument::List(policies) => policies,
            PolicyDocument::Wrapped { policies } => policies,
            PolicyDocument::Single(policy) => vec![policy],
        }
    }
}

impl PolicySet {
    /// Parse `s` as a JSON policy document and validate it into a set.
    pub fn from_json_str(s: &str) -> ArbiterResult<Self> {
        let document: PolicyDocument =
            serde_json::from_str(s).map_err(|e| ArbiterError::PolicyLoad {
                reason: format!("failed to parse policy JSON: {}", e),
            })?;
        Self::from_parsed(document)
    }

    /// Parse `s` as a YAML policy document and validate it into a set.
    pub fn from_yaml_str(s: &str) -> ArbiterResult<Self> {
        let document: PolicyDocument =
            serde_yaml::from_str(s).map_err(|e| ArbiterError::PolicyLoad {
                reason: format!("failed to parse policy YAML: {}", e),
            })?;
        Self::from_parsed(document)
    }

    /// Read the file at `path` and parse it by extension
    /// (`.json`, `.yaml`, `.yml`).
    pub fn from_file(path: &Path) -> ArbiterResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ArbiterError::PolicyLoad {
            reason: format!("failed to read policy file '{}': {}", path.display(), e),
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents),
            other => Err(ArbiterError::PolicyLoad {
                reason: format!(
                    "unsupported policy file extension '{}' for '{}'",
                    other.unwrap_or(""),
                    path.display()
                ),
            }),
        }
    }

    fn from_parsed(document: PolicyDocument) -> ArbiterResult<Self> {
        let policies = document.into_policies();
        let count = policies.len();
        let set = Self::from_policies(policies)?;
        info!(policy_count = count, "policy document loaded");
        Ok(set)
    }
}
