//! Atomic policy snapshot publication.
//!
//! Evaluations run unboundedly in parallel against an immutable
//! `Arc<PolicySet>`; reloads publish a whole new set with a pointer swap.
//! Policies are never mutated in place while evaluations are in flight,
//! and a failed reload leaves the previous snapshot active.

use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use arbiter_contracts::{error::ArbiterResult, policy::Policy};

use crate::evaluator::PolicySet;

/// A copy-on-write handle to the active policy set.
pub struct PolicySnapshot {
    inner: RwLock<Arc<PolicySet>>,
}

impl PolicySnapshot {
    /// Publish an initial set.
    pub fn new(set: PolicySet) -> Self {
        Self { inner: RwLock::new(Arc::new(set)) }
    }

    /// The currently published set. Callers hold the returned `Arc` for the
    /// duration of one evaluation; later reloads do not affect it.
    pub fn current(&self) -> Arc<PolicySet> {
        self.inner
            .read()
            .expect("policy snapshot lock poisoned")
            .clone()
    }

    /// Atomically replace the published set.
    pub fn publish(&self, set: PolicySet) {
        let count = set.len();
        *self.inner.write().expect("policy snapshot lock poisoned") = Arc::new(set);
        info!(policy_count = count, "policy snapshot published");
    }

    /// Validate, compile, and publish a new policy list.
    ///
    /// All-or-nothing: if any policy is malformed the error is returned and
    /// the previous snapshot remains active, untouched.
    pub fn reload(&self, policies: Vec<Policy>) -> ArbiterResult<()> {
        match PolicySet::from_policies(policies) {
            Ok(set) => {
                self.publish(set);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "policy reload rejected; previous snapshot remains active");
                Err(e)
            }
        }
    }
}

impl Default for PolicySnapshot {
    fn default() -> Self {
        Self::new(PolicySet::default())
    }
}
