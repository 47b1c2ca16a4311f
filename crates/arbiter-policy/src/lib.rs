//! # arbiter-policy
//!
//! Deterministic, declarative policy evaluation for the ARBITER governance
//! layer.
//!
//! ## Overview
//!
//! Policies are JSON/YAML documents parsed once into a typed condition-tree
//! AST ([`matcher`]), validated wholesale into an immutable [`PolicySet`]
//! ([`loader`]), published atomically ([`snapshot`]), and evaluated by a
//! pure function with fixed conflict-resolution semantics ([`evaluator`]):
//! DENY beats everything, REVIEW beats the rest, WARN/REDACT are advisory,
//! and priority ties break by policy id for full determinism.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use arbiter_core::SystemClock;
//! use arbiter_policy::{PolicySet, PolicySnapshot, SnapshotEvaluator};
//!
//! let set = PolicySet::from_yaml_str(include_str!("../policies/governance.yaml"))?;
//! let snapshot = Arc::new(PolicySnapshot::new(set));
//! let engine = SnapshotEvaluator::new(snapshot, Arc::new(SystemClock));
//! ```

pub mod evaluator;
pub mod loader;
pub mod matcher;
pub mod snapshot;

pub use evaluator::{evaluate, LoadedPolicy, PolicySet, SnapshotEvaluator};
pub use matcher::CompiledCondition;
pub use snapshot::PolicySnapshot;

// ── Tests ─────────────────────────────────────────────────────────────────────
