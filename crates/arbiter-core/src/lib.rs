//! # arbiter-core
//!
//! Trait seams and the orchestrating decision service for ARBITER.
//!
//! The governance pipeline is wired through four traits — `DecisionEngine`,
//! `AuditStore`, `Approvals`, and `Clock` — with `DecisionService` as the
//! single public entry point. The service fails closed: a request whose
//! decision cannot be evaluated and recorded is blocked, never allowed.

pub mod service;
pub mod traits;

pub use service::{DecisionService, GovernanceOutcome, UNAVAILABLE_REASON};
pub use traits::{Approvals, AuditStore, Clock, DecisionEngine, SystemClock};
