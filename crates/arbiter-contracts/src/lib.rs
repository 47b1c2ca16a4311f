//! # arbiter-contracts
//!
//! Shared types, schemas, and contracts for the ARBITER governance layer.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate — only data definitions and error types.

pub mod approval;
pub mod audit;
pub mod context;
pub mod decision;
pub mod error;
pub mod policy;
