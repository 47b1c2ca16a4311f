//! # arbiter-audit
//!
//! Immutable, append-only, SHA-256 hash-chained and HMAC-signed audit trail
//! for the ARBITER governance layer.
//!
//! ## Overview
//!
//! Every governance event is wrapped in an `AuditEntry` that links to the
//! previous entry via its SHA-256 hash and carries a keyed MAC for
//! non-repudiation. Tampering with any entry — even a single byte — breaks
//! the chain and is detected by `verify_chain`, which reports the first
//! broken sequence number.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use arbiter_audit::{InMemoryAuditStore, Keyring};
//! use arbiter_core::traits::AuditStore;
//!
//! let store = InMemoryAuditStore::new(Keyring::new(b"audit-signing-key".to_vec()));
//! store.append(AuditEventKind::RequestSubmitted, payload, &[request_id])?;
//!
//! assert!(store.verify_integrity().valid);
//! let timeline = store.chain_of_custody(&request_id);
//! ```

pub mod chain;
pub mod export;
pub mod keyring;
pub mod memory;

pub use chain::{hash_entry, sign_hash, verify_chain, verify_signature};
pub use keyring::Keyring;
pub use memory::InMemoryAuditStore;

// ── Tests ─────────────────────────────────────────────────────────────────────
