//! In-memory implementation of the `AuditStore` trait.
//!
//! `InMemoryAuditStore` is the reference implementation: all entries live
//! in a `Vec` behind a single `Mutex`, which serializes appends (the hash
//! of entry *n* depends on entry *n−1*) and gives readers a consistent
//! snapshot. A persistent implementation upholds the same contract against
//! durable storage.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use arbiter_contracts::{
    audit::{AuditEntry, AuditEventKind, ChainVerification, ExportOptions},
    error::{ArbiterError, ArbiterResult},
};
use arbiter_core::traits::{AuditStore, Clock, SystemClock};

use crate::{
    chain::{hash_entry, sign_hash, verify_chain},
    export::render,
    keyring::Keyring,
};

/// The mutable interior: the chain itself plus the keys that sign it.
/// One lock covers both so an append observes a stable keyring.
pub(crate) struct ChainState {
    pub(crate) entries: Vec<AuditEntry>,
    pub(crate) last_hash: String,
    pub(crate) keyring: Keyring,
}

/// An in-memory, append-only audit store backed by a SHA-256 hash chain
/// with HMAC-signed entries.
///
/// # Thread safety
///
/// All operations acquire the internal `Mutex`; appends are strictly
/// serialized across threads, and reads clone a consistent snapshot.
pub struct InMemoryAuditStore {
    pub(crate) state: Arc<Mutex<ChainState>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryAuditStore {
    /// Create a store signing with the given keyring, on the system clock.
    pub fn new(keyring: Keyring) -> Self {
        Self::with_clock(keyring, Arc::new(SystemClock))
    }

    /// Create a store with an injected clock, for deterministic tests.
    pub fn with_clock(keyring: Keyring, clock: Arc<dyn Clock>) -> Self {
        let state = ChainState {
            entries: Vec::new(),
            last_hash: AuditEntry::GENESIS_HASH.to_string(),
            keyring,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            clock,
        }
    }

    /// Rotate the signing key. Entries appended before `now` keep verifying
    /// against the retired key; new appends sign with `new_key`.
    pub fn rotate_key(&self, new_key: impl Into<Vec<u8>>, now: DateTime<Utc>) {
        let mut state = self.state.lock().expect("audit state lock poisoned");
        state.keyring.rotate(new_key, now);
        info!(rotated_at = %now, "audit signing key rotated");
    }
}

impl AuditStore for InMemoryAuditStore {
    /// Append one entry to the hash chain.
    ///
    /// Fails closed with `AuditWrite` when no signing key is installed:
    /// an unsigned entry is never produced.
    fn append(
        &self,
        event_type: AuditEventKind,
        payload: serde_json::Value,
        correlation_ids: &[String],
    ) -> ArbiterResult<AuditEntry> {
        let mut state = self.state.lock().map_err(|e| ArbiterError::AuditWrite {
            reason: format!("audit state lock poisoned: {}", e),
        })?;

        let key = state
            .keyring
            .active()
            .ok_or_else(|| ArbiterError::AuditWrite {
                reason: "signing key unavailable; refusing to write unsigned entry".to_string(),
            })?
            .to_vec();

        let sequence = state.entries.len() as u64;
        let prev_hash = state.last_hash.clone();
        let timestamp = self.clock.now();

        let hash = hash_entry(
            sequence,
            event_type,
            &payload,
            correlation_ids,
            timestamp,
            &prev_hash,
        )?;
        let signature = sign_hash(&key, &hash)?;

        let entry = AuditEntry {
            sequence,
            event_type,
            payload,
            correlation_ids: correlation_ids.to_vec(),
            timestamp,
            prev_hash,
            hash: hash.clone(),
            signature,
        };

        state.entries.push(entry.clone());
        state.last_hash = hash;

        debug!(
            sequence = sequence,
            event_type = %event_type,
            "audit entry appended"
        );

        Ok(entry)
    }

    fn verify_integrity(&self) -> ChainVerification {
        let state = self.state.lock().expect("audit state lock poisoned");
        verify_chain(&state.entries, &state.keyring)
    }

    fn chain_of_custody(&self, correlation_id: &str) -> Vec<AuditEntry> {
        let state = self.state.lock().expect("audit state lock poisoned");
        state
            .entries
            .iter()
            .filter(|e| e.correlation_ids.iter().any(|id| id == correlation_id))
            .cloned()
            .collect()
    }

    fn export(&self, options: &ExportOptions) -> ArbiterResult<Vec<u8>> {
        let entries = self.entries();
        render(&entries, options)
    }

    fn entries(&self) -> Vec<AuditEntry> {
        let state = self.state.lock().expect("audit state lock poisoned");
        state.entries.clone()
    }

    fn len(&self) -> usize {
        let state = self.state.lock().expect("audit state lock poisoned");
        state.entries.len()
    }
}
