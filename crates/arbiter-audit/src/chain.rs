//! Hash-chain primitives: hashing, signing, and chain verification.
//!
//! Every field that contributes to an entry's hash is listed explicitly so
//! nothing is accidentally omitted.
//!
//! Hash input layout (bytes, in order):
//!   1. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   2. sequence as 8-byte little-endian
//!   3. canonical JSON of (event_type, payload, correlation_ids)
//!   4. timestamp as RFC 3339 UTF-8 bytes
//!
//! The signature is an HMAC-SHA256 over the hex hash, keyed with the
//! signing key active at append time.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256};

use arbiter_contracts::{
    audit::{AuditEntry, AuditEventKind, ChainVerification},
    error::{ArbiterError, ArbiterResult},
};

use crate::keyring::Keyring;

type HmacSha256 = Hmac<Sha256>;

/// The canonical content an entry's hash commits to, serialized as one
/// JSON value so field order is fixed by this struct definition.
#[derive(Serialize)]
struct CanonicalContent<'a> {
    event_type: AuditEventKind,
    payload: &'a serde_json::Value,
    correlation_ids: &'a [String],
}

/// Compute the SHA-256 hash (lowercase hex) for a single audit entry.
pub fn hash_entry(
    sequence: u64,
    event_type: AuditEventKind,
    payload: &serde_json::Value,
    correlation_ids: &[String],
    timestamp: DateTime<Utc>,
    prev_hash: &str,
) -> ArbiterResult<String> {
    let content = CanonicalContent { event_type, payload, correlation_ids };
    let canonical = serde_json::to_vec(&content).map_err(|e| ArbiterError::AuditWrite {
        reason: format!("failed to canonicalize audit payload: {}", e),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(&canonical);
    hasher.update(timestamp.to_rfc3339().as_bytes());

    Ok(hex::encode(hasher.finalize()))
}

/// Sign an entry hash with the given MAC key. Returns lowercase hex.
pub fn sign_hash(key: &[u8], hash: &str) -> ArbiterResult<String> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| ArbiterError::AuditWrite {
        reason: format!("invalid signing key: {}", e),
    })?;
    mac.update(hash.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time verification of an entry signature against one key.
pub fn verify_signature(key: &[u8], hash: &str, signature: &str) -> bool {
    let Ok(sig_bytes) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(hash.as_bytes());
    mac.verify_slice(&sig_bytes).is_ok()
}

/// Verify the integrity of a hash chain.
///
/// Four rules, checked per entry in sequence order:
///
/// 1. **Sequence continuity** — entry *n* carries sequence number *n*.
/// 2. **Prev-hash linkage** — each entry's `prev_hash` equals the previous
///    entry's `hash` (or [`AuditEntry::GENESIS_HASH`] for entry 0).
/// 3. **Hash correctness** — the stored `hash` matches the value recomputed
///    from the entry's own fields.
/// 4. **Signature validity** — the MAC verifies against some key the
///    keyring holds for the entry's timestamp.
///
/// Verification stops at the first mismatch: a single tamper point
/// invalidates every claim about entries after it. An empty chain is
/// trivially valid.
pub fn verify_chain(entries: &[AuditEntry], keyring: &Keyring) -> ChainVerification {
    let mut expected_prev = AuditEntry::GENESIS_HASH.to_string();

    for (index, entry) in entries.iter().enumerate() {
        if entry.sequence != index as u64 {
            return ChainVerification::broken_at(index as u64);
        }

        if entry.prev_hash != expected_prev {
            return ChainVerification::broken_at(entry.sequence);
        }

        let recomputed = hash_entry(
            entry.sequence,
            entry.event_type,
            &entry.payload,
            &entry.correlation_ids,
            entry.timestamp,
            &entry.prev_hash,
        );
        match recomputed {
            Ok(hash) if hash == entry.hash => {}
            _ => return ChainVerification::broken_at(entry.sequence),
        }

        let signed_by_known_key = keyring
            .candidates_for(entry.timestamp)
            .iter()
            .any(|key| verify_signature(key, &entry.hash, &entry.signature));
        if !signed_by_known_key {
            return ChainVerification::broken_at(entry.sequence);
        }

        expected_prev = entry.hash.clone();
    }

    ChainVerification::intact(entries.len() as u64)
}
