//! Signing key management with rotation support.
//!
//! Every audit entry is signed with the key active at append time. Keys
//! rotate without invalidating historical verification: a retired key keeps
//! the time range it covered, and verification selects candidate keys by
//! entry timestamp. A keyring with no active key fails every append closed —
//! an unsigned entry is indistinguishable from a forgery and is never
//! produced.

use chrono::{DateTime, Utc};

/// A retired signing key bounded to the time range it was active for.
#[derive(Debug, Clone)]
pub struct RetiredKey {
    key: Vec<u8>,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
}

/// The set of MAC keys known to one audit chain.
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    active: Option<Vec<u8>>,
    active_since: Option<DateTime<Utc>>,
    retired: Vec<RetiredKey>,
}

impl Keyring {
    /// A keyring with the given active signing key.
    pub fn new(active: impl Into<Vec<u8>>) -> Self {
        Self {
            active: Some(active.into()),
            active_since: None,
            retired: Vec::new(),
        }
    }

    /// A keyring with no active key. Appends against it fail closed;
    /// useful for exercising the no-key path and for verify-only chains
    /// that hold nothing but retired keys.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a retired key covering `[valid_from, valid_until]`.
    pub fn with_retired(
        mut self,
        key: impl Into<Vec<u8>>,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        self.retired.push(RetiredKey {
            key: key.into(),
            valid_from,
            valid_until,
        });
        self
    }

    /// The key new appends are signed with, when one is installed.
    pub fn active(&self) -> Option<&[u8]> {
        self.active.as_deref()
    }

    /// Install `new_key` as the active key, retiring the current one with
    /// a validity range ending at `now`.
    pub fn rotate(&mut self, new_key: impl Into<Vec<u8>>, now: DateTime<Utc>) {
        if let Some(old) = self.active.take() {
            self.retired.push(RetiredKey {
                key: old,
                valid_from: self.active_since.unwrap_or(DateTime::<Utc>::MIN_UTC),
                valid_until: now,
            });
        }
        self.active = Some(new_key.into());
        self.active_since = Some(now);
    }

    /// Keys that could legitimately have signed an entry at `timestamp`:
    /// retired keys whose range covers it, then the active key.
    pub fn candidates_for(&self, timestamp: DateTime<Utc>) -> Vec<&[u8]> {
        let mut candidates: Vec<&[u8]> = self
            .retired
            .iter()
            .filter(|r| r.valid_from <= timestamp && timestamp <= r.valid_until)
            .map(|r| r.key.as_slice())
            .collect();
        if let Some(active) = self.active.as_deref() {
            candidates.push(active);
        }
        candidates
    }
}
