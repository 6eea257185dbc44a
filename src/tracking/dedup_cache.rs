//! # Event Dedup Cache
//!
//! Bounded membership set answering "has this exact transition already been emitted".
//! Overlapping poll windows (the lookback margin) guarantee that every record is observed
//! more than once, so every emission path checks here first.
//!
//! Keys are scoped tightly to identity plus a digest of the mutable fields. A false
//! "contains" would silently drop a real event; a false "absent" (after a purge) only yields
//! a harmless duplicate downstream. The bound is enforced by bulk purging rather than LRU
//! because purged keys have already fallen out of the lookback window.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::models::Record;

/// Identity plus digest of the fields whose change constitutes a new transition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    identity: String,
    state_digest: String,
}

impl DedupKey {
    pub fn new(identity: impl Into<String>, state_digest: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            state_digest: state_digest.into(),
        }
    }

    /// Key for the record's current lifecycle state
    pub fn for_record(record: &Record) -> Self {
        let millis = |at: Option<chrono::DateTime<chrono::Utc>>| at.map_or(0, |at| at.timestamp_millis());
        let digest = format!(
            "d{}:r{}:e{}:x{}:s{}:n{}:err{}",
            millis(record.delivered_at),
            millis(record.read_at),
            millis(record.edited_at),
            millis(record.retracted_at),
            u8::from(record.is_sent),
            u8::from(record.did_notify_recipient),
            record.error_code,
        );
        Self::new(record.identity.clone(), digest)
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.identity, self.state_digest)
    }
}

#[derive(Debug)]
pub struct EventDedupCache {
    keys: Mutex<HashSet<DedupKey>>,
    max_entries: usize,
    purges: AtomicU64,
}

impl EventDedupCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            keys: Mutex::new(HashSet::new()),
            max_entries,
            purges: AtomicU64::new(0),
        }
    }

    pub fn add(&self, key: DedupKey) {
        self.keys.lock().insert(key);
    }

    /// Atomic check-and-add used on every emission path; `false` when `key` was present
    pub fn insert_if_absent(&self, key: DedupKey) -> bool {
        self.keys.lock().insert(key)
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.keys.lock().contains(key)
    }

    /// Clear every key, returning how many were dropped
    pub fn purge(&self) -> usize {
        let mut keys = self.keys.lock();
        let dropped = keys.len();
        keys.clear();
        self.purges.fetch_add(1, Ordering::Relaxed);
        dropped
    }

    /// Purge in bulk when the size bound is exceeded
    pub fn purge_if_over_bound(&self) -> Option<usize> {
        if self.len() <= self.max_entries {
            return None;
        }
        let dropped = self.purge();
        debug!(
            dropped = dropped,
            max_entries = self.max_entries,
            "Dedup cache exceeded its bound, purged"
        );
        Some(dropped)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn purge_count(&self) -> u64 {
        self.purges.load(Ordering::Relaxed)
    }
}
