//! # Change Tracking
//!
//! Turns repeated observations of the same foreign rows into at-most-once transitions.
//!
//! [`ChangeFilter`] composes the two layers every emission path goes through:
//!
//! 1. [`MessageStateTracker`] decides whether the observation is New, Updated or NoChange
//! 2. [`EventDedupCache`] suppresses a transition that was already emitted, e.g. after the
//!    tracker evicted a snapshot while the record was still inside the lookback window

pub mod dedup_cache;
pub mod state_tracker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TrackingConfig;
use crate::models::Record;

pub use dedup_cache::{DedupKey, EventDedupCache};
pub use state_tracker::{Classification, MessageStateTracker, MutableState, TrackedSnapshot};

/// Transition admitted for publication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryChange {
    New,
    Updated,
}

/// Outcome of one maintenance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub dedup_purged: Option<usize>,
    pub snapshots_evicted: usize,
}

#[derive(Debug)]
pub struct ChangeFilter {
    tracker: MessageStateTracker,
    dedup: EventDedupCache,
}

impl ChangeFilter {
    pub fn new(tracker: MessageStateTracker, dedup: EventDedupCache) -> Self {
        Self { tracker, dedup }
    }

    pub fn from_config(config: &TrackingConfig) -> Self {
        Self::new(
            MessageStateTracker::new(config.snapshot_retention()),
            EventDedupCache::new(config.dedup_max_entries),
        )
    }

    /// Classify `record` and claim its dedup key; `None` means nothing should be emitted
    pub fn admit(&self, record: &Record, now: DateTime<Utc>) -> Option<EntryChange> {
        let change = match self.tracker.classify(record, now) {
            Classification::NoChange => return None,
            Classification::New => EntryChange::New,
            Classification::Updated => EntryChange::Updated,
        };

        let key = DedupKey::for_record(record);
        if !self.dedup.insert_if_absent(key) {
            debug!(
                identity = %record.identity,
                classification = ?change,
                "Transition already emitted, suppressing"
            );
            return None;
        }

        Some(change)
    }

    /// Bulk-purge the dedup cache when over its bound and evict expired snapshots
    pub fn maintain(&self, now: DateTime<Utc>) -> MaintenanceReport {
        MaintenanceReport {
            dedup_purged: self.dedup.purge_if_over_bound(),
            snapshots_evicted: self.tracker.evict_expired(now),
        }
    }

    pub fn tracker(&self) -> &MessageStateTracker {
        &self.tracker
    }

    pub fn dedup(&self) -> &EventDedupCache {
        &self.dedup
    }
}
