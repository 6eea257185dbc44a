//! # Message State Tracker
//!
//! Per-identity snapshot diffing. Each observation of a record is compared against the last
//! snapshot taken for its identity:
//!
//! - no snapshot (or an expired one): **New**, snapshot stored
//! - any mutable field strictly advanced: **Updated**, snapshot replaced
//! - otherwise: **NoChange**, snapshot left untouched
//!
//! Lifecycle fields only ever move forward in the foreign store, so a field that appears to
//! regress is a stale read and is ignored. The check-and-replace happens under the map's
//! per-entry lock, so two listeners re-checking the same identity concurrently cannot both
//! observe the same transition.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::clock::to_chrono;
use crate::models::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    New,
    Updated,
    NoChange,
}

/// The mutable lifecycle fields of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutableState {
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub edited_at: Option<DateTime<Utc>>,
    pub retracted_at: Option<DateTime<Utc>>,
    pub is_sent: bool,
    pub did_notify_recipient: bool,
}

impl MutableState {
    pub fn of(record: &Record) -> Self {
        Self {
            delivered_at: record.delivered_at,
            read_at: record.read_at,
            edited_at: record.edited_at,
            retracted_at: record.retracted_at,
            is_sent: record.is_sent,
            did_notify_recipient: record.did_notify_recipient,
        }
    }

    /// Whether any field moved strictly forward relative to `prior`
    pub fn advanced_over(&self, prior: &MutableState) -> bool {
        fn later(current: Option<DateTime<Utc>>, prior: Option<DateTime<Utc>>) -> bool {
            match (current, prior) {
                (Some(_), None) => true,
                (Some(current), Some(prior)) => current > prior,
                _ => false,
            }
        }

        later(self.delivered_at, prior.delivered_at)
            || later(self.read_at, prior.read_at)
            || later(self.edited_at, prior.edited_at)
            || later(self.retracted_at, prior.retracted_at)
            || (self.is_sent && !prior.is_sent)
            || (self.did_notify_recipient && !prior.did_notify_recipient)
    }
}

#[derive(Debug, Clone)]
pub struct TrackedSnapshot {
    pub state: MutableState,
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct MessageStateTracker {
    snapshots: DashMap<String, TrackedSnapshot>,
    retention: Duration,
}

impl MessageStateTracker {
    pub fn new(retention: Duration) -> Self {
        Self {
            snapshots: DashMap::new(),
            retention,
        }
    }

    fn is_expired(&self, snapshot: &TrackedSnapshot, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(snapshot.taken_at) >= to_chrono(self.retention)
    }

    /// Classify an observation of `record` made at `now`
    pub fn classify(&self, record: &Record, now: DateTime<Utc>) -> Classification {
        let observed = TrackedSnapshot {
            state: MutableState::of(record),
            taken_at: now,
        };

        match self.snapshots.entry(record.identity.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(observed);
                Classification::New
            }
            Entry::Occupied(mut occupied) => {
                if self.is_expired(occupied.get(), now) {
                    occupied.insert(observed);
                    Classification::New
                } else if observed.state.advanced_over(&occupied.get().state) {
                    occupied.insert(observed);
                    Classification::Updated
                } else {
                    Classification::NoChange
                }
            }
        }
    }

    /// Drop snapshots older than the retention window, returning how many were evicted
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.snapshots.len();
        let retention = to_chrono(self.retention);
        self.snapshots
            .retain(|_, snapshot| now.signed_duration_since(snapshot.taken_at) < retention);
        before.saturating_sub(self.snapshots.len())
    }

    pub fn snapshot(&self, identity: &str) -> Option<TrackedSnapshot> {
        self.snapshots.get(identity).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }
}
