//! # Outgoing Classifier
//!
//! Self-authored records reach the foreign store in stages: a row appears unsent, and some
//! time later flips to sent or gains an error code. Unsent identities are carried forward in
//! a pending set and re-queried by identity on every tick, regardless of age, until the
//! writer commits or fails them.
//!
//! The pending set has no size cap; its size is exposed through
//! [`OutgoingClassifier::pending_len`] so an embedder can watch for a stuck writer.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{PollWindow, RetrievalStrategy, TickOutcome};
use crate::clock::Clock;
use crate::constants::listeners;
use crate::correlation::PendingRequestRegistry;
use crate::error::StoreError;
use crate::events::{BridgeEvent, EventBus, SendErrorEvent};
use crate::models::Record;
use crate::store::{AuthorshipFilter, KindFilter, MessageStore, RecordQuery};
use crate::tracking::ChangeFilter;

/// Result of re-querying the pending set
#[derive(Debug, Default)]
struct Reconciliation {
    sent: Vec<Record>,
    errored: Vec<Record>,
    still_pending: BTreeSet<String>,
}

fn reconcile(rows: Vec<Record>) -> Reconciliation {
    let mut reconciliation = Reconciliation::default();
    for record in rows {
        if record.is_errored() {
            reconciliation.errored.push(record);
        } else if record.is_sent {
            reconciliation.sent.push(record);
        } else {
            reconciliation.still_pending.insert(record.identity);
        }
    }
    reconciliation
}

#[derive(Debug)]
pub struct OutgoingClassifier {
    store: Arc<dyn MessageStore>,
    filter: Arc<ChangeFilter>,
    events: EventBus,
    registry: PendingRequestRegistry,
    clock: Arc<dyn Clock>,
    lookback_margin: Duration,
    pending: Mutex<BTreeSet<String>>,
}

impl OutgoingClassifier {
    pub fn new(
        store: Arc<dyn MessageStore>,
        filter: Arc<ChangeFilter>,
        events: EventBus,
        registry: PendingRequestRegistry,
        clock: Arc<dyn Clock>,
        lookback_margin: Duration,
    ) -> Self {
        Self {
            store,
            filter,
            events,
            registry,
            clock,
            lookback_margin,
            pending: Mutex::new(BTreeSet::new()),
        }
    }

    /// Identities still waiting for the writer to commit them
    pub fn pending_identities(&self) -> Vec<String> {
        self.pending.lock().iter().cloned().collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    fn publish_sent(&self, record: Record) -> bool {
        let Some(change) = self.filter.admit(&record, self.clock.now()) else {
            return false;
        };
        if let Some(correlation_id) = self.registry.offer(&record) {
            debug!(
                identity = %record.identity,
                correlation_id = %correlation_id,
                "Outgoing record confirmed a pending command"
            );
        }
        self.events.publish(BridgeEvent::entry(change, record));
        true
    }

    fn publish_errored(&self, record: Record) -> bool {
        // the errored transition is claimed once, whether or not a caller was waiting on it
        if self.filter.admit(&record, self.clock.now()).is_none() {
            return false;
        }
        if let Some(correlation_id) = self.registry.reject_errored(&record) {
            info!(
                identity = %record.identity,
                correlation_id = %correlation_id,
                error_code = record.error_code,
                "Foreign writer failed a pending command"
            );
            return false;
        }

        info!(
            identity = %record.identity,
            chat_scope = %record.chat_scope,
            error_code = record.error_code,
            "Outgoing record failed with no pending command"
        );
        let error_code = record.error_code;
        self.events
            .publish(BridgeEvent::MessageSendError(SendErrorEvent { record, error_code }));
        true
    }
}

#[async_trait]
impl RetrievalStrategy for OutgoingClassifier {
    fn name(&self) -> &'static str {
        listeners::OUTGOING
    }

    async fn retrieve(&self, window: PollWindow) -> Result<TickOutcome, StoreError> {
        let after = window.lookback(self.lookback_margin);
        let query = RecordQuery::new()
            .window(after, window.before)
            .authorship(AuthorshipFilter::SelfAuthored)
            .kinds(KindFilter::Messages)
            .include_updated(true);
        let recent = self.store.find(&query).await?;
        let mut observed = recent.len();

        let (newly_sent, newly_unsent): (Vec<Record>, Vec<Record>) =
            recent
                .into_iter()
                .partition(|record| record.is_sent && !record.is_errored());

        let carried: Vec<String> = {
            let mut pending = self.pending.lock();
            pending.extend(newly_unsent.into_iter().map(|record| record.identity));
            pending.iter().cloned().collect()
        };

        let reconciliation = if carried.is_empty() {
            Reconciliation::default()
        } else {
            let rows = self.store.find_by_ids(&carried).await?;
            observed += rows.len();
            reconcile(rows)
        };
        let Reconciliation {
            sent: resolved_sent,
            errored: resolved_errored,
            still_pending,
        } = reconciliation;

        if still_pending.len() != carried.len() {
            debug!(
                carried = carried.len(),
                still_pending = still_pending.len(),
                resolved_sent = resolved_sent.len(),
                resolved_errored = resolved_errored.len(),
                "Reconciled pending outgoing identities"
            );
        }
        *self.pending.lock() = still_pending;

        let mut seen = HashSet::new();
        let mut sent: Vec<Record> = newly_sent
            .into_iter()
            .chain(resolved_sent)
            .filter(|record| seen.insert(record.identity.clone()))
            .collect();
        sent.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut published = 0;
        for record in sent {
            if self.publish_sent(record) {
                published += 1;
            }
        }
        for record in resolved_errored {
            if self.publish_errored(record) {
                published += 1;
            }
        }

        Ok(TickOutcome {
            observed,
            published,
        })
    }
}
