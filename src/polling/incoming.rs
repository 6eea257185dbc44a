use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{PollWindow, RetrievalStrategy, TickOutcome};
use crate::clock::Clock;
use crate::constants::listeners;
use crate::error::StoreError;
use crate::events::{BridgeEvent, EventBus};
use crate::store::{AuthorshipFilter, KindFilter, MessageStore, RecordQuery};
use crate::tracking::ChangeFilter;

/// Messages from other participants, including edits and retractions of earlier ones
#[derive(Debug)]
pub struct IncomingStrategy {
    store: Arc<dyn MessageStore>,
    filter: Arc<ChangeFilter>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    lookback_margin: Duration,
}

impl IncomingStrategy {
    pub fn new(
        store: Arc<dyn MessageStore>,
        filter: Arc<ChangeFilter>,
        events: EventBus,
        clock: Arc<dyn Clock>,
        lookback_margin: Duration,
    ) -> Self {
        Self {
            store,
            filter,
            events,
            clock,
            lookback_margin,
        }
    }
}

#[async_trait]
impl RetrievalStrategy for IncomingStrategy {
    fn name(&self) -> &'static str {
        listeners::INCOMING
    }

    async fn retrieve(&self, window: PollWindow) -> Result<TickOutcome, StoreError> {
        let after = window.lookback(self.lookback_margin);
        let query = RecordQuery::new()
            .window(after, window.before)
            .authorship(AuthorshipFilter::Others)
            .kinds(KindFilter::Messages)
            .include_updated(true);
        let records = self.store.find(&query).await?;

        let now = self.clock.now();
        let mut outcome = TickOutcome {
            observed: records.len(),
            published: 0,
        };
        for record in records {
            if let Some(change) = self.filter.admit(&record, now) {
                self.events.publish(BridgeEvent::entry(change, record));
                outcome.published += 1;
            }
        }
        Ok(outcome)
    }
}
