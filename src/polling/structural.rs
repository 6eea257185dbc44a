use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{PollWindow, RetrievalStrategy, TickOutcome};
use crate::clock::Clock;
use crate::constants::listeners;
use crate::error::StoreError;
use crate::events::{BridgeEvent, EventBus};
use crate::store::{KindFilter, MessageStore, RecordQuery};
use crate::tracking::{ChangeFilter, EntryChange};

/// Group membership, naming and icon changes
///
/// Structural rows never change once written, so only a row's first observation is
/// published.
#[derive(Debug)]
pub struct StructuralStrategy {
    store: Arc<dyn MessageStore>,
    filter: Arc<ChangeFilter>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    lookback_margin: Duration,
}

impl StructuralStrategy {
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
impl RetrievalStrategy for StructuralStrategy {
    fn name(&self) -> &'static str {
        listeners::STRUCTURAL
    }

    async fn retrieve(&self, window: PollWindow) -> Result<TickOutcome, StoreError> {
        let query = RecordQuery::new()
            .window(window.lookback(self.lookback_margin), window.before)
            .kinds(KindFilter::Structural);
        let records = self.store.find(&query).await?;

        let now = self.clock.now();
        let mut outcome = TickOutcome {
            observed: records.len(),
            published: 0,
        };
        for record in &records {
            if self.filter.admit(record, now) != Some(EntryChange::New) {
                continue;
            }
            if let Some(event) = BridgeEvent::structural(record) {
                self.events.publish(event);
                outcome.published += 1;
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{from_millis, ManualClock};
    use crate::models::{Record, RecordKind};
    use crate::store::InMemoryMessageStore;
    use crate::tracking::{EventDedupCache, MessageStateTracker};

    #[tokio::test]
    async fn test_structural_rows_published_once_in_row_order() {
        let store = Arc::new(InMemoryMessageStore::new());
        store.upsert(Record::structural(
            "s2",
            "GROUP-1",
            RecordKind::NameChange {
                new_name: Some("Climbing".to_string()),
            },
            from_millis(19_600),
        ));
        store.upsert(
            Record::structural("s1", "GROUP-1", RecordKind::ParticipantLeft, from_millis(19_500))
                .with_handle("+15550100"),
        );
        store.upsert(Record::message("m1", "GROUP-1", "hi", from_millis(19_700)));

        let events = EventBus::new(16);
        let mut subscriber = events.subscribe();
        let strategy = StructuralStrategy::new(
            store,
            Arc::new(ChangeFilter::new(
                MessageStateTracker::new(Duration::from_secs(300)),
                EventDedupCache::new(100),
            )),
            events,
            Arc::new(ManualClock::at_millis(20_000)),
            Duration::from_secs(15),
        );

        let window = PollWindow::new(from_millis(19_000), from_millis(20_000));
        let first = strategy.retrieve(window).await.unwrap();
        let second = strategy
            .retrieve(PollWindow::new(from_millis(20_000), from_millis(21_000)))
            .await
            .unwrap();

        assert_eq!(first, TickOutcome { observed: 2, published: 2 });
        assert_eq!(second.published, 0);
        assert_eq!(subscriber.recv().await.unwrap().name(), "participant-left");
        let rename = subscriber.recv().await.unwrap();
        match rename.event {
            BridgeEvent::NameChange(change) => {
                assert_eq!(change.new_name.as_deref(), Some("Climbing"))
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
