use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use super::BridgeEvent;
use crate::clock::{Clock, SystemClock};
use crate::config::EventsConfig;
use crate::constants::defaults;

/// Non-blocking fan-out of classified events
///
/// Publishing never waits on subscribers: a subscriber that falls behind by more than the
/// channel capacity observes `RecvError::Lagged` instead of stalling the polling loops.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PublishedEvent>,
    published: Arc<AtomicU64>,
    clock: Arc<dyn Clock>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub id: Uuid,
    pub event: BridgeEvent,
    pub published_at: DateTime<Utc>,
}

impl PublishedEvent {
    pub fn name(&self) -> &'static str {
        self.event.name()
    }
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    /// Event bus stamping `published_at` from the given clock
    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: Arc::new(AtomicU64::new(0)),
            clock,
        }
    }

    pub fn from_config(config: &EventsConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_clock(config.channel_capacity, clock)
    }

    /// Publish an event, returning how many subscribers will observe it
    pub fn publish(&self, event: BridgeEvent) -> usize {
        let name = event.name();
        self.published.fetch_add(1, Ordering::Relaxed);

        // No subscribers is acceptable - events are published even if no one is listening
        let receivers = self
            .sender
            .send(PublishedEvent {
                id: Uuid::new_v4(),
                event,
                published_at: self.clock.now(),
            })
            .unwrap_or(0);

        trace!(event = name, receivers = receivers, "Published event");
        receivers
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Total events published since construction
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(defaults::EVENT_CHANNEL_CAPACITY)
    }
}
