//! Bridge wired to an in-memory store, a mock trigger and a manual clock

#![allow(dead_code)]

use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};

use super::MockTrigger;
use relay_core::bridge::RelayBridge;
use relay_core::clock::ManualClock;
use relay_core::config::BridgeConfig;
use relay_core::events::PublishedEvent;
use relay_core::store::InMemoryMessageStore;

pub struct BridgeHarness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemoryMessageStore>,
    pub trigger: Arc<MockTrigger>,
    pub bridge: RelayBridge,
}

impl BridgeHarness {
    pub fn new(start_ms: i64) -> Self {
        Self::with_config(start_ms, BridgeConfig::default())
    }

    pub fn with_config(start_ms: i64, config: BridgeConfig) -> Self {
        let clock = Arc::new(ManualClock::at_millis(start_ms));
        let store = Arc::new(InMemoryMessageStore::new());
        let trigger = Arc::new(MockTrigger::new());
        let bridge = RelayBridge::with_clock(config, store.clone(), trigger.clone(), clock.clone())
            .expect("default configuration is valid");
        Self {
            clock,
            store,
            trigger,
            bridge,
        }
    }

    /// Move the wall clock to `millis` and run one outgoing tick
    pub async fn tick_outgoing_at(&self, millis: i64) {
        self.clock.set_millis(millis);
        self.bridge
            .outgoing()
            .tick_once()
            .await
            .expect("outgoing tick succeeds");
    }

    pub async fn tick_incoming_at(&self, millis: i64) {
        self.clock.set_millis(millis);
        self.bridge
            .incoming()
            .tick_once()
            .await
            .expect("incoming tick succeeds");
    }

    pub async fn tick_structural_at(&self, millis: i64) {
        self.clock.set_millis(millis);
        self.bridge
            .structural()
            .tick_once()
            .await
            .expect("structural tick succeeds");
    }
}

/// Everything currently buffered for `receiver`
pub fn drain_events(receiver: &mut broadcast::Receiver<PublishedEvent>) -> Vec<PublishedEvent> {
    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return events,
        }
    }
}

pub fn event_names(events: &[PublishedEvent]) -> Vec<&'static str> {
    events.iter().map(PublishedEvent::name).collect()
}
