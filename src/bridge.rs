//! # Relay Bridge
//!
//! Explicit bootstrap of every service: one shared event bus, change filter and correlation
//! registry, a [`MessageSender`] for issuing commands, and the three polling listeners.
//!
//! ```rust,no_run
//! use relay_core::bridge::RelayBridge;
//! use relay_core::config::BridgeConfig;
//! use relay_core::store::InMemoryMessageStore;
//! # use relay_core::automation::{AutomationCommand, AutomationTrigger};
//! # use relay_core::error::AutomationError;
//! # use std::sync::Arc;
//! # #[derive(Debug)]
//! # struct ScriptTrigger;
//! # #[async_trait::async_trait]
//! # impl AutomationTrigger for ScriptTrigger {
//! #     async fn issue(&self, _: &AutomationCommand) -> Result<(), AutomationError> { Ok(()) }
//! # }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryMessageStore::new());
//! let bridge = RelayBridge::new(BridgeConfig::default(), store, Arc::new(ScriptTrigger))?;
//! let mut events = bridge.subscribe();
//!
//! bridge.start();
//! let handle = bridge.sender().send_text("SCOPE-1", "On my way").await?;
//! let confirmed = handle.await?;
//! println!("confirmed as {}", confirmed.identity);
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{}", event.name());
//! }
//! bridge.stop().await;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use crate::automation::{AutomationTrigger, MessageSender};
use crate::clock::{Clock, SystemClock};
use crate::config::BridgeConfig;
use crate::correlation::PendingRequestRegistry;
use crate::error::Result;
use crate::events::{EventBus, PublishedEvent};
use crate::polling::{
    IncomingStrategy, OutgoingClassifier, PollScheduler, SchedulerStats, StructuralStrategy,
};
use crate::store::MessageStore;
use crate::tracking::ChangeFilter;

/// Point-in-time view of the bridge's in-memory state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeStats {
    pub pending_correlations: usize,
    pub pending_identities: usize,
    pub dedup_entries: usize,
    pub tracked_snapshots: usize,
    pub published_events: u64,
    pub listeners: Vec<SchedulerStats>,
}

#[derive(Debug)]
pub struct RelayBridge {
    bridge_id: Uuid,
    config: BridgeConfig,
    events: EventBus,
    filter: Arc<ChangeFilter>,
    registry: PendingRequestRegistry,
    sender: MessageSender,
    incoming: PollScheduler<IncomingStrategy>,
    outgoing: PollScheduler<OutgoingClassifier>,
    structural: PollScheduler<StructuralStrategy>,
}

impl RelayBridge {
    pub fn new(
        config: BridgeConfig,
        store: Arc<dyn MessageStore>,
        trigger: Arc<dyn AutomationTrigger>,
    ) -> Result<Self> {
        Self::with_clock(config, store, trigger, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: BridgeConfig,
        store: Arc<dyn MessageStore>,
        trigger: Arc<dyn AutomationTrigger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let events = EventBus::from_config(&config.events, Arc::clone(&clock));
        let filter = Arc::new(ChangeFilter::from_config(&config.tracking));
        let registry = PendingRequestRegistry::new(Arc::clone(&clock), events.clone());
        let sender = MessageSender::new(
            trigger,
            registry.clone(),
            Arc::clone(&clock),
            config.correlation.clone(),
        );
        let lookback = config.polling.lookback_margin();

        let incoming = PollScheduler::new(
            IncomingStrategy::new(
                Arc::clone(&store),
                Arc::clone(&filter),
                events.clone(),
                Arc::clone(&clock),
                lookback,
            ),
            config.polling.incoming.interval(),
            Arc::clone(&filter),
            events.clone(),
            Arc::clone(&clock),
        );
        let outgoing = PollScheduler::new(
            OutgoingClassifier::new(
                Arc::clone(&store),
                Arc::clone(&filter),
                events.clone(),
                registry.clone(),
                Arc::clone(&clock),
                lookback,
            ),
            config.polling.outgoing.interval(),
            Arc::clone(&filter),
            events.clone(),
            Arc::clone(&clock),
        );
        let structural = PollScheduler::new(
            StructuralStrategy::new(
                store,
                Arc::clone(&filter),
                events.clone(),
                Arc::clone(&clock),
                lookback,
            ),
            config.polling.structural.interval(),
            Arc::clone(&filter),
            events.clone(),
            clock,
        );

        let bridge_id = Uuid::new_v4();
        info!(
            bridge_id = %bridge_id,
            lookback_margin_ms = config.polling.lookback_margin_ms,
            dedup_max_entries = config.tracking.dedup_max_entries,
            "Relay bridge constructed"
        );

        Ok(Self {
            bridge_id,
            config,
            events,
            filter,
            registry,
            sender,
            incoming,
            outgoing,
            structural,
        })
    }

    /// Start every enabled listener. Must be called within a tokio runtime.
    pub fn start(&self) {
        let polling = &self.config.polling;
        if polling.incoming.enabled {
            self.incoming.start();
        }
        if polling.outgoing.enabled {
            self.outgoing.start();
        }
        if polling.structural.enabled {
            self.structural.start();
        }
        info!(
            bridge_id = %self.bridge_id,
            incoming = polling.incoming.enabled,
            outgoing = polling.outgoing.enabled,
            structural = polling.structural.enabled,
            "Relay bridge started"
        );
    }

    /// Stop every listener, letting in-flight ticks finish. Pending correlations are left
    /// to settle on their own deadlines.
    pub async fn stop(&self) {
        futures::join!(
            self.incoming.stop(),
            self.outgoing.stop(),
            self.structural.stop()
        );
        info!(
            bridge_id = %self.bridge_id,
            pending_correlations = self.registry.pending_count(),
            "Relay bridge stopped"
        );
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.events.subscribe()
    }

    pub fn sender(&self) -> &MessageSender {
        &self.sender
    }

    pub fn registry(&self) -> &PendingRequestRegistry {
        &self.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn change_filter(&self) -> &ChangeFilter {
        &self.filter
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn incoming(&self) -> &PollScheduler<IncomingStrategy> {
        &self.incoming
    }

    pub fn outgoing(&self) -> &PollScheduler<OutgoingClassifier> {
        &self.outgoing
    }

    pub fn structural(&self) -> &PollScheduler<StructuralStrategy> {
        &self.structural
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            pending_correlations: self.registry.pending_count(),
            pending_identities: self.outgoing.strategy().pending_len(),
            dedup_entries: self.filter.dedup().len(),
            tracked_snapshots: self.filter.tracker().len(),
            published_events: self.events.published_count(),
            listeners: vec![
                self.incoming.stats(),
                self.outgoing.stats(),
                self.structural.stats(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::AutomationCommand;
    use crate::clock::ManualClock;
    use crate::error::{AutomationError, RelayError};
    use crate::polling::SchedulerState;
    use crate::store::InMemoryMessageStore;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct AcceptingTrigger;

    #[async_trait]
    impl AutomationTrigger for AcceptingTrigger {
        async fn issue(&self, _command: &AutomationCommand) -> std::result::Result<(), AutomationError> {
            Ok(())
        }
    }

    fn bridge(config: BridgeConfig) -> Result<RelayBridge> {
        RelayBridge::with_clock(
            config,
            Arc::new(InMemoryMessageStore::new()),
            Arc::new(AcceptingTrigger),
            Arc::new(ManualClock::at_millis(0)),
        )
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = BridgeConfig::default();
        config.polling.outgoing.interval_ms = 0;
        assert!(matches!(bridge(config), Err(RelayError::ConfigurationError(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_listeners_stay_stopped() {
        let mut config = BridgeConfig::default();
        config.polling.structural.enabled = false;
        let bridge = bridge(config).unwrap();

        bridge.start();
        assert!(bridge.incoming().is_running());
        assert!(bridge.outgoing().is_running());
        assert!(!bridge.structural().is_running());

        bridge.stop().await;
        let stats = bridge.stats();
        assert!(stats
            .listeners
            .iter()
            .all(|listener| listener.state == SchedulerState::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_start_empty() {
        let bridge = bridge(BridgeConfig::default()).unwrap();
        let stats = bridge.stats();

        assert_eq!(stats.pending_correlations, 0);
        assert_eq!(stats.pending_identities, 0);
        assert_eq!(stats.dedup_entries, 0);
        assert_eq!(stats.listeners.len(), 3);
        assert_eq!(stats.listeners[1].listener, "outgoing");
    }
}
