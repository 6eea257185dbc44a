//! # Relay Configuration
//!
//! Every section deserializes with defaults, so a configuration file only needs to name the
//! values it overrides.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use relay_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Loads config/relay.toml, then config/relay.<env>.toml, then RELAY__* overrides
//! let manager = ConfigManager::load()?;
//! let lookback = manager.config().polling.lookback_margin();
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::defaults;
use crate::error::{RelayError, Result};

pub use loader::ConfigManager;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Listener pacing and windowing
    pub polling: PollingConfig,

    /// Dedup cache bound and snapshot retention
    pub tracking: TrackingConfig,

    /// Correlation deadlines
    pub correlation: CorrelationConfig,

    /// Event bus sizing
    pub events: EventsConfig,
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, listener) in [
            ("incoming", &self.polling.incoming),
            ("outgoing", &self.polling.outgoing),
            ("structural", &self.polling.structural),
        ] {
            if listener.interval_ms == 0 {
                return Err(RelayError::ConfigurationError(format!(
                    "polling.{name}.interval_ms must be greater than zero"
                )));
            }
        }

        if self.tracking.dedup_max_entries == 0 {
            return Err(RelayError::ConfigurationError(
                "tracking.dedup_max_entries must be greater than zero".to_string(),
            ));
        }

        if self.tracking.snapshot_retention_seconds == 0 {
            return Err(RelayError::ConfigurationError(
                "tracking.snapshot_retention_seconds must be greater than zero".to_string(),
            ));
        }

        if self.correlation.text_timeout_ms == 0 || self.correlation.attachment_timeout_ms == 0 {
            return Err(RelayError::ConfigurationError(
                "correlation timeouts must be greater than zero".to_string(),
            ));
        }

        if self.events.channel_capacity == 0 {
            return Err(RelayError::ConfigurationError(
                "events.channel_capacity must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    pub incoming: ListenerConfig,
    pub outgoing: ListenerConfig,
    pub structural: ListenerConfig,

    /// Backward offset applied to every query window to absorb commit latency and clock skew
    pub lookback_margin_ms: u64,
}

impl PollingConfig {
    pub fn lookback_margin(&self) -> Duration {
        Duration::from_millis(self.lookback_margin_ms)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            incoming: ListenerConfig::default(),
            outgoing: ListenerConfig::default(),
            structural: ListenerConfig::default(),
            lookback_margin_ms: defaults::LOOKBACK_MARGIN_MS,
        }
    }
}

/// Per-listener switch and target tick interval
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl ListenerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: defaults::POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Dedup cache size that triggers a bulk purge
    pub dedup_max_entries: usize,
    pub snapshot_retention_seconds: u64,
}

impl TrackingConfig {
    pub fn snapshot_retention(&self) -> Duration {
        Duration::from_secs(self.snapshot_retention_seconds)
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            dedup_max_entries: defaults::DEDUP_MAX_ENTRIES,
            snapshot_retention_seconds: defaults::SNAPSHOT_RETENTION_SECONDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub text_timeout_ms: u64,
    /// Attachments are transcoded server-side and take considerably longer to land
    pub attachment_timeout_ms: u64,
}

impl CorrelationConfig {
    pub fn text_timeout(&self) -> Duration {
        Duration::from_millis(self.text_timeout_ms)
    }

    pub fn attachment_timeout(&self) -> Duration {
        Duration::from_millis(self.attachment_timeout_ms)
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            text_timeout_ms: defaults::TEXT_CORRELATION_TIMEOUT_MS,
            attachment_timeout_ms: defaults::ATTACHMENT_CORRELATION_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: defaults::EVENT_CHANNEL_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.polling.lookback_margin(), Duration::from_secs(15));
        assert_eq!(config.tracking.snapshot_retention(), Duration::from_secs(300));
        assert_eq!(config.correlation.text_timeout(), Duration::from_secs(30));
        assert_eq!(config.correlation.attachment_timeout(), Duration::from_secs(180));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = BridgeConfig::default();
        config.polling.outgoing.interval_ms = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("polling.outgoing.interval_ms"));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{"polling": {"outgoing": {"interval_ms": 250}}}"#).unwrap();
        assert_eq!(config.polling.outgoing.interval_ms, 250);
        assert!(config.polling.outgoing.enabled);
        assert_eq!(config.polling.incoming.interval_ms, defaults::POLL_INTERVAL_MS);
        assert_eq!(config.events.channel_capacity, defaults::EVENT_CHANNEL_CAPACITY);
    }
}
