//! Error types for the relay core.
//!
//! Internal failures (store queries, classification races) are recovered inside the polling
//! loops and surface only as diagnostic events. The only failures a caller ever sees are
//! [`RelayError`] from constructors/senders and [`CorrelationError`] from a settled
//! correlation handle.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RelayError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Automation error: {0}")]
    Automation(#[from] AutomationError),
    #[error("Correlation failed: {0}")]
    Correlation(#[from] CorrelationError),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Event error: {0}")]
    EventError(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for RelayError {
    fn from(error: serde_json::Error) -> Self {
        RelayError::EventError(format!("JSON serialization error: {error}"))
    }
}

impl From<config::ConfigError> for RelayError {
    fn from(error: config::ConfigError) -> Self {
        RelayError::ConfigurationError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// Failures reported by a [`MessageStore`](crate::store::MessageStore) implementation.
///
/// Every variant is treated as transient by the polling loops.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Malformed row {identity}: {reason}")]
    MalformedRow { identity: String, reason: String },
}

/// Immediate failures reported by an [`AutomationTrigger`](crate::automation::AutomationTrigger).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AutomationError {
    #[error("Automation command rejected: {0}")]
    Rejected(String),
    #[error("Automation command failed to execute: {0}")]
    ExecutionFailed(String),
    #[error("Automation command timed out after {0:?}")]
    TimedOut(Duration),
}

/// Typed settlement failure delivered to whoever holds a correlation handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    #[error("Foreign store reported send error code {error_code}")]
    SendFailed { error_code: i64 },
    #[error("No matching record observed within {deadline:?}")]
    Timeout { deadline: Duration },
    #[error("Correlation was abandoned before settlement")]
    Abandoned,
}

impl CorrelationError {
    /// Short event-style name, used in logs and on the event bus.
    pub fn kind(&self) -> &'static str {
        match self {
            CorrelationError::SendFailed { .. } => "send-error",
            CorrelationError::Timeout { .. } => "timeout",
            CorrelationError::Abandoned => "abandoned",
        }
    }
}
