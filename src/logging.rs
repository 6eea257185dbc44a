//! # Structured Logging Module
//!
//! Environment-aware console logging using the tracing ecosystem. Logs go to stdout, as
//! human-readable lines by default or as JSON objects when `RELAY_LOG_FORMAT=json`.
//!
//! The default level follows `RELAY_ENV` (`test` and `development` log at debug,
//! `production` at info) and `RUST_LOG` overrides it.

use chrono::Utc;
use std::io::IsTerminal;
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

use crate::polling::{PollWindow, TickOutcome};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// Safe to call more than once; an already-installed global subscriber (for example one set
/// up by an embedding application) is left in place.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json = std::env::var("RELAY_LOG_FORMAT").is_ok_and(|format| format == "json");

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(std::io::stdout().is_terminal())
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
            return;
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json = json,
            "STRUCTURED LOGGING: Initialized console output"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("RELAY_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log a completed poll tick; quiet ticks only at debug
pub fn log_poll_tick(listener: &str, window: &PollWindow, outcome: &TickOutcome, elapsed: Duration) {
    if outcome.published == 0 {
        tracing::debug!(
            listener = %listener,
            window_after = %window.after,
            window_before = %window.before,
            observed = outcome.observed,
            duration_ms = elapsed.as_millis() as u64,
            "POLL_TICK"
        );
        return;
    }

    tracing::info!(
        listener = %listener,
        window_after = %window.after,
        window_before = %window.before,
        observed = outcome.observed,
        published = outcome.published,
        duration_ms = elapsed.as_millis() as u64,
        timestamp = %Utc::now().to_rfc3339(),
        "POLL_TICK"
    );
}

/// Log how a pending correlation settled
pub fn log_correlation_outcome(
    correlation_id: Uuid,
    chat_scope: &str,
    outcome: &str,
    record_identity: Option<&str>,
    waited: Duration,
) {
    tracing::info!(
        correlation_id = %correlation_id,
        chat_scope = %chat_scope,
        outcome = %outcome,
        record_identity = record_identity,
        waited_ms = waited.as_millis() as u64,
        timestamp = %Utc::now().to_rfc3339(),
        "CORRELATION_SETTLED"
    );
}
