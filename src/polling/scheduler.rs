//! # Adaptive Poll Scheduler
//!
//! One [`PollScheduler`] drives one listener. Each tick queries the half-open window
//! `[cursor, before)` through a [`RetrievalStrategy`], advances the cursor only on success,
//! and then sleeps for whatever is left of the interval. A tick that overruns the interval
//! is followed immediately by the next one, so a slow store makes the loop run back-to-back
//! instead of drifting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::{to_chrono, Clock};
use crate::error::StoreError;
use crate::events::{BridgeEvent, EventBus, PollErrorEvent};
use crate::logging::log_poll_tick;
use crate::tracking::ChangeFilter;

/// Lifecycle of a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SchedulerState {
    Stopped = 0,
    Ticking = 1,
    AwaitingDelay = 2,
}

impl From<u8> for SchedulerState {
    fn from(value: u8) -> Self {
        match value {
            1 => SchedulerState::Ticking,
            2 => SchedulerState::AwaitingDelay,
            _ => SchedulerState::Stopped,
        }
    }
}

/// Window handed to a strategy on each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollWindow {
    /// Cursor at the start of the tick
    pub after: DateTime<Utc>,
    /// Wall time captured at the start of the tick
    pub before: DateTime<Utc>,
}

impl PollWindow {
    pub fn new(after: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        Self { after, before }
    }

    /// Lower bound pushed back by `margin`, covering records committed late by the writer
    pub fn lookback(&self, margin: Duration) -> DateTime<Utc> {
        self.after
            .checked_sub_signed(to_chrono(margin))
            .unwrap_or(self.after)
    }
}

/// What one successful retrieval did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickOutcome {
    /// Rows returned by the store
    pub observed: usize,
    /// Events published on the bus
    pub published: usize,
}

/// Per-listener retrieval and classification logic
#[async_trait]
pub trait RetrievalStrategy: Send + Sync + fmt::Debug + 'static {
    /// Listener name used in logs and poll-error events
    fn name(&self) -> &'static str;

    /// Query the store for `window`, classify and publish. An `Err` leaves the cursor in place.
    async fn retrieve(&self, window: PollWindow) -> Result<TickOutcome, StoreError>;
}

#[async_trait]
impl<S: RetrievalStrategy> RetrievalStrategy for Arc<S> {
    fn name(&self) -> &'static str {
        self.as_ref().name()
    }

    async fn retrieve(&self, window: PollWindow) -> Result<TickOutcome, StoreError> {
        self.as_ref().retrieve(window).await
    }
}

/// Delay before the next tick; zero when the last tick used up the whole interval
pub fn next_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub listener: String,
    pub state: SchedulerState,
    pub cursor: DateTime<Utc>,
    pub ticks: u64,
    pub failures: u64,
    pub last_error: Option<String>,
}

struct SchedulerInner<S> {
    scheduler_id: Uuid,
    strategy: S,
    interval: Duration,
    filter: Arc<ChangeFilter>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    cursor: Mutex<DateTime<Utc>>,
    state: AtomicU8,
    running: AtomicBool,
    ticks: AtomicU64,
    failures: AtomicU64,
    last_error: Mutex<Option<String>>,
    // keeps manual ticks and the loop from overlapping
    tick_lock: tokio::sync::Mutex<()>,
}

impl<S: RetrievalStrategy> SchedulerInner<S> {
    fn set_state(&self, state: SchedulerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    async fn tick(&self) -> Result<TickOutcome, StoreError> {
        let _serial = self.tick_lock.lock().await;
        self.set_state(SchedulerState::Ticking);

        let after = *self.cursor.lock();
        // a wall clock stepping backwards must not produce an inverted window
        let before = self.clock.now().max(after);
        let window = PollWindow::new(after, before);
        let started = Instant::now();

        let result = self.strategy.retrieve(window).await;
        match &result {
            Ok(outcome) => {
                {
                    let mut cursor = self.cursor.lock();
                    if window.before > *cursor {
                        *cursor = window.before;
                    }
                }
                self.ticks.fetch_add(1, Ordering::Relaxed);
                log_poll_tick(self.strategy.name(), &window, outcome, started.elapsed());
            }
            Err(store_error) => {
                self.ticks.fetch_add(1, Ordering::Relaxed);
                self.failures.fetch_add(1, Ordering::Relaxed);
                *self.last_error.lock() = Some(store_error.to_string());
                warn!(
                    scheduler_id = %self.scheduler_id,
                    listener = self.strategy.name(),
                    error = %store_error,
                    window_after = %window.after,
                    "Retrieval failed, cursor left in place"
                );
                self.events.publish(BridgeEvent::PollError(PollErrorEvent {
                    listener: self.strategy.name().to_string(),
                    error: store_error.to_string(),
                    window_after: window.after,
                    window_before: window.before,
                }));
            }
        }

        let maintenance = self.filter.maintain(self.clock.now());
        if maintenance.dedup_purged.is_some() || maintenance.snapshots_evicted > 0 {
            debug!(
                listener = self.strategy.name(),
                dedup_purged = ?maintenance.dedup_purged,
                snapshots_evicted = maintenance.snapshots_evicted,
                "Tracking caches maintained"
            );
        }

        self.set_state(if self.running.load(Ordering::Acquire) {
            SchedulerState::AwaitingDelay
        } else {
            SchedulerState::Stopped
        });
        result
    }

    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            scheduler_id = %self.scheduler_id,
            listener = self.strategy.name(),
            interval_ms = self.interval.as_millis() as u64,
            "Starting polling loop"
        );

        while !*shutdown.borrow() {
            let started = Instant::now();
            // failures are recorded and published inside tick
            let _ = self.tick().await;

            if *shutdown.borrow() {
                break;
            }
            let delay = next_delay(self.interval, started.elapsed());
            if delay.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.set_state(SchedulerState::Stopped);
        info!(
            scheduler_id = %self.scheduler_id,
            listener = self.strategy.name(),
            "Polling loop stopped"
        );
    }
}

/// Generic polling loop over a retrieval strategy
pub struct PollScheduler<S: RetrievalStrategy> {
    inner: Arc<SchedulerInner<S>>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S: RetrievalStrategy> fmt::Debug for PollScheduler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollScheduler")
            .field("scheduler_id", &self.inner.scheduler_id)
            .field("listener", &self.inner.strategy.name())
            .field("interval", &self.inner.interval)
            .field("state", &self.state())
            .finish()
    }
}

impl<S: RetrievalStrategy> PollScheduler<S> {
    /// New scheduler whose cursor starts at the clock's current time
    pub fn new(
        strategy: S,
        interval: Duration,
        filter: Arc<ChangeFilter>,
        events: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cursor = clock.now();
        let (shutdown, _) = watch::channel(true);
        Self {
            inner: Arc::new(SchedulerInner {
                scheduler_id: Uuid::new_v4(),
                strategy,
                interval,
                filter,
                events,
                clock,
                cursor: Mutex::new(cursor),
                state: AtomicU8::new(SchedulerState::Stopped as u8),
                running: AtomicBool::new(false),
                ticks: AtomicU64::new(0),
                failures: AtomicU64::new(0),
                last_error: Mutex::new(None),
                tick_lock: tokio::sync::Mutex::new(()),
            }),
            shutdown,
            worker: Mutex::new(None),
        }
    }

    /// Start from an explicit cursor instead of "now"
    pub fn with_cursor(self, cursor: DateTime<Utc>) -> Self {
        *self.inner.cursor.lock() = cursor;
        self
    }

    /// Begin ticking on a background task. Must be called within a tokio runtime.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            warn!(
                scheduler_id = %self.inner.scheduler_id,
                listener = self.inner.strategy.name(),
                "Poll scheduler already running"
            );
            return;
        }

        self.shutdown.send_replace(false);
        self.inner.running.store(true, Ordering::Release);
        let inner = Arc::clone(&self.inner);
        *worker = Some(tokio::spawn(inner.run(self.shutdown.subscribe())));
    }

    /// Halt future ticks; an in-flight tick runs to completion first. Idempotent.
    pub async fn stop(&self) {
        let worker = self.worker.lock().take();
        let Some(worker) = worker else {
            return;
        };

        self.inner.running.store(false, Ordering::Release);
        self.shutdown.send_replace(true);
        if let Err(join_error) = worker.await {
            error!(
                scheduler_id = %self.inner.scheduler_id,
                listener = self.inner.strategy.name(),
                error = %join_error,
                "Polling loop terminated abnormally"
            );
        }
        self.inner.set_state(SchedulerState::Stopped);
    }

    /// Run exactly one tick, whether or not the loop is running
    pub async fn tick_once(&self) -> Result<TickOutcome, StoreError> {
        self.inner.tick().await
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState::from(self.inner.state.load(Ordering::Acquire))
    }

    pub fn cursor(&self) -> DateTime<Utc> {
        *self.inner.cursor.lock()
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn strategy(&self) -> &S {
        &self.inner.strategy
    }

    pub fn scheduler_id(&self) -> Uuid {
        self.inner.scheduler_id
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            listener: self.inner.strategy.name().to_string(),
            state: self.state(),
            cursor: self.cursor(),
            ticks: self.inner.ticks.load(Ordering::Relaxed),
            failures: self.inner.failures.load(Ordering::Relaxed),
            last_error: self.inner.last_error.lock().clone(),
        }
    }
}

impl<S: RetrievalStrategy> Drop for PollScheduler<S> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.abort();
        }
    }
}
