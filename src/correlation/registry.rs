//! # Pending Request Registry
//!
//! Fire-and-forget automation commands are linked to the record they eventually produce.
//! Each registered command becomes a [`PendingCorrelation`] that settles exactly once, by
//! whichever of these observes it unsettled first:
//!
//! - **match**: a New/Updated record satisfying its [`MatchPredicate`]
//! - **error**: an errored record with the same scope and fingerprint, created no earlier
//!   than the command was issued
//! - **timeout**: its own deadline timer, measured from the issue time
//!
//! Settlement is a compare-and-set on a single flag, so a timer firing while a poll tick
//! resolves the same entry produces one outcome and one no-op.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use super::MatchPredicate;
use crate::clock::Clock;
use crate::error::CorrelationError;
use crate::events::{BridgeEvent, EventBus, TimeoutEvent};
use crate::logging::log_correlation_outcome;
use crate::models::Record;

pub type Settlement = Result<Record, CorrelationError>;

/// One issued command waiting for its record
#[derive(Debug)]
pub struct PendingCorrelation {
    id: Uuid,
    predicate: MatchPredicate,
    created_at: DateTime<Utc>,
    deadline: Duration,
    settled: AtomicBool,
    continuation: Mutex<Option<oneshot::Sender<Settlement>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl PendingCorrelation {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn predicate(&self) -> &MatchPredicate {
        &self.predicate
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn is_attachment(&self) -> bool {
        self.predicate.fingerprint.is_attachment()
    }

    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }

    /// Deliver `outcome` if nobody settled this entry yet; `false` means another path won
    fn try_settle(&self, outcome: Settlement) -> bool {
        if self
            .settled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        if let Some(continuation) = self.continuation.lock().take() {
            // the caller may have dropped its handle, which is fine
            let _ = continuation.send(outcome);
        }
        true
    }

    fn cancel_timer(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
    }
}

/// Caller side of a correlation; resolves to the confirmed record or a typed failure
#[derive(Debug)]
pub struct CorrelationHandle {
    id: Uuid,
    receiver: oneshot::Receiver<Settlement>,
}

impl CorrelationHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Future for CorrelationHandle {
    type Output = Settlement;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(settlement)) => Poll::Ready(settlement),
            Poll::Ready(Err(_)) => Poll::Ready(Err(CorrelationError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Counters exposed for observation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub pending: usize,
    pub registered: u64,
    pub resolved: u64,
    pub rejected: u64,
    pub timed_out: u64,
}

#[derive(Debug, Default)]
struct Counters {
    registered: AtomicU64,
    resolved: AtomicU64,
    rejected: AtomicU64,
    timed_out: AtomicU64,
}

#[derive(Debug)]
struct RegistryInner {
    // insertion order, so the oldest matching command wins
    entries: Mutex<Vec<Arc<PendingCorrelation>>>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    counters: Counters,
}

/// Process-local registry of in-flight commands
#[derive(Debug, Clone)]
pub struct PendingRequestRegistry {
    inner: Arc<RegistryInner>,
}

impl PendingRequestRegistry {
    pub fn new(clock: Arc<dyn Clock>, events: EventBus) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                entries: Mutex::new(Vec::new()),
                clock,
                events,
                counters: Counters::default(),
            }),
        }
    }

    /// Register a command issued now. Must be called within a tokio runtime, which drives
    /// the deadline timer.
    pub fn register(
        &self,
        chat_scope: impl Into<String>,
        content: &str,
        is_attachment: bool,
        deadline: Duration,
    ) -> CorrelationHandle {
        let now = self.inner.clock.now();
        self.register_since(chat_scope, content, is_attachment, deadline, now)
    }

    /// Register a command whose result cannot have been created before `created_at`
    pub fn register_since(
        &self,
        chat_scope: impl Into<String>,
        content: &str,
        is_attachment: bool,
        deadline: Duration,
        created_at: DateTime<Utc>,
    ) -> CorrelationHandle {
        let id = Uuid::new_v4();
        let (sender, receiver) = oneshot::channel();
        let entry = Arc::new(PendingCorrelation {
            id,
            predicate: MatchPredicate::new(chat_scope, content, is_attachment, created_at),
            created_at,
            deadline,
            settled: AtomicBool::new(false),
            continuation: Mutex::new(Some(sender)),
            timer: Mutex::new(None),
        });

        self.inner.entries.lock().push(Arc::clone(&entry));
        self.inner.counters.registered.fetch_add(1, Ordering::Relaxed);

        // the deadline counts from the issue time, not from the trigger's acknowledgement
        let remaining = deadline.saturating_sub(self.waited(&entry));
        let registry = self.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            registry.expire(id);
        });
        // an entry settled before its timer was stored only leaves a no-op timer behind
        if entry.is_settled() {
            timer.abort();
        } else {
            *entry.timer.lock() = Some(timer);
        }

        debug!(
            correlation_id = %id,
            chat_scope = %entry.predicate.chat_scope,
            is_attachment = is_attachment,
            deadline_ms = deadline.as_millis() as u64,
            remaining_ms = remaining.as_millis() as u64,
            "Registered pending correlation"
        );

        CorrelationHandle { id, receiver }
    }

    fn snapshot(&self) -> Vec<Arc<PendingCorrelation>> {
        self.inner.entries.lock().clone()
    }

    fn remove(&self, id: Uuid) {
        self.inner.entries.lock().retain(|entry| entry.id != id);
    }

    fn find(&self, id: Uuid) -> Option<Arc<PendingCorrelation>> {
        self.inner
            .entries
            .lock()
            .iter()
            .find(|entry| entry.id == id)
            .cloned()
    }

    fn waited(&self, entry: &PendingCorrelation) -> Duration {
        self.inner
            .clock
            .now()
            .signed_duration_since(entry.created_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Offer a New/Updated record; resolves the first unsettled entry it matches
    pub fn offer(&self, record: &Record) -> Option<Uuid> {
        for entry in self.snapshot() {
            if entry.is_settled() || !entry.predicate.matches(record) {
                continue;
            }
            if entry.try_settle(Ok(record.clone())) {
                entry.cancel_timer();
                self.remove(entry.id);
                self.inner.counters.resolved.fetch_add(1, Ordering::Relaxed);
                log_correlation_outcome(
                    entry.id,
                    &entry.predicate.chat_scope,
                    "resolved",
                    Some(record.identity.as_str()),
                    self.waited(&entry),
                );
                return Some(entry.id);
            }
        }
        None
    }

    /// Route an errored record; rejects the first unsettled entry it matches using the
    /// foreign error code. A failure left over from an earlier send never rejects a retry.
    pub fn reject_errored(&self, record: &Record) -> Option<Uuid> {
        for entry in self.snapshot() {
            if entry.is_settled() || !entry.predicate.matches(record) {
                continue;
            }
            let failure = CorrelationError::SendFailed {
                error_code: record.error_code,
            };
            if entry.try_settle(Err(failure)) {
                entry.cancel_timer();
                self.remove(entry.id);
                self.inner.counters.rejected.fetch_add(1, Ordering::Relaxed);
                log_correlation_outcome(
                    entry.id,
                    &entry.predicate.chat_scope,
                    "send-error",
                    Some(record.identity.as_str()),
                    self.waited(&entry),
                );
                return Some(entry.id);
            }
        }
        None
    }

    /// Deadline path; a no-op when the entry already settled
    pub fn expire(&self, id: Uuid) -> bool {
        let Some(entry) = self.find(id) else {
            return false;
        };
        let deadline = entry.deadline;
        if !entry.try_settle(Err(CorrelationError::Timeout { deadline })) {
            return false;
        }

        self.remove(id);
        self.inner.counters.timed_out.fetch_add(1, Ordering::Relaxed);
        let waited = self.waited(&entry);
        log_correlation_outcome(id, &entry.predicate.chat_scope, "timeout", None, waited);
        info!(
            correlation_id = %id,
            chat_scope = %entry.predicate.chat_scope,
            deadline_ms = deadline.as_millis() as u64,
            "Correlation timed out without a matching record"
        );

        self.inner
            .events
            .publish(BridgeEvent::MessageTimeout(TimeoutEvent {
                correlation_id: id,
                chat_scope: entry.predicate.chat_scope.clone(),
                is_attachment: entry.is_attachment(),
                waited_ms: waited.as_millis() as u64,
            }));
        true
    }

    pub fn is_pending(&self, id: Uuid) -> bool {
        self.find(id).is_some_and(|entry| !entry.is_settled())
    }

    pub fn pending_count(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn stats(&self) -> RegistryStats {
        let counters = &self.inner.counters;
        RegistryStats {
            pending: self.pending_count(),
            registered: counters.registered.load(Ordering::Relaxed),
            resolved: counters.resolved.load(Ordering::Relaxed),
            rejected: counters.rejected.load(Ordering::Relaxed),
            timed_out: counters.timed_out.load(Ordering::Relaxed),
        }
    }
}
