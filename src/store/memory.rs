use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::debug;

use super::{MessageStore, RecordQuery};
use crate::error::StoreError;
use crate::models::Record;

/// In-memory table of foreign records keyed by identity.
///
/// Rows are upserted the way the foreign writer mutates them in place, and transient
/// failures can be injected to exercise the polling loops' recovery path.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    rows: RwLock<HashMap<String, Record>>,
    failures_remaining: AtomicUsize,
    queries_served: AtomicU64,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a row by identity
    pub fn upsert(&self, record: Record) {
        debug!(identity = %record.identity, chat_scope = %record.chat_scope, "Upserting record");
        self.rows.write().insert(record.identity.clone(), record);
    }

    pub fn remove(&self, identity: &str) -> Option<Record> {
        self.rows.write().remove(identity)
    }

    pub fn get(&self, identity: &str) -> Option<Record> {
        self.rows.read().get(identity).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Make the next `count` queries fail with [`StoreError::Unavailable`]
    pub fn fail_next_queries(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Number of queries (successful or failed) served so far
    pub fn queries_served(&self) -> u64 {
        self.queries_served.load(Ordering::SeqCst)
    }

    fn begin_query(&self) -> Result<(), StoreError> {
        self.queries_served.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable(
                "injected transient failure".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn find(&self, query: &RecordQuery) -> Result<Vec<Record>, StoreError> {
        self.begin_query()?;
        let mut records: Vec<Record> = self
            .rows
            .read()
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.identity.cmp(&b.identity))
        });
        Ok(records)
    }

    async fn find_by_ids(&self, identities: &[String]) -> Result<Vec<Record>, StoreError> {
        self.begin_query()?;
        let rows = self.rows.read();
        let mut records: Vec<Record> = identities
            .iter()
            .filter_map(|identity| rows.get(identity).cloned())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }
}
