//! # Foreign Message Store Interface
//!
//! The foreign store is written by another process and is only ever read here. Concrete
//! adapters (the on-disk entity mapping layer) live outside this crate and implement
//! [`MessageStore`]; [`memory::InMemoryMessageStore`] is the in-process implementation used
//! by tests and by embedders that mirror the store themselves.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::{scopes_match, Record};

pub use memory::InMemoryMessageStore;

/// Read-mostly view over the foreign store, safe for concurrent use by every listener
#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug {
    /// Records matching `query`, ordered ascending by creation time
    async fn find(&self, query: &RecordQuery) -> Result<Vec<Record>, StoreError>;

    /// Records with the given identities, regardless of age; unknown identities are skipped
    async fn find_by_ids(&self, identities: &[String]) -> Result<Vec<Record>, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorshipFilter {
    #[default]
    Any,
    SelfAuthored,
    Others,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentStateFilter {
    #[default]
    Any,
    Sent,
    Unsent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindFilter {
    #[default]
    Messages,
    Structural,
    Any,
}

/// Windowed query over the foreign store
///
/// The window is half-open: a record created exactly at `after` is included, one created
/// exactly at `before` is not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordQuery {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub authorship: AuthorshipFilter,
    pub sent_state: SentStateFilter,
    pub chat_scope: Option<String>,
    pub kinds: KindFilter,
    /// Also match records whose delivered/read/edited/retracted timestamp falls in the window
    pub include_updated: bool,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window(mut self, after: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        self.after = Some(after);
        self.before = Some(before);
        self
    }

    pub fn authorship(mut self, authorship: AuthorshipFilter) -> Self {
        self.authorship = authorship;
        self
    }

    pub fn sent_state(mut self, sent_state: SentStateFilter) -> Self {
        self.sent_state = sent_state;
        self
    }

    pub fn chat_scope(mut self, chat_scope: impl Into<String>) -> Self {
        self.chat_scope = Some(chat_scope.into());
        self
    }

    pub fn kinds(mut self, kinds: KindFilter) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn include_updated(mut self, include_updated: bool) -> Self {
        self.include_updated = include_updated;
        self
    }

    fn in_window(&self, at: DateTime<Utc>) -> bool {
        self.after.map_or(true, |after| at >= after) && self.before.map_or(true, |before| at < before)
    }

    /// Whether `record` satisfies every predicate of this query
    pub fn matches(&self, record: &Record) -> bool {
        let authored = match self.authorship {
            AuthorshipFilter::Any => true,
            AuthorshipFilter::SelfAuthored => record.is_from_me,
            AuthorshipFilter::Others => !record.is_from_me,
        };
        let sent = match self.sent_state {
            SentStateFilter::Any => true,
            SentStateFilter::Sent => record.is_sent,
            SentStateFilter::Unsent => !record.is_sent,
        };
        let kind = match self.kinds {
            KindFilter::Any => true,
            KindFilter::Messages => !record.kind.is_structural(),
            KindFilter::Structural => record.kind.is_structural(),
        };
        let scope = self
            .chat_scope
            .as_deref()
            .map_or(true, |scope| scopes_match(scope, &record.chat_scope));

        let timed = self.in_window(record.created_at)
            || (self.include_updated
                && [
                    record.delivered_at,
                    record.read_at,
                    record.edited_at,
                    record.retracted_at,
                ]
                .into_iter()
                .flatten()
                .any(|at| self.in_window(at)));

        authored && sent && kind && scope && timed
    }
}
