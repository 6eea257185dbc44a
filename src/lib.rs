#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

//! # Relay Core
//!
//! Change detection and request correlation for a message store written by another process.
//!
//! ## Overview
//!
//! The foreign store offers no triggers, no change feed and no confirmation back to the
//! process that asked for a write. This crate substitutes for all three:
//!
//! - adaptive polling loops diff successive snapshots of the store and classify every
//!   record as new, updated or unchanged
//! - a correlation registry links fire-and-forget automation commands to the record the
//!   store eventually produces, or times them out
//! - classified, deduplicated events fan out to any number of subscribers
//!
//! Overlapping poll windows and concurrent listeners never produce the same event twice,
//! and every pending command settles exactly once.
//!
//! ## Module Organization
//!
//! - [`models`] - Record snapshots and chat-scope matching
//! - [`store`] - Foreign store interface and an in-memory implementation
//! - [`tracking`] - Snapshot diffing and emission deduplication
//! - [`polling`] - Poll scheduler and the incoming, outgoing and structural listeners
//! - [`correlation`] - Pending command registry and match predicates
//! - [`automation`] - Automation trigger interface and the message sender
//! - [`events`] - Event types and the broadcast bus
//! - [`bridge`] - Bootstrap wiring everything together
//! - [`config`] - Configuration loading
//! - [`error`] - Structured error handling
//!
//! ## Testing
//!
//! Timers run on the tokio clock and wall time comes from an injected [`clock::Clock`], so
//! every loop and deadline can be driven deterministically with
//! `#[tokio::test(start_paused = true)]` and a [`clock::ManualClock`].

pub mod automation;
pub mod bridge;
pub mod clock;
pub mod config;
pub mod constants;
pub mod correlation;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod polling;
pub mod store;
pub mod tracking;

pub use automation::{AutomationCommand, AutomationTrigger, MessageSender};
pub use bridge::{BridgeStats, RelayBridge};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BridgeConfig, ConfigManager};
pub use correlation::{CorrelationHandle, PendingRequestRegistry};
pub use error::{AutomationError, CorrelationError, RelayError, Result, StoreError};
pub use events::{BridgeEvent, EventBus, PublishedEvent};
pub use models::{Record, RecordKind};
pub use polling::{PollScheduler, RetrievalStrategy, SchedulerState};
pub use store::{InMemoryMessageStore, MessageStore, RecordQuery};
pub use tracking::{ChangeFilter, EventDedupCache, MessageStateTracker};
