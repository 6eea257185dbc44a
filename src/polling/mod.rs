//! # Polling Listeners
//!
//! Three listeners watch the foreign store, each a [`PollScheduler`] over its own
//! [`RetrievalStrategy`]:
//!
//! - [`IncomingStrategy`]: messages authored by others
//! - [`OutgoingClassifier`]: self-authored messages, reconciled against pending commands
//! - [`StructuralStrategy`]: membership, naming and group icon changes

pub mod incoming;
pub mod outgoing;
pub mod scheduler;
pub mod structural;

pub use incoming::IncomingStrategy;
pub use outgoing::OutgoingClassifier;
pub use scheduler::{
    next_delay, PollScheduler, PollWindow, RetrievalStrategy, SchedulerState, SchedulerStats,
    TickOutcome,
};
pub use structural::StructuralStrategy;
