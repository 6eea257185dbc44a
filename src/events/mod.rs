//! # Event System
//!
//! Classified, deduplicated events fan out to independent subscribers through [`EventBus`].

pub mod bus;
pub mod types;

pub use bus::{EventBus, PublishedEvent};
pub use types::{BridgeEvent, PollErrorEvent, SendErrorEvent, StructuralChangeEvent, TimeoutEvent};
