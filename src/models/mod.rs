//! # Foreign Store Projections
//!
//! The foreign store's chat, handle and message tables form a many-to-many graph. The relay
//! never materializes that graph: every row is observed as an immutable [`Record`] whose
//! cross-references (chat scope, handle) are plain identities resolved by lookup.

pub mod chat_scope;
pub mod record;

pub use chat_scope::{canonical_scope, scopes_match};
pub use record::{AttachmentRef, Record, RecordKind};
