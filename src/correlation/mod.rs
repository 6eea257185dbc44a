//! # Request Correlation
//!
//! Links fire-and-forget automation commands to the foreign-store records they produce.

pub mod predicate;
pub mod registry;

pub use predicate::{normalize_text, split_transfer_name, Fingerprint, MatchPredicate};
pub use registry::{
    CorrelationHandle, PendingCorrelation, PendingRequestRegistry, RegistryStats, Settlement,
};
