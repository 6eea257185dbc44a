//! Chat-scope identity helpers.
//!
//! The foreign store formats chat identities with a service prefix
//! (`iMessage;-;+15550100`, `SMS;+;chat1234`) while callers frequently pass the bare
//! address. Two scopes refer to the same chat when they are identical or when their
//! canonical suffixes (everything after the last `;`) are equal.

/// Strip any `service;style;` prefix, returning the bare chat address
pub fn canonical_scope(scope: &str) -> &str {
    scope.rsplit(';').next().unwrap_or(scope).trim()
}

pub fn scopes_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (a, b) = (canonical_scope(a), canonical_scope(b));
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}
