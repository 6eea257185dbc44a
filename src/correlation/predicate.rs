//! Content fingerprints and the predicate deciding whether a record answers a pending command.
//!
//! The automation command returns no identifier, so a command is linked to the record it
//! produced purely by content: the chat scope, a normalized text fingerprint (case,
//! whitespace and punctuation are ignored because the foreign writer rewrites them), or for
//! attachments the expected transfer filename.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{TRANSCODE_SUBSTITUTIONS, WILDCARD_TRANSCODE_TARGETS};
use crate::models::{scopes_match, Record};

/// Unicode punctuation the foreign writer may insert or rewrite (smart quotes, dashes,
/// ellipses, CJK and fullwidth marks), on top of ASCII punctuation.
fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '\u{00A1}' | '\u{00A7}' | '\u{00AB}' | '\u{00B6}' | '\u{00B7}' | '\u{00BB}'
                | '\u{00BF}'
                | '\u{2010}'..='\u{2027}'
                | '\u{2030}'..='\u{205E}'
                | '\u{2E00}'..='\u{2E7F}'
                | '\u{3001}'..='\u{3003}'
                | '\u{3008}'..='\u{3011}'
                | '\u{3014}'..='\u{301F}'
                | '\u{FF01}'..='\u{FF0F}'
                | '\u{FF1A}'..='\u{FF20}'
                | '\u{FF3B}'..='\u{FF40}'
                | '\u{FF5B}'..='\u{FF65}'
        )
}

/// Lowercase the text, dropping whitespace and punctuation. Symbols and emoji are kept.
pub fn normalize_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && !is_punctuation(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Split a transfer filename into a lowercased `(stem, extension)`, dropping any directory
pub fn split_transfer_name(name: &str) -> (String, String) {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => {
            (stem.to_lowercase(), extension.to_lowercase())
        }
        _ => (file_name.to_lowercase(), String::new()),
    }
}

fn extension_accepted(expected: &str, observed: &str) -> bool {
    expected == observed
        || WILDCARD_TRANSCODE_TARGETS.contains(&observed)
        || TRANSCODE_SUBSTITUTIONS
            .iter()
            .any(|(sent, stored)| *sent == expected && *stored == observed)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fingerprint {
    Text { normalized: String },
    Attachment { stem: String, extension: String },
}

impl Fingerprint {
    pub fn text(content: &str) -> Self {
        Fingerprint::Text {
            normalized: normalize_text(content),
        }
    }

    pub fn attachment(transfer_name: &str) -> Self {
        let (stem, extension) = split_transfer_name(transfer_name);
        Fingerprint::Attachment { stem, extension }
    }

    pub fn is_attachment(&self) -> bool {
        matches!(self, Fingerprint::Attachment { .. })
    }

    /// Whether the record's content carries this fingerprint
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            // nothing left to compare, so nothing can confirm it
            Fingerprint::Text { normalized } if normalized.is_empty() => false,
            Fingerprint::Text { normalized } => record
                .text
                .as_deref()
                .is_some_and(|text| normalize_text(text) == *normalized),
            Fingerprint::Attachment { stem, extension } => {
                record.attachments.iter().any(|attachment| {
                    let (observed_stem, observed_extension) =
                        split_transfer_name(&attachment.transfer_name);
                    observed_stem == *stem && extension_accepted(extension, &observed_extension)
                })
            }
        }
    }
}

/// Everything needed to decide whether a record settles one pending command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPredicate {
    pub chat_scope: String,
    pub fingerprint: Fingerprint,
    /// Records created before the command was issued can never be its result
    pub not_before: DateTime<Utc>,
}

impl MatchPredicate {
    pub fn new(
        chat_scope: impl Into<String>,
        content: &str,
        is_attachment: bool,
        not_before: DateTime<Utc>,
    ) -> Self {
        let fingerprint = if is_attachment {
            Fingerprint::attachment(content)
        } else {
            Fingerprint::text(content)
        };
        Self {
            chat_scope: chat_scope.into(),
            fingerprint,
            not_before,
        }
    }

    /// Full match used for records classified New/Updated
    pub fn matches(&self, record: &Record) -> bool {
        record.created_at >= self.not_before && self.matches_content(record)
    }

    /// Scope and fingerprint only, ignoring creation time
    pub fn matches_content(&self, record: &Record) -> bool {
        scopes_match(&self.chat_scope, &record.chat_scope) && self.fingerprint.matches(record)
    }
}
