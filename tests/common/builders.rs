//! Record builders shared by the integration tests

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use relay_core::clock::from_millis;
use relay_core::models::{Record, RecordKind};

pub fn at(millis: i64) -> DateTime<Utc> {
    from_millis(millis)
}

/// Self-authored message the foreign writer has not committed yet
pub fn outgoing_unsent(id: &str, chat_scope: &str, text: &str, created_ms: i64) -> Record {
    Record::message(id, chat_scope, text, at(created_ms)).from_me(true)
}

/// Self-authored message the foreign writer committed
pub fn outgoing_sent(id: &str, chat_scope: &str, text: &str, created_ms: i64) -> Record {
    outgoing_unsent(id, chat_scope, text, created_ms).sent(true)
}

pub fn outgoing_attachment(id: &str, chat_scope: &str, transfer_name: &str, created_ms: i64) -> Record {
    Record::message(id, chat_scope, "\u{FFFC}", at(created_ms))
        .from_me(true)
        .sent(true)
        .with_attachment(transfer_name)
}

pub fn incoming(id: &str, chat_scope: &str, text: &str, created_ms: i64) -> Record {
    Record::message(id, chat_scope, text, at(created_ms))
        .sent(true)
        .with_handle("+15550100")
}

pub fn participant_added(id: &str, chat_scope: &str, participant: &str, created_ms: i64) -> Record {
    Record::structural(
        id,
        chat_scope,
        RecordKind::ParticipantAdded {
            participant: participant.to_string(),
        },
        at(created_ms),
    )
    .with_handle("+15550100")
}
