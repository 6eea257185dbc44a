//! Proptest strategies for records and their lifecycle

#![allow(dead_code)]

use proptest::prelude::*;
use relay_core::clock::from_millis;
use relay_core::models::Record;

pub fn message_text_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9 ,.!?']{0,39}"
}

pub fn chat_scope_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Z]{3,8}-[0-9]{1,4}",
        "(iMessage|SMS);-;[A-Z]{3,8}-[0-9]{1,4}",
    ]
}

/// Optional lifecycle timestamp, always after creation
fn lifecycle_strategy(created_ms: i64) -> impl Strategy<Value = Option<i64>> {
    prop::option::of((1i64..60_000).prop_map(move |offset| created_ms + offset))
}

/// Self-authored sent message with arbitrary receipts
pub fn sent_record_strategy() -> impl Strategy<Value = Record> {
    (0i64..1_000_000).prop_flat_map(|created_ms| {
        (
            "[a-z0-9]{6}",
            message_text_strategy(),
            lifecycle_strategy(created_ms),
            lifecycle_strategy(created_ms),
            any::<bool>(),
        )
            .prop_map(move |(id, text, delivered, read, notified)| {
                let mut record = Record::message(id, "SCOPE-1", text, from_millis(created_ms))
                    .from_me(true)
                    .sent(true)
                    .notified(notified);
                record.delivered_at = delivered.map(from_millis);
                record.read_at = read.map(from_millis);
                record
            })
    })
}

/// Number of unsent observations before the writer commits
pub fn pending_ticks_strategy() -> impl Strategy<Value = usize> {
    1usize..6
}
