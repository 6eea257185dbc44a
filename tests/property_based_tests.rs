mod common;

use common::strategies::*;
use proptest::prelude::*;
use relay_core::clock::{from_millis, ManualClock};
use relay_core::correlation::{normalize_text, MatchPredicate};
use relay_core::events::{BridgeEvent, EventBus};
use relay_core::models::{scopes_match, Record};
use relay_core::polling::{next_delay, OutgoingClassifier, PollWindow, RetrievalStrategy};
use relay_core::store::InMemoryMessageStore;
use relay_core::tracking::{
    ChangeFilter, Classification, EventDedupCache, MessageStateTracker,
};
use relay_core::PendingRequestRegistry;
use std::sync::Arc;
use std::time::Duration;

fn change_filter() -> ChangeFilter {
    ChangeFilter::new(
        MessageStateTracker::new(Duration::from_secs(300)),
        EventDedupCache::new(10_000),
    )
}

proptest! {
    /// Property: replaying one observation through any number of overlapping windows emits once
    #[test]
    fn replayed_observation_emits_at_most_once(record in sent_record_strategy(), replays in 1usize..8) {
        let filter = change_filter();
        let now = record.created_at;
        let admitted = (0..replays)
            .filter(|_| filter.admit(&record, now).is_some())
            .count();
        prop_assert_eq!(admitted, 1);
    }

    /// Property: an identical snapshot after an update classifies as NoChange
    #[test]
    fn classification_is_monotonic(record in sent_record_strategy(), read_offset in 1i64..10_000) {
        let tracker = MessageStateTracker::new(Duration::from_secs(300));
        let now = record.created_at;
        let base = Record { read_at: None, ..record };
        let read_at = from_millis(base.created_at.timestamp_millis() + read_offset);
        let updated = base.clone().read(read_at);

        prop_assert_eq!(tracker.classify(&base, now), Classification::New);
        prop_assert_eq!(tracker.classify(&updated, now), Classification::Updated);
        prop_assert_eq!(tracker.classify(&updated, now), Classification::NoChange);
        // a stale re-read with the older state is not a regression event either
        prop_assert_eq!(tracker.classify(&base, now), Classification::NoChange);
    }

    /// Property: text fingerprints ignore case, whitespace and punctuation
    #[test]
    fn text_fingerprint_ignores_formatting(text in message_text_strategy()) {
        let shouted = format!("  {}!!", text.to_uppercase());
        prop_assert_eq!(normalize_text(&text), normalize_text(&shouted));
        prop_assert_eq!(normalize_text(&normalize_text(&text)), normalize_text(&text));
    }

    /// Property: scope matching is symmetric and tolerates the service prefix
    #[test]
    fn scope_matching_is_symmetric(a in chat_scope_strategy(), b in chat_scope_strategy()) {
        prop_assert_eq!(scopes_match(&a, &b), scopes_match(&b, &a));
        let bare = a.rsplit(';').next().unwrap_or(&a).to_string();
        prop_assert!(scopes_match(&a, &bare));
    }

    /// Property: a matching record created before the command was issued never matches
    #[test]
    fn records_before_issue_never_match(text in message_text_strategy(), issued in 1_000i64..100_000, early in 1i64..1_000) {
        let predicate = MatchPredicate::new("SCOPE-1", &text, false, from_millis(issued));
        let before = Record::message("m1", "SCOPE-1", text.clone(), from_millis(issued - early)).from_me(true);
        let after = Record::message("m2", "SCOPE-1", text, from_millis(issued)).from_me(true);
        prop_assert!(!predicate.matches(&before));
        prop_assert!(predicate.matches(&after));
    }

    /// Property: pacing never exceeds the interval and catches up immediately on overrun
    #[test]
    fn next_delay_is_bounded(interval_ms in 1u64..10_000, elapsed_ms in 0u64..20_000) {
        let interval = Duration::from_millis(interval_ms);
        let elapsed = Duration::from_millis(elapsed_ms);
        let delay = next_delay(interval, elapsed);
        prop_assert!(delay <= interval);
        if elapsed >= interval {
            prop_assert_eq!(delay, Duration::ZERO);
        } else {
            prop_assert_eq!(delay + elapsed, interval);
        }
    }

    /// Property: a record unsent for k ticks then sent yields exactly one entry event and
    /// leaves the pending set empty
    #[test]
    fn reconciliation_converges(pending_ticks in pending_ticks_strategy()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let clock = Arc::new(ManualClock::at_millis(1_000));
            let store = Arc::new(InMemoryMessageStore::new());
            let events = EventBus::new(64);
            let mut subscriber = events.subscribe();
            let classifier = OutgoingClassifier::new(
                store.clone(),
                Arc::new(change_filter()),
                events.clone(),
                PendingRequestRegistry::new(clock.clone(), events),
                clock.clone(),
                Duration::from_secs(15),
            );
            let unsent = Record::message("m1", "SCOPE-1", "Hello", from_millis(1_500)).from_me(true);
            store.upsert(unsent.clone());

            let mut cursor = 1_000;
            for tick in 0..pending_ticks + 3 {
                if tick == pending_ticks {
                    store.upsert(unsent.clone().sent(true));
                }
                let before = 2_000 + tick as i64 * 1_000;
                clock.set_millis(before);
                classifier
                    .retrieve(PollWindow::new(from_millis(cursor), from_millis(before)))
                    .await
                    .unwrap();
                cursor = before;
                if tick < pending_ticks {
                    assert_eq!(classifier.pending_identities(), vec!["m1".to_string()]);
                }
            }

            assert_eq!(classifier.pending_len(), 0);
            let mut entries = 0;
            while let Ok(published) = subscriber.try_recv() {
                if matches!(published.event, BridgeEvent::NewEntry(_) | BridgeEvent::UpdatedEntry(_)) {
                    entries += 1;
                }
            }
            assert_eq!(entries, 1);
        });
    }
}

#[test]
fn dedup_purge_only_above_bound() {
    let cache = EventDedupCache::new(3);
    for id in ["a", "b", "c"] {
        cache.add(relay_core::tracking::DedupKey::new(id, "d0"));
    }
    assert_eq!(cache.purge_if_over_bound(), None);
    cache.add(relay_core::tracking::DedupKey::new("d", "d0"));
    assert_eq!(cache.purge_if_over_bound(), Some(4));
}
