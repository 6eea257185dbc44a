//! Running polling loops against the in-memory store under paused tokio time

mod common;

use common::*;
use relay_core::config::BridgeConfig;
use relay_core::error::{AutomationError, CorrelationError, RelayError};
use relay_core::polling::SchedulerState;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn loops_publish_incoming_outgoing_and_structural_events() {
    let harness = BridgeHarness::new(10_000);
    let mut events = harness.bridge.subscribe();
    harness.bridge.start();

    let handle = harness
        .bridge
        .sender()
        .send_text("iMessage;-;SCOPE-1", "See you soon!")
        .await
        .unwrap();

    // the foreign writer commits the outgoing row unsent first
    harness.clock.set_millis(11_000);
    harness
        .store
        .upsert(outgoing_unsent("out1", "SCOPE-1", "see you soon", 10_200));
    harness
        .store
        .upsert(incoming("in1", "SCOPE-1", "Great", 10_500));
    harness
        .store
        .upsert(participant_added("s1", "SCOPE-1", "+15550123", 10_700));
    tokio::time::sleep(Duration::from_millis(1_000)).await;

    harness.clock.set_millis(12_000);
    harness
        .store
        .upsert(outgoing_sent("out1", "SCOPE-1", "see you soon", 10_200));
    tokio::time::sleep(Duration::from_millis(1_000)).await;

    let confirmed = handle.await.unwrap();
    assert_eq!(confirmed.identity, "out1");

    harness.clock.set_millis(13_000);
    tokio::time::sleep(Duration::from_millis(3_000)).await;
    harness.bridge.stop().await;

    let published = drain_events(&mut events);
    let mut names = event_names(&published);
    names.sort_unstable();
    assert_eq!(names, vec!["new-entry", "new-entry", "participant-added"]);

    let stats = harness.bridge.stats();
    assert_eq!(stats.pending_correlations, 0);
    assert_eq!(stats.pending_identities, 0);
    assert!(stats
        .listeners
        .iter()
        .all(|listener| listener.state == SchedulerState::Stopped && listener.ticks >= 3));
}

#[tokio::test(start_paused = true)]
async fn transient_store_failures_surface_as_poll_errors() {
    let harness = BridgeHarness::new(10_000);
    let mut events = harness.bridge.subscribe();
    harness.store.fail_next_queries(2);

    harness.bridge.start();
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    harness.bridge.stop().await;

    let published = drain_events(&mut events);
    assert_eq!(
        event_names(&published),
        vec!["poll-error", "poll-error"]
    );

    let stats = harness.bridge.stats();
    let failures: u64 = stats.listeners.iter().map(|listener| listener.failures).sum();
    assert_eq!(failures, 2);
    assert!(stats.listeners.iter().all(|listener| listener.ticks >= 4));
}

#[tokio::test(start_paused = true)]
async fn send_text_and_wait_resolves_once_writer_commits() {
    let harness = BridgeHarness::new(10_000);
    harness.bridge.start();

    let store = harness.store.clone();
    let clock = harness.clock.clone();
    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        clock.set_millis(12_500);
        store.upsert(outgoing_sent("out1", "SCOPE-1", "Running late", 11_000));
    });

    let record = harness
        .bridge
        .sender()
        .send_text_and_wait("SCOPE-1", "Running late")
        .await
        .unwrap();
    writer.await.unwrap();
    harness.bridge.stop().await;

    assert_eq!(record.identity, "out1");
    assert_eq!(harness.trigger.issued().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stopping_listeners_leaves_correlations_to_their_deadlines() {
    let harness = BridgeHarness::new(10_000);
    harness.bridge.start();
    let handle = harness
        .bridge
        .sender()
        .send_text("SCOPE-1", "Hello")
        .await
        .unwrap();

    harness.bridge.stop().await;
    assert_eq!(harness.bridge.stats().pending_correlations, 1);

    assert!(matches!(
        handle.await,
        Err(CorrelationError::Timeout { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn trigger_failure_is_reported_immediately() {
    let harness = BridgeHarness::new(10_000);
    harness
        .trigger
        .fail_with(AutomationError::ExecutionFailed("Messages is not running".to_string()));

    let result = harness.bridge.sender().send_text("SCOPE-1", "Hello").await;

    assert!(matches!(
        result,
        Err(RelayError::Automation(AutomationError::ExecutionFailed(_)))
    ));
    assert_eq!(harness.bridge.stats().pending_correlations, 0);
}

#[tokio::test(start_paused = true)]
async fn disabled_listener_never_polls() {
    let mut config = BridgeConfig::default();
    config.polling.structural.enabled = false;
    let harness = BridgeHarness::with_config(10_000, config);
    let mut events = harness.bridge.subscribe();
    harness
        .store
        .upsert(participant_added("s1", "SCOPE-1", "+15550123", 9_500));

    harness.bridge.start();
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    harness.bridge.stop().await;

    assert!(drain_events(&mut events).is_empty());
    assert_eq!(harness.bridge.structural().stats().ticks, 0);
}

#[tokio::test(start_paused = true)]
async fn manual_ticks_cover_each_listener() {
    let harness = BridgeHarness::new(10_000);
    let mut events = harness.bridge.subscribe();
    harness.store.upsert(incoming("in1", "SCOPE-1", "Hi", 10_100));
    harness
        .store
        .upsert(participant_added("s1", "SCOPE-1", "+15550123", 10_200));

    harness.tick_incoming_at(11_000).await;
    harness.tick_structural_at(11_000).await;
    harness.tick_incoming_at(12_000).await;
    harness.tick_structural_at(12_000).await;

    let published = drain_events(&mut events);
    assert_eq!(event_names(&published), vec!["new-entry", "participant-added"]);
    assert_eq!(harness.bridge.incoming().cursor(), at(12_000));
}
