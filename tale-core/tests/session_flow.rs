//! Session lifecycle tests: start, choose, complete, hook dispatch,
//! the concurrency guard, and cancellation.

use std::sync::Arc;
use std::time::Duration;
use tale_core::testing::{assert_awaiting_choice, assert_history_len, TestHarness};
use tale_core::{
    Choice, FailoverRouter, ProviderAdapter, ProviderError, RecordingHooks, ScriptedProvider,
    SessionCoordinator, SessionError, SessionHooks, SessionState,
};

#[tokio::test]
async fn test_success_path_appends_exactly_one_beat() {
    let harness = TestHarness::new();
    harness.expect_narrative("It was dark. (Y/N)");
    harness.start();

    let beat = harness.coordinator.choose(Choice::Yes).await.unwrap();

    assert_eq!(beat.choice, Choice::Yes);
    assert_eq!(beat.narrative, "It was dark. (Y/N)");
    assert_awaiting_choice(&harness.coordinator);
    assert_history_len(&harness.coordinator, 1);
}

#[tokio::test]
async fn test_session_loop_accumulates_history() {
    let harness = TestHarness::new();
    harness
        .expect_narrative("You enter the hall. (Y/N)")
        .expect_narrative("The torch gutters. (Y/N)")
        .expect_narrative("A door opens. (Y/N)");
    harness.start();

    harness.coordinator.choose(Choice::Yes).await.unwrap();
    harness.coordinator.choose(Choice::No).await.unwrap();
    harness.coordinator.choose(Choice::Yes).await.unwrap();

    assert_history_len(&harness.coordinator, 3);
    let context = harness.coordinator.context().unwrap();
    let choices: Vec<_> = context.history().iter().map(|b| b.choice).collect();
    assert_eq!(choices, vec![Choice::Yes, Choice::No, Choice::Yes]);
}

#[tokio::test]
async fn test_hooks_fire_exactly_once_per_successful_choose() {
    let harness = TestHarness::new();
    harness
        .expect_narrative("First. (Y/N)")
        .expect_narrative("Second. (Y/N)");
    harness.start();

    harness.coordinator.choose(Choice::Yes).await.unwrap();
    harness.coordinator.choose(Choice::No).await.unwrap();

    assert_eq!(harness.hooks.update_count(), 2);
    assert_eq!(harness.hooks.attempt_batch_count(), 2);

    // Each update snapshot reflects the history at that point.
    let updates = harness.hooks.updates();
    assert_eq!(updates[0].len(), 1);
    assert_eq!(updates[1].len(), 2);
}

#[tokio::test]
async fn test_failed_choose_fires_attempts_but_not_update() {
    let harness = TestHarness::new();
    harness.expect_failure(ProviderError::unknown("backend down"));
    harness.start();

    let error = harness.coordinator.choose(Choice::Yes).await.unwrap_err();

    assert!(matches!(error, SessionError::Generation(_)));
    assert_eq!(harness.hooks.update_count(), 0);
    assert_eq!(harness.hooks.attempt_batch_count(), 1);
    assert_eq!(harness.hooks.attempt_batches()[0].len(), 1);
    assert_history_len(&harness.coordinator, 0);
}

#[tokio::test]
async fn test_second_choose_while_generating_fails_fast() {
    let provider = Arc::new(
        ScriptedProvider::new("slow", 1).with_delay(Duration::from_millis(500)),
    );
    provider.respond_with("Eventually. (Y/N)");

    let hooks = Arc::new(RecordingHooks::new());
    let coordinator = Arc::new(
        SessionCoordinator::new(FailoverRouter::new(vec![
            provider.clone() as Arc<dyn ProviderAdapter>
        ]))
        .with_hooks(hooks.clone() as Arc<dyn SessionHooks>),
    );
    coordinator.start("slow-burn").unwrap();

    let first = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.choose(Choice::Yes).await })
    };

    // Let the first call reach the provider.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(coordinator.state(), SessionState::Generating);

    let error = coordinator.choose(Choice::No).await.unwrap_err();
    assert!(matches!(
        error,
        SessionError::InvalidState {
            state: SessionState::Generating,
            ..
        }
    ));

    // The rejected call never started a second attempt.
    assert_eq!(provider.calls(), 1);

    let beat = first.await.unwrap().unwrap();
    assert_eq!(beat.narrative, "Eventually. (Y/N)");
    assert_history_len(&coordinator, 1);
    assert_eq!(hooks.update_count(), 1);
}

#[tokio::test]
async fn test_cancellation_leaves_context_unchanged() {
    let provider = Arc::new(
        ScriptedProvider::new("slow", 1).with_delay(Duration::from_secs(30)),
    );
    provider.respond_with("Never delivered. (Y/N)");

    let hooks = Arc::new(RecordingHooks::new());
    let coordinator = Arc::new(
        SessionCoordinator::new(FailoverRouter::new(vec![
            provider as Arc<dyn ProviderAdapter>
        ]))
        .with_hooks(hooks.clone() as Arc<dyn SessionHooks>),
    );
    coordinator.start("interrupted").unwrap();

    let task = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.choose(Choice::Yes).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(coordinator.state(), SessionState::Generating);

    task.abort();
    let join_error = task.await.unwrap_err();
    assert!(join_error.is_cancelled());

    assert_awaiting_choice(&coordinator);
    assert_history_len(&coordinator, 0);
    assert_eq!(hooks.update_count(), 0);
    assert_eq!(hooks.attempt_batch_count(), 0);

    // The session is still usable after cancellation.
    let error = coordinator.complete();
    assert!(error.is_ok());
}

#[tokio::test]
async fn test_complete_blocks_further_choices() {
    let harness = TestHarness::new();
    harness.expect_narrative("The end approaches. (Y/N)");
    harness.start();

    harness.coordinator.choose(Choice::Yes).await.unwrap();
    harness.coordinator.complete().unwrap();

    assert_eq!(harness.coordinator.state(), SessionState::Completed);
    let error = harness.coordinator.choose(Choice::No).await.unwrap_err();
    assert!(matches!(
        error,
        SessionError::InvalidState {
            state: SessionState::Completed,
            ..
        }
    ));
    assert_history_len(&harness.coordinator, 1);
}
