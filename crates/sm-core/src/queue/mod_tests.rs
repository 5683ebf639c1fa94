// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;
use crate::config::Config;
use crate::notifier::RecordingNotifier;
use crate::pane::NullPaneController;
use crate::registry::CreateParams;
use crate::store::StateStore;

struct Fixture {
    queue: Arc<MessageQueue>,
    pane: Arc<NullPaneController>,
    registry: Arc<SessionRegistry>,
    parent_wake: Arc<ParentWakeScheduler>,
    _dir: tempfile::TempDir,
}

async fn fixture(queue_worker_poll_ms: u64) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let pane = Arc::new(NullPaneController::new());
    let store = StateStore::new(dir.path().join("sessions.json"));
    let registry = Arc::new(SessionRegistry::new(store, pane.clone()));
    let storage = Arc::new(QueueStorage::open_in_memory().unwrap());
    let providers = Arc::new(ProviderRegistry::default());
    let notifier = Arc::new(RecordingNotifier::new());
    let arbiter = Arc::new(DeliveryArbiter::new());
    let parent_wake = Arc::new(ParentWakeScheduler::new_without_storage());

    let mut config = Config::default();
    config.queue_worker_poll_ms = queue_worker_poll_ms;
    let config = Arc::new(config);

    let queue = MessageQueue::new(
        storage,
        pane.clone(),
        providers,
        registry.clone(),
        notifier,
        arbiter,
        parent_wake.clone(),
        config,
    );

    Fixture {
        queue,
        pane,
        registry,
        parent_wake,
        _dir: dir,
    }
}

async fn make_session(registry: &SessionRegistry, name: &str) -> crate::session::Session {
    registry
        .create(CreateParams {
            name: name.to_string(),
            working_dir: "/tmp/repo".into(),
            provider: crate::session::ProviderTag::Claude,
            command: "claude".into(),
            parent_session_id: None,
            spawn_prompt: None,
        })
        .await
        .unwrap()
}

async fn wait_until(mut predicate: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn urgent_message_delivers_immediately_without_idle_check() {
    let fx = fixture(5000).await;
    let target = make_session(&fx.registry, "target").await;

    fx.queue
        .queue_message(
            &target.id,
            "hello",
            DeliveryMode::Urgent,
            None,
            None,
            None,
            None,
            None,
        )
        .await
        .unwrap();

    let delivered = wait_until(
        || fx.pane.sent_messages().iter().any(|(p, t)| p == &target.pane_name && t == "hello"),
        Duration::from_secs(2),
    )
    .await;
    assert!(delivered, "urgent message was not delivered");
}

#[tokio::test]
async fn stale_idle_is_deferred_until_prompt_confirms() {
    let fx = fixture(5000).await;
    let target = make_session(&fx.registry, "target").await;

    // Pane tail does not show the prompt, even though is_idle is true.
    fx.pane.stage_capture(&target.pane_name, "still working on it...\n");

    fx.queue
        .queue_message(
            &target.id,
            "please respond",
            DeliveryMode::Sequential,
            None,
            None,
            None,
            None,
            None,
        )
        .await
        .unwrap();

    fx.queue.mark_session_idle(&target.id, false).await;

    // Give the worker a moment to wake and evaluate; it must not deliver.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(fx.pane.sent_messages().is_empty());
    assert_eq!(fx.queue.get_queue_length(&target.id).await.unwrap(), 1);
}

#[tokio::test]
async fn sequential_delivers_once_idle_and_prompt_visible() {
    let fx = fixture(5000).await;
    let target = make_session(&fx.registry, "target").await;
    fx.pane.stage_capture(&target.pane_name, "some output\n> ");

    fx.queue
        .queue_message(
            &target.id,
            "please respond",
            DeliveryMode::Sequential,
            None,
            None,
            None,
            None,
            None,
        )
        .await
        .unwrap();

    fx.queue.mark_session_idle(&target.id, false).await;

    let delivered = wait_until(
        || fx.pane.sent_messages().iter().any(|(p, _)| p == &target.pane_name),
        Duration::from_secs(2),
    )
    .await;
    assert!(delivered);
    assert_eq!(fx.queue.get_queue_length(&target.id).await.unwrap(), 0);
}

#[tokio::test]
async fn important_delivers_on_visible_prompt_without_prior_idle_signal() {
    // Short poll interval so the worker's own poll tick drives delivery,
    // since no mark_session_idle call happens in this scenario.
    let fx = fixture(30).await;
    let target = make_session(&fx.registry, "target").await;
    fx.pane.stage_capture(&target.pane_name, "some output\n> ");

    fx.queue
        .queue_message(
            &target.id,
            "time sensitive",
            DeliveryMode::Important,
            None,
            None,
            None,
            None,
            None,
        )
        .await
        .unwrap();

    let delivered = wait_until(
        || fx.pane.sent_messages().iter().any(|(p, _)| p == &target.pane_name),
        Duration::from_secs(2),
    )
    .await;
    assert!(delivered);
}

#[tokio::test]
async fn pending_user_input_defers_delivery() {
    let fx = fixture(30).await;
    let target = make_session(&fx.registry, "target").await;
    // The human has started typing but not submitted yet.
    fx.pane.stage_capture(&target.pane_name, "> partial input");

    fx.queue
        .queue_message(
            &target.id,
            "time sensitive",
            DeliveryMode::Important,
            None,
            None,
            None,
            None,
            None,
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(fx.pane.sent_messages().is_empty());
}

#[tokio::test]
async fn context_reset_cancellation_only_touches_matching_undelivered_rows() {
    let fx = fixture(5000).await;
    let a = make_session(&fx.registry, "sender-a").await;
    let b = make_session(&fx.registry, "sender-b").await;
    let target = make_session(&fx.registry, "target").await;

    for _ in 0..3 {
        fx.queue
            .queue_message(
                &target.id,
                "context warning",
                DeliveryMode::Sequential,
                Some(&a.id),
                None,
                Some(MessageCategory::ContextMonitor),
                None,
                None,
            )
            .await
            .unwrap();
    }
    for _ in 0..2 {
        fx.queue
            .queue_message(
                &target.id,
                "plain message",
                DeliveryMode::Sequential,
                Some(&a.id),
                None,
                None,
                None,
                None,
            )
            .await
            .unwrap();
    }
    fx.queue
        .queue_message(
            &target.id,
            "context warning",
            DeliveryMode::Sequential,
            Some(&b.id),
            None,
            Some(MessageCategory::ContextMonitor),
            None,
            None,
        )
        .await
        .unwrap();

    let removed = fx.queue.cancel_context_monitor_messages_from(&a.id).await.unwrap();
    assert_eq!(removed, 3);

    let remaining = fx.queue.get_pending_messages(&target.id).await.unwrap();
    assert_eq!(remaining.len(), 3);
    assert_eq!(
        remaining.iter().filter(|m| m.sender_session_id.as_deref() == Some(a.id.as_str())).count(),
        2
    );
    assert_eq!(
        remaining.iter().filter(|m| m.sender_session_id.as_deref() == Some(b.id.as_str())).count(),
        1
    );
}

#[tokio::test]
async fn successful_delivery_with_parent_registers_a_wake() {
    let fx = fixture(5000).await;
    let parent = make_session(&fx.registry, "parent").await;
    let target = make_session(&fx.registry, "target").await;
    fx.pane.stage_capture(&target.pane_name, "some output\n> ");

    fx.queue
        .queue_message(
            &target.id,
            "go do this",
            DeliveryMode::Sequential,
            None,
            Some(&parent.id),
            None,
            None,
            None,
        )
        .await
        .unwrap();

    fx.queue.mark_session_idle(&target.id, false).await;

    let delivered = wait_until(
        || fx.pane.sent_messages().iter().any(|(p, _)| p == &target.pane_name),
        Duration::from_secs(2),
    )
    .await;
    assert!(delivered);

    // register_parent_wake runs synchronously after the send completes,
    // within the same worker iteration.
    let registered = wait_until(
        || fx.parent_wake.get(&target.id).is_some(),
        Duration::from_secs(1),
    )
    .await;
    assert!(registered, "expected a parent-wake registration for the target");
}
