// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sample_row(id: &str, target: &str) -> QueuedMessageRow {
    QueuedMessageRow {
        id: id.into(),
        target_session_id: target.into(),
        text: "hello".into(),
        delivery_mode: DeliveryMode::Sequential,
        sender_session_id: None,
        parent_session_id: None,
        message_category: None,
        remind_soft_threshold: None,
        remind_hard_threshold: None,
        attempts: 0,
        queued_at: Utc::now(),
        delivered_at: None,
    }
}

#[test]
fn insert_then_fetch_pending() {
    let storage = QueueStorage::open_in_memory().unwrap();
    storage.insert_message(&sample_row("m1", "child1")).unwrap();
    let pending = storage.pending_for_target("child1").unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].text, "hello");
}

#[test]
fn mark_delivered_excludes_from_pending() {
    let storage = QueueStorage::open_in_memory().unwrap();
    storage.insert_message(&sample_row("m1", "child1")).unwrap();
    storage.mark_delivered("m1", Utc::now()).unwrap();
    assert!(storage.pending_for_target("child1").unwrap().is_empty());
}

#[test]
fn cancel_context_monitor_only_deletes_matching_undelivered_rows() {
    let storage = QueueStorage::open_in_memory().unwrap();

    let mut ctx_row = sample_row("m1", "child1");
    ctx_row.sender_session_id = Some("sender1".into());
    ctx_row.message_category = Some(MessageCategory::ContextMonitor);
    storage.insert_message(&ctx_row).unwrap();

    let mut plain_row = sample_row("m2", "child1");
    plain_row.sender_session_id = Some("sender1".into());
    storage.insert_message(&plain_row).unwrap();

    let mut other_sender_row = sample_row("m3", "child1");
    other_sender_row.sender_session_id = Some("sender2".into());
    other_sender_row.message_category = Some(MessageCategory::ContextMonitor);
    storage.insert_message(&other_sender_row).unwrap();

    let mut delivered_row = sample_row("m4", "child1");
    delivered_row.sender_session_id = Some("sender1".into());
    delivered_row.message_category = Some(MessageCategory::ContextMonitor);
    storage.insert_message(&delivered_row).unwrap();
    storage.mark_delivered("m4", Utc::now()).unwrap();

    let deleted = storage.cancel_context_monitor_from("sender1").unwrap();
    assert_eq!(deleted, 1);

    let remaining_ids: Vec<_> = {
        let conn = storage.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id FROM message_queue ORDER BY id").unwrap();
        stmt.query_map([], |r| r.get::<_, String>(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    };
    assert_eq!(remaining_ids, vec!["m2", "m3", "m4"]);
}

#[test]
fn stuck_message_count_only_counts_undelivered_at_or_past_the_limit() {
    let storage = QueueStorage::open_in_memory().unwrap();

    let mut stuck = sample_row("m1", "child1");
    stuck.attempts = 8;
    storage.insert_message(&stuck).unwrap();

    let mut still_retrying = sample_row("m2", "child1");
    still_retrying.attempts = 3;
    storage.insert_message(&still_retrying).unwrap();

    let mut delivered_stuck = sample_row("m3", "child1");
    delivered_stuck.attempts = 8;
    storage.insert_message(&delivered_stuck).unwrap();
    storage.mark_delivered("m3", Utc::now()).unwrap();

    assert_eq!(storage.stuck_message_count(8).unwrap(), 1);
}

#[test]
fn upsert_parent_wake_replaces_existing_registration() {
    let storage = QueueStorage::open_in_memory().unwrap();
    let row = ParentWakeRow {
        id: "r1".into(),
        child_session_id: "child1".into(),
        parent_session_id: "parent1".into(),
        period_seconds: 600,
        registered_at: Utc::now(),
        last_wake_at: None,
        last_status_at_prev_wake: None,
        escalated: false,
        is_active: true,
    };
    storage.upsert_parent_wake(&row).unwrap();

    let mut replacement = row.clone();
    replacement.id = "r2".into();
    replacement.parent_session_id = "parent2".into();
    storage.upsert_parent_wake(&replacement).unwrap();

    let loaded = storage.parent_wake_for_child("child1").unwrap().unwrap();
    assert_eq!(loaded.id, "r2");
    assert_eq!(loaded.parent_session_id, "parent2");
}

#[test]
fn deactivate_keeps_the_row_but_clears_is_active() {
    let storage = QueueStorage::open_in_memory().unwrap();
    let row = ParentWakeRow {
        id: "r1".into(),
        child_session_id: "child1".into(),
        parent_session_id: "parent1".into(),
        period_seconds: 600,
        registered_at: Utc::now(),
        last_wake_at: None,
        last_status_at_prev_wake: None,
        escalated: false,
        is_active: true,
    };
    storage.upsert_parent_wake(&row).unwrap();
    storage.deactivate_parent_wake("child1").unwrap();

    let loaded = storage.parent_wake_for_child("child1").unwrap().unwrap();
    assert!(!loaded.is_active);
    assert!(storage.active_parent_wakes().unwrap().is_empty());
}

#[test]
fn active_parent_wakes_skips_cancelled_registrations() {
    let storage = QueueStorage::open_in_memory().unwrap();
    let active = ParentWakeRow {
        id: "r1".into(),
        child_session_id: "child1".into(),
        parent_session_id: "parent1".into(),
        period_seconds: 600,
        registered_at: Utc::now(),
        last_wake_at: None,
        last_status_at_prev_wake: None,
        escalated: false,
        is_active: true,
    };
    let mut cancelled = active.clone();
    cancelled.child_session_id = "child2".into();
    cancelled.is_active = false;

    storage.upsert_parent_wake(&active).unwrap();
    storage.upsert_parent_wake(&cancelled).unwrap();

    let rows = storage.active_parent_wakes().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].child_session_id, "child1");
}
