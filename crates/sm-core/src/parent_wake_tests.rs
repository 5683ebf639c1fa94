// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn register_replaces_existing_registration_for_the_same_child() {
    let scheduler = ParentWakeScheduler::new_without_storage();
    scheduler.register("child", "parent-a", Some(600)).await.unwrap();
    scheduler.register("child", "parent-b", Some(120)).await.unwrap();

    let reg = scheduler.get("child").unwrap();
    assert_eq!(reg.parent_session_id, "parent-b");
    assert_eq!(reg.period_seconds, 120);
}

#[tokio::test]
async fn cancel_removes_the_registration() {
    let scheduler = ParentWakeScheduler::new_without_storage();
    scheduler.register("child", "parent", None).await.unwrap();
    assert!(scheduler.is_active("child").await);

    scheduler.cancel("child").await;
    assert!(!scheduler.is_active("child").await);
}

#[tokio::test]
async fn cancel_on_unregistered_child_is_a_no_op() {
    let scheduler = ParentWakeScheduler::new_without_storage();
    scheduler.cancel("nobody").await;
    assert!(!scheduler.is_active("nobody").await);
}

#[tokio::test]
async fn register_defaults_to_the_standard_period() {
    let scheduler = ParentWakeScheduler::new_without_storage();
    let reg = scheduler.register("child", "parent", None).await.unwrap();
    assert_eq!(reg.period_seconds, DEFAULT_PERIOD_SECS);
}

#[tokio::test]
async fn record_wake_escalates_on_no_progress_and_reverts_on_progress() {
    let scheduler = ParentWakeScheduler::new_without_storage();
    scheduler.register("child", "parent", None).await.unwrap();

    let first_status = Utc::now();
    scheduler.record_wake("child", Some(first_status)).await;
    let reg = scheduler.get("child").unwrap();
    assert!(!reg.escalated);
    assert_eq!(reg.period_seconds, DEFAULT_PERIOD_SECS);

    // Second wake, same status timestamp: no progress, escalate.
    scheduler.record_wake("child", Some(first_status)).await;
    let reg = scheduler.get("child").unwrap();
    assert!(reg.escalated);
    assert_eq!(reg.period_seconds, ESCALATED_PERIOD_SECS);

    // Third wake, status advanced: de-escalate back to the default period.
    let advanced_status = first_status + chrono::Duration::seconds(30);
    scheduler.record_wake("child", Some(advanced_status)).await;
    let reg = scheduler.get("child").unwrap();
    assert!(!reg.escalated);
    assert_eq!(reg.period_seconds, DEFAULT_PERIOD_SECS);
}

#[test]
fn assemble_digest_includes_header_and_status() {
    let reg = ParentWakeRegistration {
        id: "r1".into(),
        child_session_id: "child".into(),
        parent_session_id: "parent".into(),
        period_seconds: 600,
        registered_at: Utc::now() - chrono::Duration::minutes(5),
        last_wake_at: None,
        last_status_at_prev_wake: None,
        escalated: false,
    };

    let digest = assemble_digest(&reg, "fix-login", Some("running tests"), None, &[]);
    assert!(digest.contains("[sm dispatch] Child update: fix-login"));
    assert!(digest.contains("5m running"));
    assert!(digest.contains("running tests"));
    assert!(!digest.contains("NO PROGRESS"));
}

#[test]
fn assemble_digest_warns_on_no_progress_since_prior_wake() {
    let stuck_at = Utc::now();
    let reg = ParentWakeRegistration {
        id: "r1".into(),
        child_session_id: "child".into(),
        parent_session_id: "parent".into(),
        period_seconds: 300,
        registered_at: Utc::now() - chrono::Duration::minutes(20),
        last_wake_at: Some(Utc::now() - chrono::Duration::minutes(10)),
        last_status_at_prev_wake: Some(stuck_at),
        escalated: true,
    };

    let digest = assemble_digest(&reg, "fix-login", Some("still stuck"), Some(stuck_at), &[]);
    assert!(digest.contains("Warning: NO PROGRESS DETECTED"));
}

#[test]
fn assemble_digest_renders_recent_tool_activity() {
    let reg = ParentWakeRegistration {
        id: "r1".into(),
        child_session_id: "child".into(),
        parent_session_id: "parent".into(),
        period_seconds: 600,
        registered_at: Utc::now(),
        last_wake_at: None,
        last_status_at_prev_wake: None,
        escalated: false,
    };

    let lines = vec!["ran tests".to_string(), "edited foo.rs".to_string()];
    let digest = assemble_digest(&reg, "fix-login", None, None, &lines);
    assert!(digest.contains("Recent activity:"));
    assert!(digest.contains("ran tests"));
    assert!(digest.contains("edited foo.rs"));
    assert!(digest.contains("no status reported"));
}
