// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Notifier`: the chat/email transport collaborator.

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub enum NotificationEvent {
    PermissionPrompt {
        session_id: String,
        detail: String,
    },
    StopNotification {
        session_id: String,
        sender_session_id: String,
    },
    ParentWakeDigest {
        parent_session_id: String,
        child_session_id: String,
        digest: String,
    },
    Error {
        session_id: String,
        detail: String,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, event: NotificationEvent);

    async fn open_thread(&self, session_id: &str) -> anyhow::Result<()>;

    /// Whether this notifier is backed by a configured transport at all,
    /// used by the health report's `telegram` check.
    fn is_configured(&self) -> bool;
}

/// A `Notifier` with no backing transport. Used as the default binding
/// point until a concrete chat/email driver is wired in; reports
/// `is_configured() == false` so the health report's `telegram` check
/// reflects reality.
#[derive(Debug, Default)]
pub struct NullNotifier;

impl NullNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, _event: NotificationEvent) {}

    async fn open_thread(&self, _session_id: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// A `Notifier` that records events for test assertions and reports as
/// configured, so arbiter/queue tests can assert on delivered events.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: std::sync::Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, event: NotificationEvent) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push(event);
    }

    async fn open_thread(&self, _session_id: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn is_configured(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;
