// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Session` record and the small enums that classify it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a supervised session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Starting,
    Running,
    WaitingInput,
    WaitingPermission,
    Idle,
    Stopped,
    Error,
}

/// Which agent CLI is driving the pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderTag {
    Claude,
    Codex,
    CodexApp,
}

/// How a queued message should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    Urgent,
    Sequential,
    Important,
}

/// Today there is exactly one concrete category; modeled as an enum rather
/// than a bare string so `cancel_context_monitor_messages_from` can match
/// on it instead of comparing string literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    ContextMonitor,
}

/// A single supervised agent session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub pane_name: String,
    pub working_dir: std::path::PathBuf,
    #[serde(default)]
    pub git_remote_url: Option<String>,
    pub provider: ProviderTag,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub current_task: Option<String>,
    #[serde(default)]
    pub parent_session_id: Option<String>,
    #[serde(default)]
    pub spawn_prompt: Option<String>,
    #[serde(default)]
    pub spawned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notify_chat_id: Option<String>,
    #[serde(default)]
    pub notify_root_message_id: Option<String>,
    #[serde(default)]
    pub notify_topic_id: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<std::path::PathBuf>,
    #[serde(default)]
    pub codex_thread_id: Option<String>,
    #[serde(default)]
    pub agent_status_text: Option<String>,
    #[serde(default)]
    pub agent_status_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub context_monitor_enabled: bool,
    #[serde(default)]
    pub context_monitor_notify: bool,
}

impl Session {
    /// Derive a pane name from the session name, matching the default the
    /// original implementation assigns when none is given explicitly.
    pub fn default_pane_name(name: &str) -> String {
        name.to_string()
    }

    pub fn display_name(&self) -> &str {
        self.friendly_name.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
