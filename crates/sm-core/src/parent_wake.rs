// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ParentWakeScheduler`: periodic digest wake-ups for parent agents
//! supervising a child session.
//!
//! This module owns the registration table and digest assembly; the
//! polling task itself is a free function ([`spawn_parent_wake_scheduler`])
//! that also needs the message queue to actually enqueue a digest, kept
//! separate so this struct never has to hold a reference back to the
//! queue that holds a reference to this struct's sibling, the arbiter.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::QueueError;
use crate::event_log::EventLog;
use crate::queue::storage::{ParentWakeRow, QueueStorage};
use crate::queue::MessageQueue;
use crate::registry::SessionRegistry;
use crate::session::{DeliveryMode, MessageCategory};

#[derive(Debug, Clone)]
pub struct ParentWakeRegistration {
    pub id: String,
    pub child_session_id: String,
    pub parent_session_id: String,
    pub period_seconds: u64,
    pub registered_at: DateTime<Utc>,
    pub last_wake_at: Option<DateTime<Utc>>,
    pub last_status_at_prev_wake: Option<DateTime<Utc>>,
    pub escalated: bool,
}

const DEFAULT_PERIOD_SECS: u64 = 600;
const ESCALATED_PERIOD_SECS: u64 = 300;

pub struct ParentWakeScheduler {
    storage: Option<Arc<QueueStorage>>,
    registrations: DashMap<String, ParentWakeRegistration>,
}

impl ParentWakeScheduler {
    pub fn new(storage: Arc<QueueStorage>) -> Self {
        Self {
            storage: Some(storage),
            registrations: DashMap::new(),
        }
    }

    /// In-memory only, no SQLite backing. Used by tests and by callers
    /// that don't need restart-survival.
    pub fn new_without_storage() -> Self {
        Self {
            storage: None,
            registrations: DashMap::new(),
        }
    }

    /// Reload active registrations from storage at startup. Rows with
    /// `is_active = 0` are not restored.
    pub async fn recover(&self) -> Result<(), QueueError> {
        let Some(storage) = self.storage.clone() else {
            return Ok(());
        };
        let rows = tokio::task::spawn_blocking(move || storage.active_parent_wakes())
            .await
            .map_err(|_| QueueError::NotFound("recover join failed".into()))??;
        for row in rows {
            self.registrations
                .insert(row.child_session_id.clone(), from_row(row));
        }
        Ok(())
    }

    /// Replace any existing registration for `child` (last writer wins).
    pub async fn register(
        &self,
        child: &str,
        parent: &str,
        period_seconds: Option<u64>,
    ) -> Result<ParentWakeRegistration, QueueError> {
        let reg = ParentWakeRegistration {
            id: uuid::Uuid::new_v4().to_string(),
            child_session_id: child.to_string(),
            parent_session_id: parent.to_string(),
            period_seconds: period_seconds.unwrap_or(DEFAULT_PERIOD_SECS),
            registered_at: Utc::now(),
            last_wake_at: None,
            last_status_at_prev_wake: None,
            escalated: false,
        };
        self.persist(&reg, true).await?;
        self.registrations.insert(child.to_string(), reg.clone());
        Ok(reg)
    }

    /// Remove the in-memory registration and mark it inactive in storage.
    /// A no-op, not an error, if nothing was registered for `child`.
    pub async fn cancel(&self, child: &str) {
        if self.registrations.remove(child).is_none() {
            return;
        }
        if let Some(storage) = self.storage.clone() {
            let child = child.to_string();
            let _ = tokio::task::spawn_blocking(move || storage.deactivate_parent_wake(&child))
                .await;
        }
    }

    pub async fn is_active(&self, child: &str) -> bool {
        self.registrations.contains_key(child)
    }

    pub fn get(&self, child: &str) -> Option<ParentWakeRegistration> {
        self.registrations.get(child).map(|r| r.clone())
    }

    fn due(&self, now: DateTime<Utc>) -> Vec<ParentWakeRegistration> {
        self.registrations
            .iter()
            .filter(|entry| {
                let reg = entry.value();
                let anchor = reg.last_wake_at.unwrap_or(reg.registered_at);
                anchor + chrono::Duration::seconds(reg.period_seconds as i64) <= now
            })
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Record that a wake fired, escalating/de-escalating the period based
    /// on whether `agent_status_at` advanced since the previous wake.
    async fn record_wake(&self, child: &str, agent_status_at: Option<DateTime<Utc>>) {
        let Some(mut reg) = self.registrations.get_mut(child).map(|r| r.clone()) else {
            return;
        };

        let no_progress = reg.last_wake_at.is_some()
            && agent_status_at.is_some()
            && agent_status_at == reg.last_status_at_prev_wake;

        if no_progress {
            reg.escalated = true;
            reg.period_seconds = ESCALATED_PERIOD_SECS;
        } else if reg.escalated {
            reg.escalated = false;
            reg.period_seconds = DEFAULT_PERIOD_SECS;
        }

        reg.last_status_at_prev_wake = agent_status_at;
        reg.last_wake_at = Some(Utc::now());

        self.registrations.insert(child.to_string(), reg.clone());
        let _ = self.persist(&reg, true).await;
    }

    async fn persist(&self, reg: &ParentWakeRegistration, is_active: bool) -> Result<(), QueueError> {
        let Some(storage) = self.storage.clone() else {
            return Ok(());
        };
        let row = to_row(reg, is_active);
        tokio::task::spawn_blocking(move || storage.upsert_parent_wake(&row))
            .await
            .map_err(|_| QueueError::NotFound("persist join failed".into()))??;
        Ok(())
    }
}

fn from_row(row: ParentWakeRow) -> ParentWakeRegistration {
    ParentWakeRegistration {
        id: row.id,
        child_session_id: row.child_session_id,
        parent_session_id: row.parent_session_id,
        period_seconds: row.period_seconds as u64,
        registered_at: row.registered_at,
        last_wake_at: row.last_wake_at,
        last_status_at_prev_wake: row.last_status_at_prev_wake,
        escalated: row.escalated,
    }
}

fn to_row(reg: &ParentWakeRegistration, is_active: bool) -> ParentWakeRow {
    ParentWakeRow {
        id: reg.id.clone(),
        child_session_id: reg.child_session_id.clone(),
        parent_session_id: reg.parent_session_id.clone(),
        period_seconds: reg.period_seconds as i64,
        registered_at: reg.registered_at,
        last_wake_at: reg.last_wake_at,
        last_status_at_prev_wake: reg.last_status_at_prev_wake,
        escalated: reg.escalated,
        is_active,
    }
}

/// Assemble the digest text sent to the parent. Contains the header, the
/// running-time, the child's last reported status, a handful of recent
/// tool-activity lines, and — from the second wake onward — a no-progress
/// warning if the status hasn't advanced since the previous wake.
pub fn assemble_digest(
    reg: &ParentWakeRegistration,
    display_name: &str,
    agent_status_text: Option<&str>,
    agent_status_at: Option<DateTime<Utc>>,
    recent_tool_lines: &[String],
) -> String {
    let minutes_running = (Utc::now() - reg.registered_at).num_minutes().max(0);
    let mut out = format!("[sm dispatch] Child update: {display_name}\n");
    out.push_str(&format!("{minutes_running}m running\n"));
    out.push_str(agent_status_text.unwrap_or("no status reported"));
    out.push('\n');

    if !recent_tool_lines.is_empty() {
        out.push_str("Recent activity:\n");
        for line in recent_tool_lines.iter().take(5) {
            out.push_str("- ");
            out.push_str(line);
            out.push('\n');
        }
    }

    let no_progress = reg.last_wake_at.is_some()
        && agent_status_at.is_some()
        && agent_status_at == reg.last_status_at_prev_wake;
    if no_progress {
        out.push_str("Warning: NO PROGRESS DETECTED\n");
    }

    out
}

/// Periodic task polling for due registrations and enqueuing a digest to
/// each parent. One process-global task, grounded on the teacher's
/// interval-plus-cancellation-token background task pattern.
pub fn spawn_parent_wake_scheduler(
    scheduler: Arc<ParentWakeScheduler>,
    queue: Arc<MessageQueue>,
    registry: Arc<SessionRegistry>,
    event_log: Arc<EventLog>,
    config: Arc<Config>,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.parent_wake_poll());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let now = Utc::now();
            for reg in scheduler.due(now) {
                let Some(child) = registry.get(&reg.child_session_id).await else {
                    scheduler.cancel(&reg.child_session_id).await;
                    continue;
                };

                let recent_lines = event_log
                    .recent_for(&reg.child_session_id, 5)
                    .into_iter()
                    .map(|e| e.summary)
                    .collect::<Vec<_>>();

                let digest = assemble_digest(
                    &reg,
                    child.display_name(),
                    child.agent_status_text.as_deref(),
                    child.agent_status_at,
                    &recent_lines,
                );

                let _ = queue
                    .queue_message(
                        &reg.parent_session_id,
                        &digest,
                        DeliveryMode::Important,
                        Some(&reg.child_session_id),
                        None,
                        None::<MessageCategory>,
                        None,
                        None,
                    )
                    .await;

                scheduler.record_wake(&reg.child_session_id, child.agent_status_at).await;
            }
        }
        info!("parent wake scheduler exiting");
    })
}

#[cfg(test)]
#[path = "parent_wake_tests.rs"]
mod tests;
