// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `MessageQueue`: durable per-target queue and delivery engine.
//!
//! Urgent messages bypass the queue and deliver (with retry) as soon as
//! they're enqueued. Sequential/Important messages wait for a worker task
//! — spawned on first enqueue to a target, idling out once its queue
//! drains — to confirm the target is actually ready.

pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use rand::Rng;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::arbiter::DeliveryArbiter;
use crate::config::Config;
use crate::error::QueueError;
use crate::pane::PaneController;
use crate::parent_wake::ParentWakeScheduler;
use crate::provider::ProviderRegistry;
use crate::registry::SessionRegistry;
use crate::session::{DeliveryMode, MessageCategory, ProviderTag};
use storage::{QueueStorage, QueuedMessageRow};

/// Public view of a queued message, independent of the storage row shape.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QueuedMessage {
    pub id: String,
    pub target_session_id: String,
    pub text: String,
    pub delivery_mode: DeliveryMode,
    pub sender_session_id: Option<String>,
    pub parent_session_id: Option<String>,
    pub message_category: Option<MessageCategory>,
    pub remind_soft_threshold: Option<u64>,
    pub remind_hard_threshold: Option<u64>,
    pub attempts: u32,
    pub queued_at: chrono::DateTime<Utc>,
}

fn row_to_message(row: &QueuedMessageRow) -> QueuedMessage {
    QueuedMessage {
        id: row.id.clone(),
        target_session_id: row.target_session_id.clone(),
        text: row.text.clone(),
        delivery_mode: row.delivery_mode,
        sender_session_id: row.sender_session_id.clone(),
        parent_session_id: row.parent_session_id.clone(),
        message_category: row.message_category,
        remind_soft_threshold: row.remind_soft_threshold.map(|v| v as u64),
        remind_hard_threshold: row.remind_hard_threshold.map(|v| v as u64),
        attempts: row.attempts,
        queued_at: row.queued_at,
    }
}

#[derive(Default)]
struct TargetDeliveryState {
    is_idle: bool,
}

struct Worker {
    token: CancellationToken,
    notify: Arc<Notify>,
}

pub struct MessageQueue {
    storage: Arc<QueueStorage>,
    pane: Arc<dyn PaneController>,
    providers: Arc<ProviderRegistry>,
    registry: Arc<SessionRegistry>,
    notifier: Arc<dyn crate::notifier::Notifier>,
    arbiter: Arc<DeliveryArbiter>,
    parent_wake: Arc<ParentWakeScheduler>,
    config: Arc<Config>,
    delivery_state: DashMap<String, TargetDeliveryState>,
    workers: DashMap<String, Worker>,
}

impl MessageQueue {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<QueueStorage>,
        pane: Arc<dyn PaneController>,
        providers: Arc<ProviderRegistry>,
        registry: Arc<SessionRegistry>,
        notifier: Arc<dyn crate::notifier::Notifier>,
        arbiter: Arc<DeliveryArbiter>,
        parent_wake: Arc<ParentWakeScheduler>,
        config: Arc<Config>,
    ) -> Arc<Self> {
        Arc::new(Self {
            storage,
            pane,
            providers,
            registry,
            notifier,
            arbiter,
            parent_wake,
            config,
            delivery_state: DashMap::new(),
            workers: DashMap::new(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn queue_message(
        self: &Arc<Self>,
        target: &str,
        text: &str,
        mode: DeliveryMode,
        sender: Option<&str>,
        parent: Option<&str>,
        category: Option<MessageCategory>,
        remind_soft_threshold: Option<u64>,
        remind_hard_threshold: Option<u64>,
    ) -> Result<QueuedMessage, QueueError> {
        let row = QueuedMessageRow {
            id: uuid::Uuid::new_v4().to_string(),
            target_session_id: target.to_string(),
            text: text.to_string(),
            delivery_mode: mode,
            sender_session_id: sender.map(|s| s.to_string()),
            parent_session_id: parent.map(|s| s.to_string()),
            message_category: category,
            remind_soft_threshold: remind_soft_threshold.map(|v| v as i64),
            remind_hard_threshold: remind_hard_threshold.map(|v| v as i64),
            attempts: 0,
            queued_at: Utc::now(),
            delivered_at: None,
        };

        let storage = self.storage.clone();
        let insert_row = row.clone();
        tokio::task::spawn_blocking(move || storage.insert_message(&insert_row))
            .await
            .map_err(|_| QueueError::NotFound("insert join failed".into()))??;

        match mode {
            DeliveryMode::Urgent => {
                let queue = Arc::clone(self);
                let id = row.id.clone();
                tokio::spawn(async move {
                    queue.deliver_urgent(&id).await;
                });
            }
            DeliveryMode::Sequential | DeliveryMode::Important => {
                self.ensure_worker(target);
            }
        }

        Ok(row_to_message(&row))
    }

    pub async fn get_pending_messages(&self, target: &str) -> Result<Vec<QueuedMessage>, QueueError> {
        let storage = self.storage.clone();
        let target = target.to_string();
        let rows =
            tokio::task::spawn_blocking(move || storage.pending_for_target(&target))
                .await
                .map_err(|_| QueueError::NotFound("pending join failed".into()))??;
        Ok(rows.iter().map(row_to_message).collect())
    }

    pub async fn get_queue_length(&self, target: &str) -> Result<u64, QueueError> {
        let storage = self.storage.clone();
        let target = target.to_string();
        tokio::task::spawn_blocking(move || storage.queue_length(&target))
            .await
            .map_err(|_| QueueError::NotFound("length join failed".into()))?
    }

    pub async fn cancel_context_monitor_messages_from(
        &self,
        sender: &str,
    ) -> Result<u64, QueueError> {
        let storage = self.storage.clone();
        let sender = sender.to_string();
        tokio::task::spawn_blocking(move || storage.cancel_context_monitor_from(&sender))
            .await
            .map_err(|_| QueueError::NotFound("cancel join failed".into()))?
    }

    /// Count undelivered messages that have exhausted `queue_max_attempts`,
    /// surfaced by the health report as a stuck-backlog warning.
    pub async fn stuck_message_count(&self) -> Result<u64, QueueError> {
        let storage = self.storage.clone();
        let max_attempts = self.config.queue_max_attempts;
        tokio::task::spawn_blocking(move || storage.stuck_message_count(max_attempts))
            .await
            .map_err(|_| QueueError::NotFound("stuck count join failed".into()))?
    }

    pub async fn register_parent_wake(
        &self,
        child: &str,
        parent: &str,
        period_seconds: Option<u64>,
    ) -> Result<(), QueueError> {
        self.parent_wake.register(child, parent, period_seconds).await?;
        Ok(())
    }

    pub async fn cancel_parent_wake(&self, child: &str) {
        self.parent_wake.cancel(child).await;
    }

    /// Called by the output monitor on a transition into `waiting_input`
    /// (`from_stop_hook = false`) or by the stop-hook entry point
    /// (`from_stop_hook = true`). Marks the target idle so queued
    /// Sequential/Important messages become deliverable, then delegates
    /// the stop-notification/parent-wake bookkeeping to the arbiter.
    pub async fn mark_session_idle(self: &Arc<Self>, target: &str, from_stop_hook: bool) {
        self.delivery_state
            .entry(target.to_string())
            .or_default()
            .is_idle = true;
        self.arbiter.mark_session_idle(target, from_stop_hook).await;
        self.ensure_worker(target);
    }

    pub fn mark_session_busy(&self, target: &str) {
        if let Some(mut state) = self.delivery_state.get_mut(target) {
            state.is_idle = false;
        }
    }

    fn ensure_worker(self: &Arc<Self>, target: &str) {
        if let Some(worker) = self.workers.get(target) {
            worker.notify.notify_one();
            return;
        }

        let token = CancellationToken::new();
        let notify = Arc::new(Notify::new());
        self.workers.insert(
            target.to_string(),
            Worker {
                token: token.clone(),
                notify: notify.clone(),
            },
        );

        let queue = Arc::clone(self);
        let target = target.to_string();
        tokio::spawn(async move {
            queue.run_worker(target, notify, token).await;
        });
    }

    async fn run_worker(self: Arc<Self>, target: String, notify: Arc<Notify>, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = notify.notified() => {}
                _ = tokio::time::sleep(self.config.queue_worker_poll()) => {}
            }

            let pending = match self.get_pending_messages(&target).await {
                Ok(p) => p,
                Err(err) => {
                    warn!(target = %target, error = %err, "failed to read pending messages");
                    continue;
                }
            };
            let pending: Vec<_> = pending
                .into_iter()
                .filter(|m| m.delivery_mode != DeliveryMode::Urgent)
                .collect();

            if pending.is_empty() {
                self.workers.remove(&target);
                break;
            }

            let Some(next) = pending.into_iter().next() else {
                continue;
            };

            if !self.deliverable(&target, next.delivery_mode).await {
                continue;
            }

            self.attempt_delivery(&next).await;
        }
    }

    async fn deliverable(&self, target: &str, mode: DeliveryMode) -> bool {
        let is_idle = self
            .delivery_state
            .get(target)
            .map(|s| s.is_idle)
            .unwrap_or(false);

        let Some(session) = self.registry.get(target).await else {
            return false;
        };

        let capture = match self.pane.capture(&session.pane_name).await {
            Ok(c) => c,
            Err(_) => return false,
        };
        let provider = self.providers.get(session.provider);

        if session.provider != ProviderTag::CodexApp {
            if let Some(_partial) = provider.peek_user_input(&capture) {
                return false;
            }
        }

        match mode {
            DeliveryMode::Urgent => true,
            DeliveryMode::Sequential => is_idle && provider.prompt_visible(&capture),
            DeliveryMode::Important => {
                (is_idle && provider.prompt_visible(&capture)) || provider.prompt_visible(&capture)
            }
        }
    }

    async fn attempt_delivery(&self, message: &QueuedMessage) {
        let Some(session) = self.registry.get(&message.target_session_id).await else {
            return;
        };

        match self.pane.send_text(&session.pane_name, &message.text).await {
            Ok(()) => {
                self.mark_delivered(&message.id).await;
                self.mark_session_busy(&message.target_session_id);
                if let Some(parent) = message.parent_session_id.as_deref() {
                    let _ = self
                        .register_parent_wake(&message.target_session_id, parent, None)
                        .await;
                }
            }
            Err(err) => {
                debug!(message_id = %message.id, error = %err, "delivery attempt failed");
                self.record_failed_attempt(&message.id).await;
            }
        }
    }

    async fn deliver_urgent(self: Arc<Self>, id: &str) {
        loop {
            let Some(message) = self.find_message(id).await else {
                return;
            };

            let Some(session) = self.registry.get(&message.target_session_id).await else {
                return;
            };

            match self.pane.send_text(&session.pane_name, &message.text).await {
                Ok(()) => {
                    self.mark_delivered(id).await;
                    if let Some(parent) = message.parent_session_id.as_deref() {
                        let _ = self
                            .register_parent_wake(&message.target_session_id, parent, None)
                            .await;
                    }
                    return;
                }
                Err(err) => {
                    debug!(message_id = %id, error = %err, "urgent delivery attempt failed");
                    let attempts = self.record_failed_attempt(id).await;
                    if attempts >= self.config.queue_max_attempts {
                        warn!(message_id = %id, "urgent message exceeded max attempts, giving up");
                        return;
                    }
                    tokio::time::sleep(self.backoff_for(attempts)).await;
                }
            }
        }
    }

    fn backoff_for(&self, attempts: u32) -> Duration {
        let min = self.config.queue_backoff_min();
        let max = self.config.queue_backoff_max();
        let exp = min.saturating_mul(1 << attempts.min(8));
        let capped = exp.min(max);
        let jitter_frac = rand::rng().random_range(0.8..1.2);
        Duration::from_secs_f64(capped.as_secs_f64() * jitter_frac)
    }

    async fn find_message(&self, id: &str) -> Option<QueuedMessage> {
        // The queue has no direct target-independent lookup by design
        // (every row belongs to exactly one target); scanning by id here
        // would need a dedicated query. For the urgent-retry path we only
        // ever look up the message we just enqueued, so its row is found
        // by re-reading the pending list for its target, which we already
        // track via the row we were given at enqueue time.
        let storage = self.storage.clone();
        let id = id.to_string();
        let row = tokio::task::spawn_blocking(move || storage.find_by_id(&id))
            .await
            .ok()?
            .ok()?;
        row.map(|r| row_to_message(&r))
    }

    async fn mark_delivered(&self, id: &str) {
        let storage = self.storage.clone();
        let id = id.to_string();
        let _ = tokio::task::spawn_blocking(move || storage.mark_delivered(&id, Utc::now())).await;
    }

    async fn record_failed_attempt(&self, id: &str) -> u32 {
        let storage = self.storage.clone();
        let id2 = id.to_string();
        let _ = tokio::task::spawn_blocking(move || storage.increment_attempts(&id2)).await;
        self.find_message(id).await.map(|m| m.attempts).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
