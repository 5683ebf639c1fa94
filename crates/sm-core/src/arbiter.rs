// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `DeliveryArbiter`: stop-notification skip-counter and sender routing.
//!
//! Absorbs the race between a fencing action (e.g. `/clear`) and the
//! agent's own stop hook firing immediately afterwards: callers arm a
//! skip before the fence so the spurious idle event that follows gets
//! swallowed instead of generating a stray notification.

use dashmap::DashMap;

use crate::notifier::{NotificationEvent, Notifier};
use crate::parent_wake::ParentWakeScheduler;

#[derive(Debug, Default, Clone)]
struct TargetState {
    stop_notify_sender_id: Option<String>,
    stop_notify_sender_name: Option<String>,
    skip_count: u32,
}

pub struct DeliveryArbiter {
    targets: DashMap<String, TargetState>,
    notifier: Option<std::sync::Arc<dyn Notifier>>,
    parent_wake: Option<std::sync::Arc<ParentWakeScheduler>>,
}

impl DeliveryArbiter {
    pub fn new() -> Self {
        Self {
            targets: DashMap::new(),
            notifier: None,
            parent_wake: None,
        }
    }

    pub fn with_collaborators(
        notifier: std::sync::Arc<dyn Notifier>,
        parent_wake: std::sync::Arc<ParentWakeScheduler>,
    ) -> Self {
        Self {
            targets: DashMap::new(),
            notifier: Some(notifier),
            parent_wake: Some(parent_wake),
        }
    }

    /// Arm a sender so a future idle event on `target` triggers a stop
    /// notification back to it. Does not touch the skip counter.
    pub fn arm_sender(&self, target: &str, sender_id: &str, sender_name: &str) {
        let mut entry = self.targets.entry(target.to_string()).or_default();
        entry.stop_notify_sender_id = Some(sender_id.to_string());
        entry.stop_notify_sender_name = Some(sender_name.to_string());
    }

    /// Clear any armed sender for `target`. When `arm_skip` is true, also
    /// arms a skip so the next `mark_session_idle` call is absorbed
    /// instead of firing a notification — callers must call this *before*
    /// sending the fencing input to the pane.
    pub fn invalidate(&self, target: &str, arm_skip: bool) {
        let mut entry = self.targets.entry(target.to_string()).or_default();
        entry.stop_notify_sender_id = None;
        entry.stop_notify_sender_name = None;
        if arm_skip {
            entry.skip_count += 1;
        }
    }

    /// Called by the output monitor when `target` transitions into
    /// `waiting_input`. Consumes one pending skip if armed; otherwise
    /// fires the stop notification to the armed sender, if any.
    pub async fn mark_session_idle(&self, target: &str, from_stop_hook: bool) {
        let fire = {
            let mut entry = self.targets.entry(target.to_string()).or_default();
            if entry.skip_count > 0 {
                entry.skip_count -= 1;
                None
            } else if let Some(sender_id) = entry.stop_notify_sender_id.take() {
                entry.stop_notify_sender_name = None;
                Some(sender_id)
            } else {
                None
            }
        };

        if let (Some(sender_id), Some(notifier)) = (fire, self.notifier.as_ref()) {
            notifier
                .send(NotificationEvent::StopNotification {
                    session_id: target.to_string(),
                    sender_session_id: sender_id,
                })
                .await;
        }

        if from_stop_hook {
            if let Some(parent_wake) = self.parent_wake.as_ref() {
                parent_wake.cancel(target).await;
            }
        }
    }

    #[cfg(test)]
    fn skip_count(&self, target: &str) -> u32 {
        self.targets.get(target).map(|e| e.skip_count).unwrap_or(0)
    }
}

impl Default for DeliveryArbiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "arbiter_tests.rs"]
mod tests;
