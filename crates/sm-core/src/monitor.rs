// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `OutputMonitor`: one task per live session, watching pane output and
//! driving lifecycle transitions.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::notifier::{NotificationEvent, Notifier};
use crate::pane::PaneController;
use crate::provider::{PaneSignal, ProviderRegistry};
use crate::queue::MessageQueue;
use crate::registry::SessionRegistry;
use crate::session::SessionStatus;

#[derive(Default)]
struct MonitorState {
    last_capture: Option<String>,
    waiting_input_since: Option<Instant>,
    last_permission_notice: Option<Instant>,
}

/// Spawn the per-session output-watching task. The caller holds the
/// returned token's twin (from the registry entry) and cancels it on
/// `kill`/shutdown; this function consumes the cancellation side.
pub fn spawn_output_monitor(
    session_id: String,
    registry: Arc<SessionRegistry>,
    pane: Arc<dyn PaneController>,
    providers: Arc<ProviderRegistry>,
    notifier: Arc<dyn Notifier>,
    queue: Arc<MessageQueue>,
    config: Arc<Config>,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.capture_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut state = MonitorState::default();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(session) = registry.get(&session_id).await else {
                break;
            };
            if session.status == SessionStatus::Stopped {
                break;
            }

            let capture = match tokio::time::timeout(
                config.capture_timeout(),
                pane.capture(&session.pane_name),
            )
            .await
            {
                Ok(Ok(capture)) => capture,
                Ok(Err(err)) => {
                    debug!(session_id = %session_id, error = %err, "capture failed");
                    continue;
                }
                Err(_) => {
                    debug!(session_id = %session_id, "capture timed out");
                    continue;
                }
            };

            state.last_capture = Some(capture.clone());

            let provider = providers.get(session.provider);
            let signal = provider.classify(&capture);

            match signal {
                PaneSignal::Running => {
                    state.waiting_input_since = None;
                    if session.status != SessionStatus::Running {
                        let _ = registry.update_status(&session_id, SessionStatus::Running).await;
                    }
                }
                PaneSignal::Error => {
                    state.waiting_input_since = None;
                    if session.status != SessionStatus::Error {
                        let _ = registry.update_status(&session_id, SessionStatus::Error).await;
                        notifier
                            .send(NotificationEvent::Error {
                                session_id: session_id.clone(),
                                detail: "agent reported a fatal error".into(),
                            })
                            .await;
                    }
                }
                PaneSignal::WaitingPermission => {
                    state.waiting_input_since = None;
                    let should_notify = state
                        .last_permission_notice
                        .map(|t| t.elapsed() >= config.permission_debounce())
                        .unwrap_or(true);
                    if session.status != SessionStatus::WaitingPermission {
                        let _ = registry
                            .update_status(&session_id, SessionStatus::WaitingPermission)
                            .await;
                    }
                    if should_notify {
                        state.last_permission_notice = Some(Instant::now());
                        notifier
                            .send(NotificationEvent::PermissionPrompt {
                                session_id: session_id.clone(),
                                detail: "waiting on a permission prompt".into(),
                            })
                            .await;
                    }
                }
                PaneSignal::WaitingInput => {
                    let since = *state.waiting_input_since.get_or_insert_with(Instant::now);
                    let stable_for = since.elapsed();

                    if stable_for >= config.stable_window()
                        && session.status != SessionStatus::WaitingInput
                        && session.status != SessionStatus::Idle
                    {
                        let _ = registry
                            .update_status(&session_id, SessionStatus::WaitingInput)
                            .await;
                        queue.mark_session_idle(&session_id, false).await;
                    }

                    if stable_for >= config.idle_cooldown() && session.status != SessionStatus::Idle
                    {
                        let _ = registry.update_status(&session_id, SessionStatus::Idle).await;
                    }
                }
            }
        }
        warn!(session_id = %session_id, "output monitor task exiting");
    })
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
