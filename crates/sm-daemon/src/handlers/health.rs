// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/health` and `/health/detailed`.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[derive(Debug, Serialize)]
struct Check {
    status: CheckStatus,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl Check {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Ok,
            message: message.into(),
            details: None,
        }
    }

    fn warning(message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            status: CheckStatus::Warning,
            message: message.into(),
            details: Some(details),
        }
    }

    fn error(message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            status: CheckStatus::Error,
            message: message.into(),
            details: Some(details),
        }
    }
}

#[derive(Debug, Serialize)]
struct Resources {
    active_sessions: usize,
    total_sessions: usize,
    monitor_tasks: usize,
}

#[derive(Debug, Serialize)]
struct DetailedHealthResponse {
    status: CheckStatus,
    checks: DetailedChecks,
    resources: Resources,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct DetailedChecks {
    state_file: Check,
    tmux_sessions: Check,
    message_queue: Check,
    telegram: Check,
    monitors: Check,
}

/// Independent raw read of the persisted sessions file. Deliberately does
/// not go through `StateStore::load`, which quarantines a corrupt file as
/// a side effect — a health check must never mutate what it's reporting
/// on.
#[derive(Debug, Deserialize)]
struct RawPersisted {
    sessions: Vec<sm_core::session::Session>,
}

fn check_state_file(path: &std::path::Path) -> (Check, Option<Vec<sm_core::session::Session>>) {
    match std::fs::read_to_string(path) {
        Err(_) => (Check::ok("no state file yet, fresh start"), None),
        Ok(contents) => match serde_json::from_str::<RawPersisted>(&contents) {
            Ok(parsed) => {
                let count = parsed.sessions.len();
                let mut check = Check::ok("state file valid");
                check.details = Some(serde_json::json!({ "sessions_in_file": count }));
                (check, Some(parsed.sessions))
            }
            Err(e) => (
                Check::error(
                    "state file is corrupt",
                    serde_json::json!({ "error": e.to_string() }),
                ),
                None,
            ),
        },
    }
}

async fn check_tmux_sessions(
    state: &AppState,
    live_sessions: &[sm_core::session::Session],
) -> Check {
    let panes = match state.pane.list().await {
        Ok(panes) => panes,
        Err(e) => {
            return Check::error(
                "failed to list panes",
                serde_json::json!({ "error": e.to_string() }),
            )
        }
    };
    let pane_set: HashSet<&str> = panes.iter().map(|p| p.as_str()).collect();

    let missing: Vec<&str> = live_sessions
        .iter()
        .filter(|s| s.status != sm_core::session::SessionStatus::Stopped)
        .filter(|s| !pane_set.contains(s.pane_name.as_str()))
        .map(|s| s.id.as_str())
        .collect();
    if !missing.is_empty() {
        return Check::error(
            "sessions with no corresponding pane",
            serde_json::json!({ "missing": missing }),
        );
    }

    let registered: HashSet<&str> = live_sessions.iter().map(|s| s.pane_name.as_str()).collect();
    let orphaned: Vec<&str> = panes
        .iter()
        .map(|p| p.as_str())
        .filter(|p| !registered.contains(p))
        .collect();
    if !orphaned.is_empty() {
        return Check::warning(
            "panes with no corresponding session",
            serde_json::json!({ "orphaned_tmux": orphaned }),
        );
    }

    Check::ok("tmux sessions consistent with registry")
}

async fn check_message_queue(state: &AppState) -> Check {
    match state.queue.stuck_message_count().await {
        Ok(0) => Check::ok("message queue healthy"),
        Ok(stuck) => Check::warning(
            "message queue has a stuck backlog",
            serde_json::json!({ "stuck_messages": stuck }),
        ),
        Err(e) => Check::error(
            "failed to query message queue",
            serde_json::json!({ "error": e.to_string() }),
        ),
    }
}

fn check_telegram(state: &AppState) -> Check {
    if state.notifier.is_configured() {
        Check::ok("notifier configured")
    } else {
        Check::warning(
            "notifier not configured",
            serde_json::json!({ "configured": false }),
        )
    }
}

fn check_monitors(state: &AppState, expected: usize) -> Check {
    let live = state.monitors.iter().filter(|e| !e.value().is_finished()).count();
    if live < expected {
        Check::warning(
            "fewer monitor tasks than expected sessions",
            serde_json::json!({ "live": live, "expected": expected }),
        )
    } else {
        Check::ok("monitor tasks match live sessions")
    }
}

fn worst_of(statuses: &[CheckStatus]) -> CheckStatus {
    if statuses.iter().any(|s| *s == CheckStatus::Error) {
        CheckStatus::Error
    } else if statuses.iter().any(|s| *s == CheckStatus::Warning) {
        CheckStatus::Warning
    } else {
        CheckStatus::Ok
    }
}

/// `GET /health/detailed`
pub async fn health_detailed(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (state_file_check, persisted) = check_state_file(&state.config.state_file);
    let live_sessions = state.registry.list(true).await;
    let reference = persisted.unwrap_or_else(|| live_sessions.clone());

    let tmux_check = check_tmux_sessions(&state, &reference).await;
    let queue_check = check_message_queue(&state).await;
    let telegram_check = check_telegram(&state);
    let monitors_check = check_monitors(&state, live_sessions.len());

    let overall = worst_of(&[
        state_file_check.status,
        tmux_check.status,
        queue_check.status,
        telegram_check.status,
        monitors_check.status,
    ]);

    let active_sessions = live_sessions
        .iter()
        .filter(|s| s.status != sm_core::session::SessionStatus::Stopped)
        .count();

    Json(DetailedHealthResponse {
        status: overall,
        checks: DetailedChecks {
            state_file: state_file_check,
            tmux_sessions: tmux_check,
            message_queue: queue_check,
            telegram: telegram_check,
            monitors: monitors_check,
        },
        resources: Resources {
            active_sessions,
            total_sessions: live_sessions.len(),
            monitor_tasks: state.monitors.len(),
        },
        timestamp: Utc::now().to_rfc3339(),
    })
}
