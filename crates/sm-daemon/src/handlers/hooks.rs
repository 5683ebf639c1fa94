// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/hooks/*` — entry points called by the agent CLI's own hook scripts,
//! as opposed to `/sessions/*` which is called by human/CLI callers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ContextUsageRequest {
    pub session_id: String,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub used_percentage: Option<f64>,
    #[serde(default)]
    pub trigger: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContextUsageResponse {
    pub status: String,
}

/// `POST /hooks/context-usage`
///
/// A `context_reset` event always cancels pending context-monitor
/// messages from this sender and reports `flags_reset`, regardless of
/// whether anything was actually registered — a late/duplicate reset
/// must never surface as an error to the hook script that fired it.
pub async fn context_usage(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ContextUsageRequest>,
) -> Result<Json<ContextUsageResponse>, ApiError> {
    if req.event.as_deref() == Some("context_reset") {
        state
            .queue
            .cancel_context_monitor_messages_from(&req.session_id)
            .await?;
        return Ok(Json(ContextUsageResponse {
            status: "flags_reset".into(),
        }));
    }

    tracing::debug!(
        session_id = %req.session_id,
        used_percentage = ?req.used_percentage,
        trigger = ?req.trigger,
        "context usage report"
    );
    Ok(Json(ContextUsageResponse {
        status: "recorded".into(),
    }))
}
