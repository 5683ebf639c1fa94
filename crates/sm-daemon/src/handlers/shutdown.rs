// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ShutdownResponse {
    pub status: String,
}

/// `POST /api/v1/shutdown` — cancels the process-wide token; `run`'s
/// `with_graceful_shutdown` future resolves once every in-flight request
/// finishes.
pub async fn shutdown(State(state): State<Arc<AppState>>) -> Json<ShutdownResponse> {
    state.shutdown.cancel();
    Json(ShutdownResponse {
        status: "shutting_down".into(),
    })
}
