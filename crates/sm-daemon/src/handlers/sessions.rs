// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/sessions` and `/sessions/{id}/*` handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use sm_core::error::DeliveryResult;
use sm_core::registry::CreateParams;
use sm_core::session::{DeliveryMode, MessageCategory, ProviderTag, Session};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
    pub working_dir: std::path::PathBuf,
    pub provider: ProviderTag,
    pub command: String,
    #[serde(default)]
    pub parent_session_id: Option<String>,
    #[serde(default)]
    pub spawn_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSessionRequest {
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub current_task: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub task: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub status: String,
}

/// `GET /sessions`
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let sessions = state.registry.list(true).await;
    Json(sessions)
}

/// `GET /sessions/{id}`
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    state
        .registry
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("session not found: {id}")))
}

/// `POST /sessions`
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<Session>, ApiError> {
    let session = state
        .registry
        .create(CreateParams {
            name: req.name,
            working_dir: req.working_dir,
            provider: req.provider,
            command: req.command,
            parent_session_id: req.parent_session_id,
            spawn_prompt: req.spawn_prompt,
        })
        .await?;
    Ok(Json(session))
}

/// `PATCH /sessions/{id}`
pub async fn update_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateSessionRequest>,
) -> Result<Json<Session>, ApiError> {
    if let Some(task) = req.current_task {
        state.registry.update_task(&id, task).await?;
    }
    if let Some(name) = req.friendly_name {
        state.registry.set_agent_status(&id, name).await?;
    }
    state
        .registry
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("session not found: {id}")))
}

/// `DELETE /sessions/{id}`
pub async fn kill_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.registry.kill(&id).await?;
    if let Some((_, handle)) = state.monitors.remove(&id) {
        handle.abort();
    }
    state.parent_wake.cancel(&id).await;
    Ok(Json(DeleteResponse {
        status: "killed".into(),
    }))
}

/// `PUT /sessions/{id}/task`
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.registry.update_task(&id, req.task).await?;
    Ok(Json(DeleteResponse {
        status: "updated".into(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    #[serde(default)]
    pub lines: Option<u32>,
}

/// `GET /sessions/{id}/summary` — stubbed until a summarizer driver exists.
pub async fn summary(
    State(_state): State<Arc<AppState>>,
    Path(_id): Path<String>,
    Query(_query): Query<SummaryQuery>,
) -> ApiError {
    ApiError::feature_unavailable("no summarizer driver configured")
}

#[derive(Debug, Deserialize)]
pub struct InvalidateCacheRequest {
    #[serde(default)]
    pub arm_skip: bool,
}

#[derive(Debug, Serialize)]
pub struct InvalidateCacheResponse {
    pub status: String,
    pub cancelled: u64,
}

/// `POST /sessions/{id}/invalidate-cache`
pub async fn invalidate_cache(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<InvalidateCacheRequest>,
) -> Result<Json<InvalidateCacheResponse>, ApiError> {
    state.arbiter.invalidate(&id, req.arm_skip);
    let cancelled = state.queue.cancel_context_monitor_messages_from(&id).await?;
    Ok(Json(InvalidateCacheResponse {
        status: "invalidated".into(),
        cancelled,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub text: String,
    #[serde(default)]
    pub delivery_mode: Option<DeliveryMode>,
    #[serde(default)]
    pub sender_session_id: Option<String>,
    #[serde(default)]
    pub parent_session_id: Option<String>,
    #[serde(default)]
    pub message_category: Option<MessageCategory>,
    #[serde(default)]
    pub remind_soft_threshold: Option<u64>,
    #[serde(default)]
    pub remind_hard_threshold: Option<u64>,
    #[serde(default)]
    pub bypass_queue: bool,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub result: String,
}

/// `POST /sessions/{id}/send`
pub async fn send(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    if state.registry.get(&id).await.is_none() {
        return Err(ApiError::not_found(format!("session not found: {id}")));
    }

    if req.bypass_queue {
        let result = state.registry.send_input(&id, &req.text).await?;
        let result = match result {
            DeliveryResult::Delivered => "delivered",
            DeliveryResult::Queued => "queued",
            DeliveryResult::Failed => "failed",
        };
        return Ok(Json(SendResponse {
            result: result.into(),
        }));
    }

    state
        .queue
        .queue_message(
            &id,
            &req.text,
            req.delivery_mode.unwrap_or(DeliveryMode::Sequential),
            req.sender_session_id.as_deref(),
            req.parent_session_id.as_deref(),
            req.message_category,
            req.remind_soft_threshold,
            req.remind_hard_threshold,
        )
        .await?;
    Ok(Json(SendResponse {
        result: "queued".into(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SpawnRequest {
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub working_dir: Option<std::path::PathBuf>,
    #[serde(default)]
    pub name: Option<String>,
}

/// `POST /sessions/{id}/spawn`
pub async fn spawn(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SpawnRequest>,
) -> Result<Json<Session>, ApiError> {
    let child = state
        .registry
        .spawn_child(
            &id,
            &req.prompt,
            req.model.as_deref(),
            req.working_dir,
            req.name,
        )
        .await?;

    state
        .queue
        .queue_message(
            &child.id,
            &req.prompt,
            DeliveryMode::Urgent,
            Some(&id),
            Some(&id),
            None,
            None,
            None,
        )
        .await?;

    Ok(Json(child))
}

/// `POST /sessions/{id}/open-terminal`
pub async fn open_terminal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.registry.open_terminal(&id).await?;
    Ok(Json(DeleteResponse {
        status: "opened".into(),
    }))
}
