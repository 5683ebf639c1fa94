// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session-manager daemon: wires the core collaborators into an
//! `axum` HTTP surface and drives the process-wide background tasks.

pub mod error;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use sm_core::config::Config;
use sm_core::monitor::spawn_output_monitor;
use sm_core::parent_wake::spawn_parent_wake_scheduler;

use crate::state::AppState;

/// Spawn an output monitor for every live session recovered at startup and
/// register its handle so the health report can count live monitors.
async fn spawn_monitors_for_live_sessions(state: &Arc<AppState>) {
    for session in state.registry.list(false).await {
        let Some(token) = state.registry.monitor_token(&session.id).await else {
            continue;
        };
        let handle = spawn_output_monitor(
            session.id.clone(),
            state.registry.clone(),
            state.pane.clone(),
            state.providers.clone(),
            state.notifier.clone(),
            state.queue.clone(),
            state.config.clone(),
            token,
        );
        state.monitors.insert(session.id.clone(), handle);
    }
}

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/sessions", get(handlers::sessions::list_sessions).post(handlers::sessions::create_session))
        .route(
            "/sessions/{id}",
            get(handlers::sessions::get_session)
                .patch(handlers::sessions::update_session)
                .delete(handlers::sessions::kill_session),
        )
        .route("/sessions/{id}/task", put(handlers::sessions::update_task))
        .route("/sessions/{id}/summary", get(handlers::sessions::summary))
        .route(
            "/sessions/{id}/invalidate-cache",
            post(handlers::sessions::invalidate_cache),
        )
        .route("/sessions/{id}/send", post(handlers::sessions::send))
        .route("/sessions/{id}/spawn", post(handlers::sessions::spawn))
        .route(
            "/sessions/{id}/open-terminal",
            post(handlers::sessions::open_terminal),
        )
        .route("/hooks/context-usage", post(handlers::hooks::context_usage))
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed))
        .route("/api/v1/shutdown", post(handlers::shutdown::shutdown))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the daemon until shutdown.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config)?;

    state.registry.reconcile().await?;
    state.parent_wake.recover().await?;
    spawn_monitors_for_live_sessions(&state).await;

    let scheduler_handle = spawn_parent_wake_scheduler(
        state.parent_wake.clone(),
        state.queue.clone(),
        state.registry.clone(),
        state.event_log.clone(),
        state.config.clone(),
        state.shutdown.clone(),
    );

    tracing::info!(%addr, "session manager daemon listening");
    let router = build_router(state.clone());
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(state.shutdown.clone().cancelled_owned())
        .await?;

    scheduler_handle.abort();
    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
