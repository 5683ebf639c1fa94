// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum_test::TestServer;
use serde_json::json;

use sm_core::config::Config;

use super::*;

fn test_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.state_file = dir.join("sessions.json");
    config.queue_db = dir.join("queue.db");
    config
}

fn test_server() -> (TestServer, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new(test_config(dir.path())).unwrap();
    let server = TestServer::new(build_router(state)).unwrap();
    (server, dir)
}

#[tokio::test]
async fn health_reports_healthy() {
    let (server, _dir) = test_server();
    let resp = server.get("/health").await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<serde_json::Value>()["status"], "healthy");
}

#[tokio::test]
async fn health_detailed_is_healthy_on_a_fresh_start() {
    let (server, _dir) = test_server();
    let resp = server.get("/health/detailed").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert!(matches!(body["status"].as_str(), Some("healthy") | Some("degraded")));
    assert_eq!(body["checks"]["state_file"]["status"], "ok");
}

#[tokio::test]
async fn create_then_get_then_list_round_trips() {
    let (server, _dir) = test_server();

    let create_resp = server
        .post("/sessions")
        .json(&json!({
            "name": "alpha",
            "working_dir": "/tmp/repo",
            "provider": "claude",
            "command": "claude",
        }))
        .await;
    create_resp.assert_status_ok();
    let session: serde_json::Value = create_resp.json();
    let id = session["id"].as_str().unwrap().to_string();

    let get_resp = server.get(&format!("/sessions/{id}")).await;
    get_resp.assert_status_ok();
    assert_eq!(get_resp.json::<serde_json::Value>()["name"], "alpha");

    let list_resp = server.get("/sessions").await;
    list_resp.assert_status_ok();
    let list: Vec<serde_json::Value> = list_resp.json();
    assert_eq!(list.len(), 1);
}

#[tokio::test]
async fn get_unknown_session_is_404() {
    let (server, _dir) = test_server();
    let resp = server.get("/sessions/does-not-exist").await;
    resp.assert_status_not_found();
}

#[tokio::test]
async fn kill_marks_stopped_and_removes_monitor_handle() {
    let (server, _dir) = test_server();

    let create_resp = server
        .post("/sessions")
        .json(&json!({
            "name": "beta",
            "working_dir": "/tmp/repo",
            "provider": "claude",
            "command": "claude",
        }))
        .await;
    let id = create_resp.json::<serde_json::Value>()["id"].as_str().unwrap().to_string();

    let kill_resp = server.delete(&format!("/sessions/{id}")).await;
    kill_resp.assert_status_ok();

    let get_resp = server.get(&format!("/sessions/{id}")).await;
    assert_eq!(get_resp.json::<serde_json::Value>()["status"], "stopped");
}

#[tokio::test]
async fn context_reset_always_reports_flags_reset() {
    let (server, _dir) = test_server();

    let resp = server
        .post("/hooks/context-usage")
        .json(&json!({ "session_id": "unregistered", "event": "context_reset" }))
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<serde_json::Value>()["status"], "flags_reset");
}

#[tokio::test]
async fn summary_is_unavailable_until_a_driver_exists() {
    let (server, _dir) = test_server();
    let resp = server.get("/sessions/any/summary").await;
    resp.assert_status(axum::http::StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn shutdown_cancels_the_process_token() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new(test_config(dir.path())).unwrap();
    let shutdown = state.shutdown.clone();
    let server = TestServer::new(build_router(state)).unwrap();

    let resp = server.post("/api/v1/shutdown").await;
    resp.assert_status_ok();
    assert!(shutdown.is_cancelled());
}
