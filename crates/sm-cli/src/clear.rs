// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sm clear` — fence a spurious stop notification, then clear the
//! caller's own context.
//!
//! The skip must be armed *before* the fencing input reaches the pane, or
//! the agent's own stop hook firing immediately after `/clear` races the
//! arm and produces a stray notification. The fencing send is attempted
//! even if arming fails, since a user-visible `/clear` must never be
//! silently dropped over a daemon hiccup.

use crate::util::{api_url, calling_session_id};

pub fn run() -> i32 {
    let Some(session_id) = calling_session_id() else {
        eprintln!("error: CLAUDE_SESSION_MANAGER_ID is not set");
        return 2;
    };

    let arm_url = format!("{}/sessions/{session_id}/invalidate-cache", api_url());
    let client = reqwest::blocking::Client::new();
    let arm_ok = client
        .post(&arm_url)
        .json(&serde_json::json!({ "arm_skip": true }))
        .send()
        .map(|r| r.status().is_success())
        .unwrap_or(false);
    if !arm_ok {
        eprintln!("warning: failed to arm stop-notification skip, clearing anyway");
    }

    let send_url = format!("{}/sessions/{session_id}/send", api_url());
    let resp = client
        .post(&send_url)
        .json(&serde_json::json!({
            "text": "/clear",
            "delivery_mode": "urgent",
            "bypass_queue": true,
        }))
        .send();

    match resp {
        Ok(r) if r.status().is_success() => 0,
        Ok(r) => {
            eprintln!("error: clear failed with status {}", r.status());
            1
        }
        Err(e) => {
            eprintln!("error: request failed: {e}");
            1
        }
    }
}
