// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared env-var lookups used by every subcommand.

const DEFAULT_API_URL: &str = "http://127.0.0.1:8420";

/// Base URL of the daemon's HTTP surface, trimmed of a trailing slash.
pub fn api_url() -> String {
    std::env::var("SM_API_URL")
        .unwrap_or_else(|_| DEFAULT_API_URL.to_string())
        .trim_end_matches('/')
        .to_string()
}

/// The id of the session invoking this CLI, set by the agent CLI's own
/// hook scripts. Missing for a human running `sm` interactively.
pub fn calling_session_id() -> Option<String> {
    std::env::var("CLAUDE_SESSION_MANAGER_ID").ok()
}
