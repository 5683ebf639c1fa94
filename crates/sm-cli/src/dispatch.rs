// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sm dispatch` — spawn or message a child session, attributed to the
//! calling session as its parent.

use clap::Args;

use crate::util::{api_url, calling_session_id};

#[derive(Debug, Args)]
pub struct DispatchArgs {
    /// Existing child session id, or omit to spawn a new one.
    #[arg(long)]
    pub child: Option<String>,

    /// Prompt text for a new child, or message text for an existing one.
    pub text: String,

    /// Model override for a newly spawned child.
    #[arg(long)]
    pub model: Option<String>,
}

pub fn run(args: &DispatchArgs) -> i32 {
    let Some(parent_id) = calling_session_id() else {
        eprintln!("error: CLAUDE_SESSION_MANAGER_ID is not set");
        return 2;
    };

    let client = reqwest::blocking::Client::new();
    let resp = match &args.child {
        Some(child_id) => {
            let url = format!("{}/sessions/{child_id}/send", api_url());
            client
                .post(&url)
                .json(&serde_json::json!({
                    "text": args.text,
                    "delivery_mode": "sequential",
                    "sender_session_id": parent_id,
                    "parent_session_id": parent_id,
                }))
                .send()
        }
        None => {
            let url = format!("{}/sessions/{parent_id}/spawn", api_url());
            client
                .post(&url)
                .json(&serde_json::json!({
                    "prompt": args.text,
                    "model": args.model,
                }))
                .send()
        }
    };

    let resp = match resp {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: request failed: {e}");
            return 1;
        }
    };

    let status = resp.status();
    let text = resp.text().unwrap_or_default();
    if !text.is_empty() {
        println!("{text}");
    }
    if status.is_success() {
        0
    } else {
        1
    }
}
