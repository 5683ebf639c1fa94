// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sm send` — deliver text to a target session through the daemon.

use clap::Args;

use crate::util::{api_url, calling_session_id};

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Id of the session to deliver to.
    pub target: String,

    /// Message text.
    pub text: String,

    /// Delivery mode.
    #[arg(long, value_enum, default_value_t = Mode::Sequential)]
    pub mode: Mode,

    /// Sender session id, if omitted falls back to `CLAUDE_SESSION_MANAGER_ID`.
    #[arg(long)]
    pub sender: Option<String>,

    /// Parent session id to attribute the message to.
    #[arg(long)]
    pub parent: Option<String>,

    /// Message category, e.g. `context_monitor`.
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum Mode {
    Urgent,
    Sequential,
    Important,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::Urgent => "urgent",
            Mode::Sequential => "sequential",
            Mode::Important => "important",
        }
    }
}

pub fn run(args: &SendArgs) -> i32 {
    let url = format!("{}/sessions/{}/send", api_url(), args.target);
    let sender = args.sender.clone().or_else(calling_session_id);

    let body = serde_json::json!({
        "text": args.text,
        "delivery_mode": args.mode.as_str(),
        "sender_session_id": sender,
        "parent_session_id": args.parent,
        "message_category": args.category,
    });

    let client = reqwest::blocking::Client::new();
    let resp = match client.post(&url).json(&body).send() {
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

#[cfg(test)]
#[path = "send_tests.rs"]
mod tests;
