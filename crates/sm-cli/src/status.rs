// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sm status [id]` — session status from the daemon, or the workspace
//! lock state when no id is given. The lock is checked directly against
//! the repo's lock file rather than through the daemon, since it's a
//! same-machine/same-repo concern the CLI can resolve on its own.

use clap::Args;

use crate::util::api_url;

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Session id to report on. Omit to report the workspace lock.
    pub id: Option<String>,
}

pub fn run(args: &StatusArgs) -> i32 {
    match &args.id {
        Some(id) => session_status(id),
        None => lock_status(),
    }
}

fn session_status(id: &str) -> i32 {
    let url = format!("{}/sessions/{id}", api_url());
    let client = reqwest::blocking::Client::new();
    let resp = match client.get(&url).send() {
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

fn lock_status() -> i32 {
    let repo_root = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("error: cannot read current directory: {e}");
            return 1;
        }
    };

    match sm_core::lock::check(&repo_root) {
        Some(info) if info.is_stale() => {
            println!("unlocked (stale lock held by {})", info.session_id);
            0
        }
        Some(info) => {
            println!(
                "locked by {} on branch {} ({})",
                info.session_id, info.branch, info.task
            );
            0
        }
        None => {
            println!("unlocked");
            0
        }
    }
}
