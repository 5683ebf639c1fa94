// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed append-only activity log, one JSONL file per session.
//!
//! Used by the parent-wake digest to surface "recent tool activity" and by
//! the summary endpoint. Never truncated; callers only ever read a
//! trailing window.

use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub summary: String,
    pub timestamp_ms: u64,
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// File-backed per-session activity log. If `base_dir` is `None` (tests),
/// nothing is written and reads always return empty.
pub struct EventLog {
    base_dir: Option<PathBuf>,
}

impl EventLog {
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self { base_dir }
    }

    fn path_for(&self, session_id: &str) -> Option<PathBuf> {
        let dir = self.base_dir.as_ref()?;
        Some(dir.join(format!("{session_id}.jsonl")))
    }

    pub fn append(&self, session_id: &str, summary: &str) {
        let Some(path) = self.path_for(session_id) else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let entry = ActivityEntry {
            summary: summary.to_string(),
            timestamp_ms: now_ms(),
        };
        let Ok(mut line) = serde_json::to_string(&entry) else {
            return;
        };
        line.push('\n');
        let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(&path)
        else {
            return;
        };
        let _ = file.write_all(line.as_bytes());
    }

    /// The last `n` entries, oldest first.
    pub fn recent_for(&self, session_id: &str, n: usize) -> Vec<ActivityEntry> {
        let Some(path) = self.path_for(session_id) else {
            return Vec::new();
        };
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Vec::new();
        };
        let mut entries: Vec<ActivityEntry> = contents
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        let start = entries.len().saturating_sub(n);
        entries.split_off(start)
    }
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
