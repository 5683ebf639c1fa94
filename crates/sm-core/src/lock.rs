// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `WorkspaceLock`: an advisory per-repo lock file so two sessions don't
//! clobber the same git worktree.

use std::path::Path;

use chrono::{DateTime, Local};

use crate::error::LockError;

pub const LOCK_FILE_RELATIVE_PATH: &str = ".claude/workspace.lock";
const STALE_THRESHOLD_MINUTES: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    pub session_id: String,
    pub task: String,
    pub branch: String,
    pub started: DateTime<Local>,
}

impl LockInfo {
    pub fn is_stale(&self) -> bool {
        let age = Local::now().signed_duration_since(self.started);
        age.num_minutes() > STALE_THRESHOLD_MINUTES
    }
}

#[derive(Debug, Clone)]
pub struct LockResult {
    pub acquired: bool,
    pub locked_by_other: bool,
    pub owner_session_id: Option<String>,
}

fn serialize(info: &LockInfo) -> String {
    format!(
        "session={}\ntask={}\nbranch={}\nstarted={}\n",
        info.session_id,
        info.task,
        info.branch,
        info.started.to_rfc3339()
    )
}

fn parse(contents: &str) -> Option<LockInfo> {
    let mut session = None;
    let mut task = None;
    let mut branch = None;
    let mut started = None;

    for line in contents.lines() {
        if let Some((key, value)) = line.split_once('=') {
            match key {
                "session" => session = Some(value.to_string()),
                "task" => task = Some(value.to_string()),
                "branch" => branch = Some(value.to_string()),
                "started" => started = DateTime::parse_from_rfc3339(value).ok(),
                _ => {}
            }
        }
    }

    Some(LockInfo {
        session_id: session?,
        task: task?,
        branch: branch?,
        started: started?.with_timezone(&Local),
    })
}

fn lock_path(repo_root: &Path) -> std::path::PathBuf {
    repo_root.join(LOCK_FILE_RELATIVE_PATH)
}

/// Read and parse the lock file, if present. Malformed content (a missing
/// key, an unparseable timestamp) is logged and treated as absent rather
/// than returned as an error.
pub fn check(repo_root: &Path) -> Option<LockInfo> {
    let path = lock_path(repo_root);
    let contents = std::fs::read_to_string(&path).ok()?;
    match parse(&contents) {
        Some(info) => Some(info),
        None => {
            tracing::warn!(path = %path.display(), "malformed workspace lock file");
            None
        }
    }
}

pub fn is_locked(repo_root: &Path) -> bool {
    check(repo_root).map(|info| !info.is_stale()).unwrap_or(false)
}

/// Acquire the lock. Succeeds if the file is absent, stale, or already
/// owned by `session_id`.
pub fn try_acquire(
    repo_root: &Path,
    session_id: &str,
    task: &str,
    branch: &str,
) -> Result<LockResult, LockError> {
    if let Some(existing) = check(repo_root) {
        if !existing.is_stale() && existing.session_id != session_id {
            return Ok(LockResult {
                acquired: false,
                locked_by_other: true,
                owner_session_id: Some(existing.session_id),
            });
        }
    }

    let info = LockInfo {
        session_id: session_id.to_string(),
        task: task.to_string(),
        branch: branch.to_string(),
        started: Local::now(),
    };
    let path = lock_path(repo_root);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serialize(&info))?;

    Ok(LockResult {
        acquired: true,
        locked_by_other: false,
        owner_session_id: Some(session_id.to_string()),
    })
}

/// Release the lock. No file present is treated as already released. If
/// `session_id` is given, refuses unless the current owner matches.
pub fn release(repo_root: &Path, session_id: Option<&str>) -> Result<bool, LockError> {
    let path = lock_path(repo_root);
    if !path.exists() {
        return Ok(true);
    }

    if let Some(session_id) = session_id {
        match check(repo_root) {
            Some(info) if info.session_id == session_id => {}
            _ => return Ok(false),
        }
    }

    std::fs::remove_file(&path)?;
    Ok(true)
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
