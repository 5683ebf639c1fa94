// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `PaneController`: the terminal-multiplexer collaborator.
//!
//! The core never talks to a multiplexer binary directly. Everything that
//! touches panes goes through this trait, so the registry, output monitor
//! and message queue can be tested against a fake without a real tmux (or
//! equivalent) process.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum PaneError {
    #[error("pane not found: {0}")]
    NotFound(String),
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("multiplexer error: {0}")]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait PaneController: Send + Sync + 'static {
    async fn exists(&self, pane_name: &str) -> bool;

    async fn create_with_command(
        &self,
        pane_name: &str,
        working_dir: &std::path::Path,
        command: &str,
    ) -> Result<(), PaneError>;

    async fn send_text(&self, pane_name: &str, text: &str) -> Result<(), PaneError>;

    async fn send_key(&self, pane_name: &str, key: &str) -> Result<(), PaneError>;

    async fn capture(&self, pane_name: &str) -> Result<String, PaneError>;

    async fn kill(&self, pane_name: &str) -> Result<(), PaneError>;

    async fn list(&self) -> Result<Vec<String>, PaneError>;

    async fn open_in_terminal(&self, pane_name: &str) -> Result<(), PaneError>;
}

/// A `PaneController` with no backing multiplexer. Every pane "exists";
/// writes are recorded so tests can assert on them; captures return
/// whatever was last staged via [`NullPaneController::stage_capture`].
///
/// Used as the default binding point until a concrete multiplexer driver
/// is wired in — the component design treats that driver as an external
/// collaborator, not part of this crate's scope.
#[derive(Debug, Default)]
pub struct NullPaneController {
    state: std::sync::Mutex<NullPaneState>,
}

#[derive(Debug, Default)]
struct NullPaneState {
    panes: std::collections::HashSet<String>,
    sent: Vec<(String, String)>,
    captures: std::collections::HashMap<String, String>,
}

impl NullPaneController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_capture(&self, pane_name: &str, contents: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .captures
            .insert(pane_name.to_string(), contents.to_string());
    }

    pub fn sent_messages(&self) -> Vec<(String, String)> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.sent.clone()
    }
}

#[async_trait]
impl PaneController for NullPaneController {
    async fn exists(&self, pane_name: &str) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.panes.contains(pane_name)
    }

    async fn create_with_command(
        &self,
        pane_name: &str,
        _working_dir: &std::path::Path,
        _command: &str,
    ) -> Result<(), PaneError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.panes.insert(pane_name.to_string());
        Ok(())
    }

    async fn send_text(&self, pane_name: &str, text: &str) -> Result<(), PaneError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.panes.contains(pane_name) {
            return Err(PaneError::NotFound(pane_name.to_string()));
        }
        state.sent.push((pane_name.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_key(&self, pane_name: &str, key: &str) -> Result<(), PaneError> {
        self.send_text(pane_name, key).await
    }

    async fn capture(&self, pane_name: &str) -> Result<String, PaneError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.panes.contains(pane_name) {
            return Err(PaneError::NotFound(pane_name.to_string()));
        }
        Ok(state.captures.get(pane_name).cloned().unwrap_or_default())
    }

    async fn kill(&self, pane_name: &str) -> Result<(), PaneError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.panes.remove(pane_name);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, PaneError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.panes.iter().cloned().collect())
    }

    async fn open_in_terminal(&self, pane_name: &str) -> Result<(), PaneError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.panes.contains(pane_name) {
            return Err(PaneError::NotFound(pane_name.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "pane_tests.rs"]
mod tests;
