// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Provider` capability table: per-agent-CLI screen classification.
//!
//! Each supported agent renders its terminal UI a little differently, so
//! classifying a pane capture into "is this idle", "is a permission prompt
//! showing", "has the human started typing" needs provider-specific
//! heuristics. Providers are registered in a table keyed by
//! [`ProviderTag`] rather than matched inline, so adding a new agent CLI
//! never touches [`crate::monitor::OutputMonitor`].

use std::collections::HashMap;

use crate::session::ProviderTag;

/// A pane-tail classification a provider can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneSignal {
    Running,
    WaitingInput,
    WaitingPermission,
    Error,
}

pub trait Provider: Send + Sync + 'static {
    /// Classify the trailing region of a pane capture.
    fn classify(&self, capture: &str) -> PaneSignal;

    /// Whether the pane's tail currently shows this provider's input
    /// prompt with nothing pending (used to confirm idle before a
    /// sequential delivery, closing the stale-idle race).
    fn prompt_visible(&self, capture: &str) -> bool;

    /// If the human has started typing into the prompt but not submitted,
    /// return the partial text so delivery can be deferred. Codex-app has
    /// no typed-input surface in the pane and always returns `None`.
    fn peek_user_input(&self, capture: &str) -> Option<String>;
}

/// Classifies Claude Code's terminal UI: a trailing `>` prompt with no
/// pending dialog means idle; a `"Do you want to"` / `"Allow "` line in
/// the tail means a permission dialog is showing.
pub struct ClaudeProvider;

impl Provider for ClaudeProvider {
    fn classify(&self, capture: &str) -> PaneSignal {
        let tail = trailing_lines(capture, 6);
        if tail.iter().any(|l| {
            l.contains("Do you want to") || l.contains("Allow ") || l.contains("permission")
        }) {
            return PaneSignal::WaitingPermission;
        }
        if tail.iter().any(|l| l.contains("Error:") || l.contains("error:")) {
            return PaneSignal::Error;
        }
        if tail.iter().rev().any(|l| l.trim_start().starts_with('>')) {
            return PaneSignal::WaitingInput;
        }
        PaneSignal::Running
    }

    fn prompt_visible(&self, capture: &str) -> bool {
        trailing_lines(capture, 3)
            .iter()
            .any(|l| l.trim_start().starts_with('>'))
    }

    fn peek_user_input(&self, capture: &str) -> Option<String> {
        let last = trailing_lines(capture, 1).into_iter().next()?;
        let trimmed = last.trim_start();
        let text = trimmed.strip_prefix('>')?.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

/// Classifies Codex CLI's terminal UI: a trailing `▌` or `codex>` style
/// prompt means idle; `approve?` text means a permission dialog.
pub struct CodexProvider;

impl Provider for CodexProvider {
    fn classify(&self, capture: &str) -> PaneSignal {
        let tail = trailing_lines(capture, 6);
        if tail.iter().any(|l| l.contains("approve?") || l.contains("Approve")) {
            return PaneSignal::WaitingPermission;
        }
        if tail.iter().any(|l| l.contains("Error:") || l.contains("error:")) {
            return PaneSignal::Error;
        }
        if tail.iter().rev().any(|l| l.contains("codex>")) {
            return PaneSignal::WaitingInput;
        }
        PaneSignal::Running
    }

    fn prompt_visible(&self, capture: &str) -> bool {
        trailing_lines(capture, 3)
            .iter()
            .any(|l| l.contains("codex>"))
    }

    fn peek_user_input(&self, capture: &str) -> Option<String> {
        let last = trailing_lines(capture, 1).into_iter().next()?;
        let text = last.split("codex>").nth(1)?.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

/// The Codex desktop app has no typed-input surface in its pane capture;
/// `peek_user_input` always returns `None`.
pub struct CodexAppProvider;

impl Provider for CodexAppProvider {
    fn classify(&self, capture: &str) -> PaneSignal {
        let tail = trailing_lines(capture, 6);
        if tail.iter().any(|l| l.contains("Approve")) {
            return PaneSignal::WaitingPermission;
        }
        if tail.iter().any(|l| l.contains("Error:")) {
            return PaneSignal::Error;
        }
        if tail.iter().any(|l| l.contains("Waiting for input")) {
            return PaneSignal::WaitingInput;
        }
        PaneSignal::Running
    }

    fn prompt_visible(&self, capture: &str) -> bool {
        trailing_lines(capture, 3)
            .iter()
            .any(|l| l.contains("Waiting for input"))
    }

    fn peek_user_input(&self, _capture: &str) -> Option<String> {
        None
    }
}

fn trailing_lines(capture: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = capture.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].to_vec()
}

/// Table of providers keyed by tag, built once at startup.
pub struct ProviderRegistry {
    providers: HashMap<ProviderTag, Box<dyn Provider>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        let mut providers: HashMap<ProviderTag, Box<dyn Provider>> = HashMap::new();
        providers.insert(ProviderTag::Claude, Box::new(ClaudeProvider));
        providers.insert(ProviderTag::Codex, Box::new(CodexProvider));
        providers.insert(ProviderTag::CodexApp, Box::new(CodexAppProvider));
        Self { providers }
    }
}

impl ProviderRegistry {
    pub fn get(&self, tag: ProviderTag) -> &dyn Provider {
        self.providers
            .get(&tag)
            .map(|p| p.as_ref())
            .unwrap_or(&ClaudeProvider)
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
