// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discriminated error outcomes shared across the core and its HTTP surface.

use std::fmt;

/// Stable, wire-friendly error discriminant.
///
/// Mirrors the status-code-per-variant pattern the daemon's HTTP layer
/// needs: each variant knows its own HTTP status so handlers don't have to
/// re-derive it at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound,
    BadRequest,
    Conflict,
    FeatureUnavailable,
    Internal,
}

impl ErrorCode {
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::NotFound => 404,
            ErrorCode::BadRequest => 400,
            ErrorCode::Conflict => 409,
            ErrorCode::FeatureUnavailable => 501,
            ErrorCode::Internal => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotFound => "not_found",
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::Conflict => "conflict",
            ErrorCode::FeatureUnavailable => "feature_unavailable",
            ErrorCode::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("pane controller error: {0}")]
    Pane(#[from] anyhow::Error),
    #[error("persistence error: {0}")]
    Store(#[from] StateStoreError),
}

impl RegistryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RegistryError::NotFound(_) => ErrorCode::NotFound,
            RegistryError::Pane(_) | RegistryError::Store(_) => ErrorCode::Internal,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("session not found: {0}")]
    NotFound(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("lock held by another session: {0}")]
    HeldByOther(String),
    #[error("lock not owned by {0}")]
    NotOwned(String),
}

/// Outcome of a message-delivery attempt. Never an `Err` for "the target
/// session doesn't exist" — the registry returns `Failed` for that so
/// callers don't have to special-case delivery vs. infrastructure failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryResult {
    Delivered,
    Queued,
    Failed,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
