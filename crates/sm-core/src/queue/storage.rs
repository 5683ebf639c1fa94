// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The SQLite-backed tables behind the message queue and parent-wake
//! registrations. `rusqlite` is synchronous, so every call here is run
//! through `spawn_blocking`; callers never block the async runtime on a
//! disk write.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::QueueError;
use crate::session::{DeliveryMode, MessageCategory};

#[derive(Clone)]
pub struct QueuedMessageRow {
    pub id: String,
    pub target_session_id: String,
    pub text: String,
    pub delivery_mode: DeliveryMode,
    pub sender_session_id: Option<String>,
    pub parent_session_id: Option<String>,
    pub message_category: Option<MessageCategory>,
    pub remind_soft_threshold: Option<i64>,
    pub remind_hard_threshold: Option<i64>,
    pub attempts: u32,
    pub queued_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ParentWakeRow {
    pub id: String,
    pub child_session_id: String,
    pub parent_session_id: String,
    pub period_seconds: i64,
    pub registered_at: DateTime<Utc>,
    pub last_wake_at: Option<DateTime<Utc>>,
    pub last_status_at_prev_wake: Option<DateTime<Utc>>,
    pub escalated: bool,
    pub is_active: bool,
}

/// Owns the single SQLite connection backing both the durable queue and
/// the parent-wake registration table. WAL mode lets readers (the health
/// check, `get_pending_messages`) proceed without blocking the writer.
pub struct QueueStorage {
    conn: Mutex<Connection>,
}

fn mode_to_str(mode: DeliveryMode) -> &'static str {
    match mode {
        DeliveryMode::Urgent => "urgent",
        DeliveryMode::Sequential => "sequential",
        DeliveryMode::Important => "important",
    }
}

fn mode_from_str(s: &str) -> DeliveryMode {
    match s {
        "urgent" => DeliveryMode::Urgent,
        "important" => DeliveryMode::Important,
        _ => DeliveryMode::Sequential,
    }
}

fn category_to_str(cat: Option<MessageCategory>) -> Option<&'static str> {
    cat.map(|c| match c {
        MessageCategory::ContextMonitor => "context_monitor",
    })
}

fn category_from_str(s: Option<String>) -> Option<MessageCategory> {
    match s.as_deref() {
        Some("context_monitor") => Some(MessageCategory::ContextMonitor),
        _ => None,
    }
}

impl QueueStorage {
    pub fn open(path: &Path) -> Result<Self, QueueError> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS message_queue (
                id                    TEXT PRIMARY KEY,
                target_session_id    TEXT NOT NULL,
                text                  TEXT NOT NULL,
                delivery_mode         TEXT NOT NULL,
                sender_session_id     TEXT,
                parent_session_id     TEXT,
                message_category      TEXT,
                remind_soft_threshold INTEGER,
                remind_hard_threshold INTEGER,
                attempts              INTEGER NOT NULL DEFAULT 0,
                queued_at             TEXT NOT NULL,
                delivered_at          TEXT
            );
            CREATE TABLE IF NOT EXISTS parent_wake_registrations (
                id                        TEXT PRIMARY KEY,
                child_session_id          TEXT NOT NULL UNIQUE,
                parent_session_id         TEXT NOT NULL,
                period_seconds            INTEGER NOT NULL,
                registered_at             TEXT NOT NULL,
                last_wake_at              TEXT,
                last_status_at_prev_wake  TEXT,
                escalated                 INTEGER NOT NULL DEFAULT 0,
                is_active                 INTEGER NOT NULL DEFAULT 1
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS message_queue (
                id                    TEXT PRIMARY KEY,
                target_session_id    TEXT NOT NULL,
                text                  TEXT NOT NULL,
                delivery_mode         TEXT NOT NULL,
                sender_session_id     TEXT,
                parent_session_id     TEXT,
                message_category      TEXT,
                remind_soft_threshold INTEGER,
                remind_hard_threshold INTEGER,
                attempts              INTEGER NOT NULL DEFAULT 0,
                queued_at             TEXT NOT NULL,
                delivered_at          TEXT
            );
            CREATE TABLE IF NOT EXISTS parent_wake_registrations (
                id                        TEXT PRIMARY KEY,
                child_session_id          TEXT NOT NULL UNIQUE,
                parent_session_id         TEXT NOT NULL,
                period_seconds            INTEGER NOT NULL,
                registered_at             TEXT NOT NULL,
                last_wake_at              TEXT,
                last_status_at_prev_wake  TEXT,
                escalated                 INTEGER NOT NULL DEFAULT 0,
                is_active                 INTEGER NOT NULL DEFAULT 1
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn insert_message(&self, row: &QueuedMessageRow) -> Result<(), QueueError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO message_queue (
                id, target_session_id, text, delivery_mode, sender_session_id,
                parent_session_id, message_category, remind_soft_threshold,
                remind_hard_threshold, attempts, queued_at, delivered_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                row.id,
                row.target_session_id,
                row.text,
                mode_to_str(row.delivery_mode),
                row.sender_session_id,
                row.parent_session_id,
                category_to_str(row.message_category),
                row.remind_soft_threshold,
                row.remind_hard_threshold,
                row.attempts,
                row.queued_at.to_rfc3339(),
                row.delivered_at.map(|d| d.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn pending_for_target(&self, target: &str) -> Result<Vec<QueuedMessageRow>, QueueError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT id, target_session_id, text, delivery_mode, sender_session_id,
                    parent_session_id, message_category, remind_soft_threshold,
                    remind_hard_threshold, attempts, queued_at, delivered_at
             FROM message_queue
             WHERE target_session_id = ?1 AND delivered_at IS NULL
             ORDER BY queued_at ASC",
        )?;
        let rows = stmt
            .query_map(params![target], Self::row_to_message)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueuedMessageRow> {
        let queued_at: String = row.get(10)?;
        let delivered_at: Option<String> = row.get(11)?;
        let category: Option<String> = row.get(6)?;
        Ok(QueuedMessageRow {
            id: row.get(0)?,
            target_session_id: row.get(1)?,
            text: row.get(2)?,
            delivery_mode: mode_from_str(&row.get::<_, String>(3)?),
            sender_session_id: row.get(4)?,
            parent_session_id: row.get(5)?,
            message_category: category_from_str(category),
            remind_soft_threshold: row.get(7)?,
            remind_hard_threshold: row.get(8)?,
            attempts: row.get(9)?,
            queued_at: DateTime::parse_from_rfc3339(&queued_at)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            delivered_at: delivered_at.and_then(|d| {
                DateTime::parse_from_rfc3339(&d)
                    .ok()
                    .map(|d| d.with_timezone(&Utc))
            }),
        })
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<QueuedMessageRow>, QueueError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let row = conn
            .query_row(
                "SELECT id, target_session_id, text, delivery_mode, sender_session_id,
                        parent_session_id, message_category, remind_soft_threshold,
                        remind_hard_threshold, attempts, queued_at, delivered_at
                 FROM message_queue WHERE id = ?1",
                params![id],
                Self::row_to_message,
            )
            .optional()?;
        Ok(row)
    }

    pub fn queue_length(&self, target: &str) -> Result<u64, QueueError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM message_queue WHERE target_session_id = ?1 AND delivered_at IS NULL",
            params![target],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Count undelivered rows that have exhausted `max_attempts`, used by
    /// the daemon's health report to surface a stuck backlog.
    pub fn stuck_message_count(&self, max_attempts: u32) -> Result<u64, QueueError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM message_queue WHERE delivered_at IS NULL AND attempts >= ?1",
            params![max_attempts],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn mark_delivered(&self, id: &str, delivered_at: DateTime<Utc>) -> Result<(), QueueError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "UPDATE message_queue SET delivered_at = ?1 WHERE id = ?2",
            params![delivered_at.to_rfc3339(), id],
        )?;
        Ok(())
    }

    pub fn increment_attempts(&self, id: &str) -> Result<(), QueueError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "UPDATE message_queue SET attempts = attempts + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    /// Delete undelivered rows from `sender` tagged `context_monitor`;
    /// returns the number of rows removed. Delivered rows, rows with no
    /// category, and rows from other senders are untouched.
    pub fn cancel_context_monitor_from(&self, sender: &str) -> Result<u64, QueueError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let changed = conn.execute(
            "DELETE FROM message_queue
             WHERE sender_session_id = ?1
               AND message_category = 'context_monitor'
               AND delivered_at IS NULL",
            params![sender],
        )?;
        Ok(changed as u64)
    }

    pub fn upsert_parent_wake(&self, row: &ParentWakeRow) -> Result<(), QueueError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO parent_wake_registrations (
                id, child_session_id, parent_session_id, period_seconds,
                registered_at, last_wake_at, last_status_at_prev_wake, escalated, is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(child_session_id) DO UPDATE SET
                id = excluded.id,
                parent_session_id = excluded.parent_session_id,
                period_seconds = excluded.period_seconds,
                registered_at = excluded.registered_at,
                last_wake_at = excluded.last_wake_at,
                last_status_at_prev_wake = excluded.last_status_at_prev_wake,
                escalated = excluded.escalated,
                is_active = excluded.is_active",
            params![
                row.id,
                row.child_session_id,
                row.parent_session_id,
                row.period_seconds,
                row.registered_at.to_rfc3339(),
                row.last_wake_at.map(|d| d.to_rfc3339()),
                row.last_status_at_prev_wake.map(|d| d.to_rfc3339()),
                row.escalated,
                row.is_active,
            ],
        )?;
        Ok(())
    }

    pub fn deactivate_parent_wake(&self, child: &str) -> Result<(), QueueError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "UPDATE parent_wake_registrations SET is_active = 0 WHERE child_session_id = ?1",
            params![child],
        )?;
        Ok(())
    }

    pub fn active_parent_wakes(&self) -> Result<Vec<ParentWakeRow>, QueueError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT id, child_session_id, parent_session_id, period_seconds,
                    registered_at, last_wake_at, last_status_at_prev_wake, escalated, is_active
             FROM parent_wake_registrations WHERE is_active = 1",
        )?;
        let rows = stmt
            .query_map([], Self::row_to_parent_wake)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn parent_wake_for_child(&self, child: &str) -> Result<Option<ParentWakeRow>, QueueError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let row = conn
            .query_row(
                "SELECT id, child_session_id, parent_session_id, period_seconds,
                        registered_at, last_wake_at, last_status_at_prev_wake, escalated, is_active
                 FROM parent_wake_registrations WHERE child_session_id = ?1",
                params![child],
                Self::row_to_parent_wake,
            )
            .optional()?;
        Ok(row)
    }

    fn row_to_parent_wake(row: &rusqlite::Row<'_>) -> rusqlite::Result<ParentWakeRow> {
        let registered_at: String = row.get(4)?;
        let last_wake_at: Option<String> = row.get(5)?;
        let last_status_at_prev_wake: Option<String> = row.get(6)?;
        Ok(ParentWakeRow {
            id: row.get(0)?,
            child_session_id: row.get(1)?,
            parent_session_id: row.get(2)?,
            period_seconds: row.get(3)?,
            registered_at: DateTime::parse_from_rfc3339(&registered_at)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            last_wake_at: last_wake_at.and_then(|d| {
                DateTime::parse_from_rfc3339(&d)
                    .ok()
                    .map(|d| d.with_timezone(&Utc))
            }),
            last_status_at_prev_wake: last_status_at_prev_wake.and_then(|d| {
                DateTime::parse_from_rfc3339(&d)
                    .ok()
                    .map(|d| d.with_timezone(&Utc))
            }),
            escalated: row.get::<_, i64>(7)? != 0,
            is_active: row.get::<_, i64>(8)? != 0,
        })
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
