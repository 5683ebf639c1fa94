// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime configuration, shared by `sm-daemon` and tests that need a
//! fixture config without going through `clap::Parser::parse()`.

use std::time::Duration;

/// All timing/threshold knobs named by the component design, grouped the
/// way the teacher's `MuxConfig` groups its poll intervals.
#[derive(Debug, Clone, clap::Args)]
pub struct Config {
    /// Host to bind the local HTTP authority on.
    #[arg(long, default_value = "127.0.0.1", env = "SM_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8420, env = "SM_PORT")]
    pub port: u16,

    /// Path to the persisted session-registry JSON file.
    #[arg(
        long,
        default_value = "/tmp/claude-sessions/sessions.json",
        env = "SM_STATE_FILE"
    )]
    pub state_file: std::path::PathBuf,

    /// Path to the durable message-queue SQLite database.
    #[arg(
        long,
        default_value = "/tmp/claude-sessions/queue.db",
        env = "SM_QUEUE_DB"
    )]
    pub queue_db: std::path::PathBuf,

    /// Output-monitor capture interval, milliseconds.
    #[arg(long, default_value_t = 1000, env = "SM_CAPTURE_INTERVAL_MS")]
    pub capture_interval_ms: u64,

    /// Timeout on a single pane capture call, milliseconds.
    #[arg(long, default_value_t = 5000, env = "SM_CAPTURE_TIMEOUT_MS")]
    pub capture_timeout_ms: u64,

    /// Timeout on a single pane send-text call, milliseconds.
    #[arg(long, default_value_t = 2000, env = "SM_SEND_TIMEOUT_MS")]
    pub send_timeout_ms: u64,

    /// How long a trailing input prompt must be stable before `waiting_input`.
    #[arg(long, default_value_t = 2000, env = "SM_STABLE_WINDOW_MS")]
    pub stable_window_ms: u64,

    /// How long `waiting_input` persists before escalating to `idle`.
    #[arg(long, default_value_t = 300_000, env = "SM_IDLE_COOLDOWN_MS")]
    pub idle_cooldown_ms: u64,

    /// Minimum gap between repeated permission-prompt notifications.
    #[arg(long, default_value_t = 30_000, env = "SM_PERMISSION_DEBOUNCE_MS")]
    pub permission_debounce_ms: u64,

    /// Message-queue worker poll interval for deferred deliveries.
    #[arg(long, default_value_t = 5000, env = "SM_QUEUE_WORKER_POLL_MS")]
    pub queue_worker_poll_ms: u64,

    /// Maximum delivery attempts before a message is left undelivered.
    #[arg(long, default_value_t = 8, env = "SM_QUEUE_MAX_ATTEMPTS")]
    pub queue_max_attempts: u32,

    /// Initial retry backoff, milliseconds.
    #[arg(long, default_value_t = 1000, env = "SM_QUEUE_BACKOFF_MIN_MS")]
    pub queue_backoff_min_ms: u64,

    /// Cap on retry backoff, milliseconds.
    #[arg(long, default_value_t = 30_000, env = "SM_QUEUE_BACKOFF_MAX_MS")]
    pub queue_backoff_max_ms: u64,

    /// Parent-wake scheduler poll interval.
    #[arg(long, default_value_t = 10_000, env = "SM_PARENT_WAKE_POLL_MS")]
    pub parent_wake_poll_ms: u64,

    /// Default parent-wake digest period.
    #[arg(long, default_value_t = 600, env = "SM_PARENT_WAKE_PERIOD_SECS")]
    pub parent_wake_period_secs: u64,

    /// Escalated parent-wake digest period (no-progress case).
    #[arg(long, default_value_t = 300, env = "SM_PARENT_WAKE_ESCALATED_SECS")]
    pub parent_wake_escalated_secs: u64,

    /// Workspace lock staleness threshold, minutes.
    #[arg(long, default_value_t = 30, env = "SM_LOCK_STALE_MINUTES")]
    pub lock_stale_minutes: i64,

    /// Log format: "json" or "text".
    #[arg(long, default_value = "json", env = "SM_LOG_FORMAT")]
    pub log_format: String,

    /// Log level filter, used when `RUST_LOG` is not set.
    #[arg(long, default_value = "info", env = "SM_LOG_LEVEL")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        use clap::Parser;

        #[derive(clap::Parser)]
        struct Wrapper {
            #[command(flatten)]
            config: Config,
        }
        Wrapper::parse_from(std::iter::empty::<String>()).config
    }
}

impl Config {
    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn stable_window(&self) -> Duration {
        Duration::from_millis(self.stable_window_ms)
    }

    pub fn idle_cooldown(&self) -> Duration {
        Duration::from_millis(self.idle_cooldown_ms)
    }

    pub fn permission_debounce(&self) -> Duration {
        Duration::from_millis(self.permission_debounce_ms)
    }

    pub fn queue_worker_poll(&self) -> Duration {
        Duration::from_millis(self.queue_worker_poll_ms)
    }

    pub fn queue_backoff_min(&self) -> Duration {
        Duration::from_millis(self.queue_backoff_min_ms)
    }

    pub fn queue_backoff_max(&self) -> Duration {
        Duration::from_millis(self.queue_backoff_max_ms)
    }

    pub fn parent_wake_poll(&self) -> Duration {
        Duration::from_millis(self.parent_wake_poll_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
