// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `SessionRegistry`: the in-memory map of live sessions, backed by
//! [`StateStore`] and reconciled against the pane controller on startup.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{DeliveryResult, RegistryError};
use crate::pane::PaneController;
use crate::session::{ProviderTag, Session, SessionStatus};
use crate::store::StateStore;

/// A live registry entry: the session record plus the cancellation token
/// for its [`crate::monitor::OutputMonitor`] task, so the registry can
/// refuse to spawn a second monitor for the same session.
pub struct Entry {
    pub session: RwLock<Session>,
    pub monitor_token: CancellationToken,
}

pub struct SessionRegistry {
    entries: RwLock<HashMap<String, Arc<Entry>>>,
    store: StateStore,
    pane: Arc<dyn PaneController>,
}

pub struct CreateParams {
    pub name: String,
    pub working_dir: std::path::PathBuf,
    pub provider: ProviderTag,
    pub command: String,
    pub parent_session_id: Option<String>,
    pub spawn_prompt: Option<String>,
}

impl SessionRegistry {
    pub fn new(store: StateStore, pane: Arc<dyn PaneController>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            store,
            pane,
        }
    }

    fn generate_id(existing: &HashMap<String, Arc<Entry>>) -> String {
        loop {
            let id: String = (0..8)
                .map(|_| {
                    let n = rand::random::<u8>() % 16;
                    std::char::from_digit(n as u32, 16).unwrap_or('0')
                })
                .collect();
            if !existing.contains_key(&id) {
                return id;
            }
        }
    }

    pub async fn create(&self, params: CreateParams) -> Result<Session, RegistryError> {
        let pane_name = Session::default_pane_name(&params.name);
        self.pane
            .create_with_command(&pane_name, &params.working_dir, &params.command)
            .await?;

        let now = Utc::now();
        let spawned_at = if params.spawn_prompt.is_some() {
            Some(now)
        } else {
            None
        };
        let mut entries = self.entries.write().await;
        let id = Self::generate_id(&entries);
        let session = Session {
            id: id.clone(),
            name: params.name,
            pane_name,
            working_dir: params.working_dir,
            git_remote_url: None,
            provider: params.provider,
            status: SessionStatus::Starting,
            created_at: now,
            last_activity: now,
            friendly_name: None,
            current_task: None,
            parent_session_id: params.parent_session_id,
            spawn_prompt: params.spawn_prompt,
            spawned_at,
            notify_chat_id: None,
            notify_root_message_id: None,
            notify_topic_id: None,
            transcript_path: None,
            codex_thread_id: None,
            agent_status_text: None,
            agent_status_at: None,
            context_monitor_enabled: false,
            context_monitor_notify: false,
        };

        entries.insert(
            id.clone(),
            Arc::new(Entry {
                session: RwLock::new(session.clone()),
                monitor_token: CancellationToken::new(),
            }),
        );
        self.persist_locked(&entries).await?;
        info!(session_id = %id, "session created");
        Ok(session)
    }

    /// Derive the shell command used to launch a provider's agent CLI,
    /// optionally pinned to a specific model. `create_with_command` hands
    /// this straight to the pane controller.
    fn command_for(provider: ProviderTag, model: Option<&str>) -> String {
        let base = match provider {
            ProviderTag::Claude => "claude",
            ProviderTag::Codex => "codex",
            ProviderTag::CodexApp => "codex --app",
        };
        match model {
            Some(model) => format!("{base} --model {model}"),
            None => base.to_string(),
        }
    }

    /// Create a child session under `parent_id`, inheriting its
    /// `working_dir` and `provider` unless overridden. The spawn prompt is
    /// recorded on the child record but not delivered here — the caller
    /// (the HTTP handler) hands it to `MessageQueue::queue_message` with
    /// `DeliveryMode::Urgent` once the new pane is ready.
    pub async fn spawn_child(
        &self,
        parent_id: &str,
        prompt: &str,
        model: Option<&str>,
        working_dir: Option<std::path::PathBuf>,
        name: Option<String>,
    ) -> Result<Session, RegistryError> {
        let parent = self
            .get(parent_id)
            .await
            .ok_or_else(|| RegistryError::NotFound(parent_id.to_string()))?;

        let working_dir = working_dir.unwrap_or_else(|| parent.working_dir.clone());
        let name = name.unwrap_or_else(|| format!("{}-child-{}", parent.name, &uuid::Uuid::new_v4().to_string()[..4]));
        let command = Self::command_for(parent.provider, model);

        self.create(CreateParams {
            name,
            working_dir,
            provider: parent.provider,
            command,
            parent_session_id: Some(parent_id.to_string()),
            spawn_prompt: Some(prompt.to_string()),
        })
        .await
    }

    pub async fn get(&self, id: &str) -> Option<Session> {
        let entries = self.entries.read().await;
        match entries.get(id) {
            Some(entry) => Some(entry.session.read().await.clone()),
            None => None,
        }
    }

    pub async fn get_by_name(&self, name: &str) -> Option<Session> {
        let entries = self.entries.read().await;
        for entry in entries.values() {
            let session = entry.session.read().await;
            if session.name == name {
                return Some(session.clone());
            }
        }
        None
    }

    pub async fn list(&self, include_stopped: bool) -> Vec<Session> {
        let entries = self.entries.read().await;
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries.values() {
            let session = entry.session.read().await;
            if include_stopped || session.status != SessionStatus::Stopped {
                out.push(session.clone());
            }
        }
        out
    }

    pub async fn monitor_token(&self, id: &str) -> Option<CancellationToken> {
        let entries = self.entries.read().await;
        entries.get(id).map(|e| e.monitor_token.clone())
    }

    pub async fn update_status(
        &self,
        id: &str,
        status: SessionStatus,
    ) -> Result<(), RegistryError> {
        let entries = self.entries.read().await;
        let entry = entries
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        {
            let mut session = entry.session.write().await;
            session.status = status;
            session.last_activity = Utc::now();
        }
        self.persist_locked(&entries).await
    }

    pub async fn update_task(&self, id: &str, task: String) -> Result<(), RegistryError> {
        let entries = self.entries.read().await;
        let entry = entries
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        {
            let mut session = entry.session.write().await;
            session.current_task = Some(task);
        }
        self.persist_locked(&entries).await
    }

    pub async fn set_agent_status(
        &self,
        id: &str,
        text: String,
    ) -> Result<(), RegistryError> {
        let entries = self.entries.read().await;
        let entry = entries
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        {
            let mut session = entry.session.write().await;
            session.agent_status_text = Some(text);
            session.agent_status_at = Some(Utc::now());
        }
        self.persist_locked(&entries).await
    }

    pub async fn kill(&self, id: &str) -> Result<(), RegistryError> {
        let entries = self.entries.read().await;
        let entry = entries
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let pane_name = entry.session.read().await.pane_name.clone();
        self.pane.kill(&pane_name).await?;
        entry.monitor_token.cancel();
        {
            let mut session = entry.session.write().await;
            session.status = SessionStatus::Stopped;
            session.last_activity = Utc::now();
        }
        self.persist_locked(&entries).await
    }

    pub async fn open_terminal(&self, id: &str) -> Result<(), RegistryError> {
        let entries = self.entries.read().await;
        let entry = entries
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let pane_name = entry.session.read().await.pane_name.clone();
        self.pane.open_in_terminal(&pane_name).await?;
        Ok(())
    }

    /// Deliver straight to the pane, bypassing the message queue entirely.
    /// Returns `Failed` rather than an error for an unknown target id, so
    /// HTTP handlers can surface it as an ordinary delivery outcome.
    pub async fn send_input(&self, id: &str, text: &str) -> Result<DeliveryResult, RegistryError> {
        let entries = self.entries.read().await;
        let Some(entry) = entries.get(id) else {
            return Ok(DeliveryResult::Failed);
        };
        let pane_name = entry.session.read().await.pane_name.clone();
        match self.pane.send_text(&pane_name, text).await {
            Ok(()) => {
                let mut session = entry.session.write().await;
                session.last_activity = Utc::now();
                Ok(DeliveryResult::Delivered)
            }
            Err(_) => Ok(DeliveryResult::Failed),
        }
    }

    /// Replay persisted sessions against the pane controller at startup.
    /// Dead panes are dropped from the registry and from the persisted
    /// file; live ones are kept verbatim with no status mutation. Running
    /// this twice with no change in pane existence is a no-op both times.
    pub async fn reconcile(&self) -> Result<(), RegistryError> {
        let persisted = self.store.load().await?;
        let mut entries = self.entries.write().await;
        entries.clear();

        let mut kept = Vec::new();
        for session in persisted {
            if self.pane.exists(&session.pane_name).await {
                entries.insert(
                    session.id.clone(),
                    Arc::new(Entry {
                        session: RwLock::new(session.clone()),
                        monitor_token: CancellationToken::new(),
                    }),
                );
                kept.push(session);
            } else {
                warn!(session_id = %session.id, pane = %session.pane_name, "dropping session with no matching pane");
            }
        }

        self.store.save(&kept).await?;
        info!(kept = kept.len(), "registry reconciliation complete");
        Ok(())
    }

    async fn persist_locked(
        &self,
        entries: &HashMap<String, Arc<Entry>>,
    ) -> Result<(), RegistryError> {
        let mut snapshot = Vec::with_capacity(entries.len());
        for entry in entries.values() {
            snapshot.push(entry.session.read().await.clone());
        }
        self.store.save(&snapshot).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
