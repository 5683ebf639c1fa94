// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `AppState`: the daemon's process-wide collaborator graph, wired once at
//! startup and handed to every handler via axum's `State` extractor.

use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use sm_core::arbiter::DeliveryArbiter;
use sm_core::config::Config;
use sm_core::event_log::EventLog;
use sm_core::notifier::{NullNotifier, Notifier};
use sm_core::pane::{NullPaneController, PaneController};
use sm_core::parent_wake::ParentWakeScheduler;
use sm_core::provider::ProviderRegistry;
use sm_core::queue::storage::QueueStorage;
use sm_core::queue::MessageQueue;
use sm_core::registry::SessionRegistry;
use sm_core::store::StateStore;

/// Everything a handler needs, grouped the way the teacher's `MuxState`
/// groups its collaborators.
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    pub queue: Arc<MessageQueue>,
    pub arbiter: Arc<DeliveryArbiter>,
    pub parent_wake: Arc<ParentWakeScheduler>,
    pub pane: Arc<dyn PaneController>,
    pub providers: Arc<ProviderRegistry>,
    pub notifier: Arc<dyn Notifier>,
    pub event_log: Arc<EventLog>,
    pub shutdown: CancellationToken,
    /// Live output-monitor tasks, keyed by session id. Not owned by
    /// `SessionRegistry` (which only tracks each monitor's cancellation
    /// token) because the health report needs the live task count, and
    /// spawning/tracking the handle is this crate's job, not the core's.
    pub monitors: DashMap<String, tokio::task::JoinHandle<()>>,
}

impl AppState {
    /// Build the full collaborator graph for a fresh process.
    ///
    /// The pane controller and notifier are bound to their no-op doubles:
    /// wiring a real terminal multiplexer or chat transport is out of
    /// scope here, and every collaborator above this layer only depends on
    /// the trait objects.
    pub fn new(config: Config) -> Result<Arc<Self>, anyhow::Error> {
        let config = Arc::new(config);
        let pane: Arc<dyn PaneController> = Arc::new(NullPaneController::new());
        let notifier: Arc<dyn Notifier> = Arc::new(NullNotifier::new());
        let providers = Arc::new(ProviderRegistry::default());

        let store = StateStore::new(config.state_file.clone());
        let registry = Arc::new(SessionRegistry::new(store, pane.clone()));

        let queue_storage = Arc::new(QueueStorage::open(&config.queue_db)?);
        let parent_wake = Arc::new(ParentWakeScheduler::new(queue_storage.clone()));
        let arbiter = Arc::new(DeliveryArbiter::with_collaborators(
            notifier.clone(),
            parent_wake.clone(),
        ));

        let queue = MessageQueue::new(
            queue_storage,
            pane.clone(),
            providers.clone(),
            registry.clone(),
            notifier.clone(),
            arbiter.clone(),
            parent_wake.clone(),
            config.clone(),
        );

        let event_log_dir = config
            .state_file
            .parent()
            .map(|dir| dir.join("events"));
        let event_log = Arc::new(EventLog::new(event_log_dir));

        Ok(Arc::new(Self {
            config,
            registry,
            queue,
            arbiter,
            parent_wake,
            pane,
            providers,
            notifier,
            event_log,
            shutdown: CancellationToken::new(),
            monitors: DashMap::new(),
        }))
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
