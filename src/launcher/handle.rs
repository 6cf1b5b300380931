//! Cloneable handle to a running launcher.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::debug;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::attribution::{AttributionSnapshot, DeepLinkPayload};
use crate::errors::HostError;
use crate::events::{LaunchCommand, LaunchEvent, PushPromptOutcome};
use crate::launcher::{push, LaunchSnapshot};
use crate::store::{keys, StateStoreHandle};

/// Handle held by the embedding shell: posts commands to the run loop,
/// exposes the readable `(stage, destination)` pair, and hands out event
/// subscriptions.
#[derive(Clone)]
pub struct LauncherHandle {
    cmd_tx: mpsc::Sender<LaunchCommand>,
    event_tx: broadcast::Sender<LaunchEvent>,
    shared: Arc<RwLock<LaunchSnapshot>>,
    store: StateStoreHandle,
    push_publish_delay: Duration,
}

impl LauncherHandle {
    pub(crate) fn new(
        cmd_tx: mpsc::Sender<LaunchCommand>,
        event_tx: broadcast::Sender<LaunchEvent>,
        shared: Arc<RwLock<LaunchSnapshot>>,
        store: StateStoreHandle,
        push_publish_delay: Duration,
    ) -> Self {
        Self {
            cmd_tx,
            event_tx,
            shared,
            store,
            push_publish_delay,
        }
    }

    /// Subscribes to launcher events.
    pub fn subscribe(&self) -> broadcast::Receiver<LaunchEvent> {
        self.event_tx.subscribe()
    }

    /// The current `(stage, destination)` pair.
    pub fn current(&self) -> LaunchSnapshot {
        self.shared
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Clone of the command sender, for wiring adapters such as
    /// [`AttributionAggregator`](crate::attribution::AttributionAggregator)
    /// and [`ConnectivityMonitor`](crate::connectivity::ConnectivityMonitor).
    pub fn command_sender(&self) -> mpsc::Sender<LaunchCommand> {
        self.cmd_tx.clone()
    }

    /// Posts a fresh attribution snapshot.
    pub async fn on_attribution_update(
        &self,
        snapshot: AttributionSnapshot,
    ) -> Result<(), HostError> {
        self.send(LaunchCommand::Attribution { snapshot }).await
    }

    /// Posts a resolved deep-link payload.
    pub async fn on_deep_link(&self, payload: DeepLinkPayload) -> Result<(), HostError> {
        self.send(LaunchCommand::DeepLink { payload }).await
    }

    /// Posts a reachability transition.
    pub async fn on_connectivity_change(&self, reachable: bool) -> Result<(), HostError> {
        self.send(LaunchCommand::ConnectivityChanged { reachable })
            .await
    }

    /// Resumes the machine parked at the push-permission suspension point.
    pub async fn resolve_push_prompt(&self, outcome: PushPromptOutcome) -> Result<(), HostError> {
        self.send(LaunchCommand::PushPromptResolved { outcome })
            .await
    }

    /// Caches a push token for future config requests.
    pub async fn set_push_token(&self, token: impl Into<String>) -> Result<(), HostError> {
        self.send(LaunchCommand::PushToken {
            token: token.into(),
        })
        .await
    }

    /// Feeds an inbound push payload. A `url` field (top-level or under
    /// `data.url`) is cached as the temporary destination and, after a short
    /// fixed delay, published as [`LaunchEvent::TempDestinationReady`]
    /// regardless of the current stage. Must be called from within a tokio
    /// runtime.
    pub fn on_push_payload(&self, payload: &Value) {
        let Some(url) = push::extract_push_url(payload) else {
            debug!("push payload without destination url, ignored");
            return;
        };

        self.store.set(keys::TEMP_URL, url.as_str());

        let cmd_tx = self.cmd_tx.clone();
        let delay = self.push_publish_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = cmd_tx
                .send(LaunchCommand::PublishTempDestination { url })
                .await;
        });
    }

    /// Gracefully stops the run loop, waiting for it to acknowledge.
    pub async fn shutdown(&self) -> Result<(), HostError> {
        let (tx, rx) = oneshot::channel();

        self.cmd_tx
            .send(LaunchCommand::Shutdown { reply: tx })
            .await
            .map_err(|_| HostError::ChannelClosed)?;

        rx.await.map_err(|_| HostError::ChannelClosed)?
    }

    async fn send(&self, cmd: LaunchCommand) -> Result<(), HostError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| HostError::ChannelClosed)
    }
}
