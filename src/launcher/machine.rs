//! The launch state machine.
//!
//! One spawned task owns all launcher state. Commands arrive on an `mpsc`
//! channel and are applied in order, so there is no concurrent mutation of
//! the stage, the cached signals, or the persisted decision. Network calls
//! (verification, remote config) run as spawned tasks and post their
//! completions back onto the same channel.
//!
//! A single merge timer coalesces bursts of attribution and deep-link
//! arrivals: every arrival cancels and reschedules the timer, and evaluation
//! runs when it fires, so a late deep link within the window is merged
//! before the first resolution attempt.

use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

use crate::attribution::{AttributionSnapshot, DeepLinkPayload};
use crate::config::HostConfig;
use crate::errors::{AttributionError, ConfigError, HostError};
use crate::events::{LaunchCommand, LaunchEvent, PushPromptOutcome};
use crate::launcher::handle::LauncherHandle;
use crate::launcher::{AppMode, LaunchSnapshot, LaunchStage, ResolvedDestination};
use crate::net::{ConfigResolver, HttpInstallVerifier, InstallVerifier, RemoteConfigClient};
use crate::store::{keys, StateStoreExt, StateStoreHandle};

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// The launch orchestrator. Construct, then [`start`](Launcher::start) to
/// obtain the handle and the run-loop join handle.
pub struct Launcher {
    config: HostConfig,
    store: StateStoreHandle,
    resolver: Arc<dyn ConfigResolver>,
    verifier: Arc<dyn InstallVerifier>,

    cmd_tx: mpsc::Sender<LaunchCommand>,
    cmd_rx: mpsc::Receiver<LaunchCommand>,
    event_tx: broadcast::Sender<LaunchEvent>,
    shared: Arc<RwLock<LaunchSnapshot>>,
    running: bool,

    // Signal cache for the current launch.
    attribution: Option<AttributionSnapshot>,
    deep_link: Option<DeepLinkPayload>,
    verification_done: bool,
    /// At most one evaluation chain (verification or config fetch) is in
    /// flight at a time.
    resolving: bool,
    /// Parked at the push-permission suspension point.
    parked_for_push: bool,
    merge_deadline: Option<Instant>,
}

impl Launcher {
    /// Creates a launcher wired to the real HTTP clients.
    pub fn new(config: HostConfig, store: StateStoreHandle) -> Self {
        let http = reqwest::Client::new();
        let resolver: Arc<dyn ConfigResolver> = Arc::new(RemoteConfigClient::new(
            http.clone(),
            config.config_endpoint.clone(),
            config.request_timeout,
        ));
        let verifier: Arc<dyn InstallVerifier> = Arc::new(HttpInstallVerifier::new(
            http,
            config.verification_base.clone(),
            config.app_id.clone(),
            config.dev_key.clone(),
            config.identity.device_id.clone(),
            config.request_timeout,
        ));
        Self::with_services(config, store, resolver, verifier)
    }

    /// Creates a launcher over explicit resolver/verifier implementations.
    pub fn with_services(
        config: HostConfig,
        store: StateStoreHandle,
        resolver: Arc<dyn ConfigResolver>,
        verifier: Arc<dyn InstallVerifier>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_capacity);
        let (event_tx, _first_rx) = broadcast::channel(config.channel_capacity);

        Self {
            config,
            store,
            resolver,
            verifier,
            cmd_tx,
            cmd_rx,
            event_tx,
            shared: Arc::new(RwLock::new(LaunchSnapshot::default())),
            running: false,
            attribution: None,
            deep_link: None,
            verification_done: false,
            resolving: false,
            parked_for_push: false,
            merge_deadline: None,
        }
    }

    /// Starts the run loop and returns the handle plus its join handle.
    /// Consuming `self` makes a second start a compile error; the `running`
    /// guard covers handles constructed by other means.
    pub fn start(self) -> Result<(LauncherHandle, JoinHandle<()>), HostError> {
        if self.running {
            return Err(HostError::AlreadyRunning);
        }

        let handle = LauncherHandle::new(
            self.cmd_tx.clone(),
            self.event_tx.clone(),
            self.shared.clone(),
            self.store.clone(),
            self.config.push_publish_delay,
        );
        let join_handle = tokio::spawn(self.run());

        Ok((handle, join_handle))
    }

    /// The run loop: applies commands in order and fires the merge timer.
    /// Ends on shutdown or when every command sender is dropped.
    async fn run(mut self) {
        self.running = true;
        info!("launcher started");

        loop {
            let merge_deadline = self.merge_deadline;
            tokio::select! {
                maybe_cmd = self.cmd_rx.recv() => {
                    match maybe_cmd {
                        Some(cmd) => {
                            if self.handle_command(cmd) {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = tokio::time::sleep_until(merge_deadline.unwrap_or_else(Instant::now)),
                    if merge_deadline.is_some() =>
                {
                    self.merge_deadline = None;
                    self.evaluate();
                }
            }
        }

        let _ = self.event_tx.send(LaunchEvent::LauncherShutdown);
        info!("launcher stopped");
    }

    /// Applies one command. Returns `true` when the loop should end.
    fn handle_command(&mut self, cmd: LaunchCommand) -> bool {
        match cmd {
            LaunchCommand::Attribution { snapshot } => {
                if self.attribution.is_some() {
                    warn!("attribution snapshot already cached, keeping the first");
                } else {
                    debug!("attribution snapshot cached ({} keys)", snapshot.len());
                    self.attribution = Some(snapshot);
                }
                self.arm_merge_timer();
            }
            LaunchCommand::AttributionFailed { reason } => {
                warn!("attribution failed: {}", reason);
                self.arm_merge_timer();
            }
            LaunchCommand::DeepLink { payload } => {
                if self.stage() == LaunchStage::Bootstrapping {
                    debug!("deep link cached for merge");
                    self.deep_link = Some(payload);
                    self.arm_merge_timer();
                } else {
                    debug!("deep link after bootstrap, ignored");
                }
            }
            LaunchCommand::ConnectivityChanged { reachable } => {
                self.on_connectivity(reachable);
            }
            LaunchCommand::PushPromptResolved { outcome } => {
                self.resume_from_push_prompt(outcome);
            }
            LaunchCommand::PushToken { token } => {
                self.store.set(keys::PUSH_TOKEN, &token);
            }
            LaunchCommand::PublishTempDestination { url } => {
                let _ = self
                    .event_tx
                    .send(LaunchEvent::TempDestinationReady { url });
            }
            LaunchCommand::VerificationCompleted { result } => {
                self.on_verification(result);
            }
            LaunchCommand::ConfigResolved { result } => {
                self.on_config(result);
            }
            LaunchCommand::Shutdown { reply } => {
                let _ = reply.send(Ok(()));
                return true;
            }
        }
        false
    }

    /// Cancel-and-reschedule: a new signal restarts the merge window.
    fn arm_merge_timer(&mut self) {
        self.merge_deadline = Some(Instant::now() + self.config.merge_window);
    }

    /// The resolution pipeline, run when the merge timer fires.
    fn evaluate(&mut self) {
        if self.resolving || self.parked_for_push {
            debug!("evaluation already in flight, skipping");
            return;
        }
        if self.stage() == LaunchStage::WebHost {
            debug!("destination already adopted, skipping evaluation");
            return;
        }

        // 1. Nothing from the provider: cache or fallback.
        let Some(snapshot) = self.attribution.clone() else {
            self.resolve_from_cache_or_fallback();
            return;
        };

        // 2. A user previously routed to fallback stays there.
        if self.persisted_mode() == Some(AppMode::FallbackMode) {
            self.activate_fallback();
            return;
        }

        // 3. First launch with an organic install: verification round-trip
        //    after a grace window for a late deep link.
        if self.is_first_launch() && snapshot.is_organic() && !self.verification_done {
            self.spawn_verification();
            return;
        }

        self.continue_pipeline(snapshot);
    }

    /// Steps 4-6, shared by the normal path and the post-verification path.
    fn continue_pipeline(&mut self, snapshot: AttributionSnapshot) {
        // 4. A deferred push/deep-link delivery already resolved the
        //    destination: adopt it directly.
        if let Some(url) = self
            .store
            .get(keys::TEMP_URL)
            .and_then(|s| Url::parse(&s).ok())
        {
            info!("adopting cached temporary destination");
            self.adopt_destination(url);
            return;
        }

        // 5. Push-permission gate; an explicit suspension point.
        if self.push_prompt_needed() {
            info!("parking for push-permission prompt");
            self.parked_for_push = true;
            let _ = self.event_tx.send(LaunchEvent::PushPromptRequested);
            return;
        }

        // 6. Live resolution.
        self.spawn_config_fetch(snapshot);
    }

    fn spawn_verification(&mut self) {
        self.resolving = true;

        let cmd_tx = self.cmd_tx.clone();
        let grace = self.config.organic_grace;
        let verifier = self.verifier.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let result = verifier.verify().await;
            let _ = cmd_tx
                .send(LaunchCommand::VerificationCompleted { result })
                .await;
        });
    }

    fn on_verification(&mut self, result: Result<AttributionSnapshot, AttributionError>) {
        self.resolving = false;
        self.verification_done = true;

        match result {
            Ok(verified) => {
                // The verified body becomes the new base; cached deep-link
                // keys fill gaps only.
                let merged = match &self.deep_link {
                    Some(deep_link) => verified.merged_with_deep_link(deep_link),
                    None => verified,
                };
                self.attribution = Some(merged.clone());
                self.continue_pipeline(merged);
            }
            Err(e) => {
                warn!("install verification failed: {}", e);
                self.activate_fallback();
            }
        }
    }

    fn spawn_config_fetch(&mut self, snapshot: AttributionSnapshot) {
        self.resolving = true;

        let merged = match &self.deep_link {
            Some(deep_link) => snapshot.merged_with_deep_link(deep_link),
            None => snapshot,
        };

        let cmd_tx = self.cmd_tx.clone();
        let resolver = self.resolver.clone();
        let identity = self.config.identity.clone();
        let push_token = self.store.get(keys::PUSH_TOKEN);
        tokio::spawn(async move {
            let result = resolver.resolve(merged, identity, push_token).await;
            let _ = cmd_tx.send(LaunchCommand::ConfigResolved { result }).await;
        });
    }

    fn on_config(&mut self, result: Result<ResolvedDestination, ConfigError>) {
        self.resolving = false;

        match result {
            Ok(destination) => {
                self.store
                    .set(keys::SAVED_DESTINATION, destination.url.as_str());
                self.store.set_u64(keys::SAVED_EXPIRES, destination.expires);
                self.store
                    .set(keys::APP_MODE, AppMode::WebHostMode.as_str());
                self.store.set_bool(keys::HAS_EVER_RUN, true);

                let _ = self.event_tx.send(LaunchEvent::DestinationResolved {
                    url: destination.url.clone(),
                });
                self.adopt_destination(destination.url);
            }
            Err(e) => {
                warn!("destination resolution failed: {}", e);
                self.resolve_from_cache_or_fallback();
            }
        }
    }

    /// Cache fallback, TTL ignored. While offline the offline presentation
    /// stays up instead of adopting the cache.
    fn resolve_from_cache_or_fallback(&mut self) {
        if self.stage() == LaunchStage::Offline {
            debug!("offline, keeping offline presentation");
            return;
        }

        match self
            .store
            .get(keys::SAVED_DESTINATION)
            .and_then(|s| Url::parse(&s).ok())
        {
            Some(url) => {
                info!("falling back to cached destination");
                self.adopt_destination(url);
            }
            None => self.activate_fallback(),
        }
    }

    /// Routes to the fallback UI and pins the decision.
    fn activate_fallback(&mut self) {
        self.store.set(keys::APP_MODE, AppMode::FallbackMode.as_str());
        self.store.set_bool(keys::HAS_EVER_RUN, true);
        self.transition(LaunchStage::FallbackUI);
    }

    /// Connectivity handling, independent of the resolution pipeline.
    /// Regaining connectivity does not re-run resolution; that happens on
    /// the next cold start.
    fn on_connectivity(&mut self, reachable: bool) {
        if reachable {
            debug!("connectivity regained, resolution deferred to next cold start");
            return;
        }

        match self.persisted_mode() {
            Some(AppMode::WebHostMode) => self.transition(LaunchStage::Offline),
            _ => self.activate_fallback(),
        }
    }

    fn resume_from_push_prompt(&mut self, outcome: PushPromptOutcome) {
        if !self.parked_for_push {
            debug!("push prompt outcome without a pending prompt, ignored");
            return;
        }
        self.parked_for_push = false;

        match outcome {
            PushPromptOutcome::Granted => self.store.set_bool(keys::PUSH_ACCEPTED, true),
            PushPromptOutcome::Dismissed => {
                self.store.set_u64(keys::LAST_PUSH_PROMPT, now_epoch_secs());
            }
            PushPromptOutcome::DeniedPermanently => {
                self.store.set_bool(keys::PUSH_DECLINED, true);
            }
        }

        // Re-enter the pipeline at the resolution step.
        let snapshot = self.attribution.clone().unwrap_or_default();
        self.spawn_config_fetch(snapshot);
    }

    fn push_prompt_needed(&self) -> bool {
        if self.store.get_bool(keys::PUSH_ACCEPTED) || self.store.get_bool(keys::PUSH_DECLINED) {
            return false;
        }
        match self.store.get_u64(keys::LAST_PUSH_PROMPT) {
            Some(last_ask) => {
                now_epoch_secs().saturating_sub(last_ask)
                    >= self.config.push_reask_interval.as_secs()
            }
            None => true,
        }
    }

    fn is_first_launch(&self) -> bool {
        !self.store.get_bool(keys::HAS_EVER_RUN)
    }

    fn persisted_mode(&self) -> Option<AppMode> {
        self.store
            .get(keys::APP_MODE)
            .and_then(|s| AppMode::parse(&s))
    }

    fn stage(&self) -> LaunchStage {
        self.shared
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .stage
    }

    fn adopt_destination(&mut self, url: Url) {
        self.shared
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .destination = Some(url);
        self.transition(LaunchStage::WebHost);
    }

    fn transition(&mut self, stage: LaunchStage) {
        let changed = {
            let mut shared = self.shared.write().unwrap_or_else(|e| e.into_inner());
            if shared.stage == stage {
                false
            } else {
                shared.stage = stage;
                true
            }
        };

        if changed {
            info!("launch stage -> {:?}", stage);
            let _ = self.event_tx.send(LaunchEvent::StageChanged { stage });
        }
    }
}
