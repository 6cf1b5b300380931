//! Launcher command and event types.
//!
//! Every external callback (attribution provider, connectivity, push
//! permission UX, network completions) becomes a [`LaunchCommand`] posted to
//! the launcher's command channel, and the launcher publishes
//! [`LaunchEvent`]s on a broadcast channel. This replaces ad-hoc
//! string-keyed notification fan-in with typed channels: one variant per
//! concern, consumed by exactly the components that need it.

use tokio::sync::oneshot;
use url::Url;

use crate::attribution::{AttributionSnapshot, DeepLinkPayload};
use crate::errors::{AttributionError, ConfigError, HostError};
use crate::launcher::{LaunchStage, ResolvedDestination};

/// Outcome of the push-permission prompt surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushPromptOutcome {
    /// Permission granted by the system dialog.
    Granted,
    /// Prompt dismissed/skipped; eligible to be asked again later.
    Dismissed,
    /// System dialog denied; never ask again.
    DeniedPermanently,
}

/// A deep-link resolution event from the attribution provider.
#[derive(Debug, Clone, PartialEq)]
pub enum DeepLinkResolution {
    Found { payload: DeepLinkPayload },
    NotFound,
}

/// Commands consumed by the launcher's serialized run loop.
#[derive(Debug)]
pub enum LaunchCommand {
    // ****************************************
    // ** External signals
    /// Conversion data arrived from the attribution provider.
    Attribution { snapshot: AttributionSnapshot },
    /// The conversion callback reported failure.
    AttributionFailed { reason: String },
    /// A resolved deep-link payload arrived.
    DeepLink { payload: DeepLinkPayload },
    /// Reachability transitioned.
    ConnectivityChanged { reachable: bool },

    // ****************************************
    // ** Shell interaction
    /// The user answered the push-permission prompt.
    PushPromptResolved { outcome: PushPromptOutcome },
    /// A push token became available.
    PushToken { token: String },
    /// Delayed publication hop for a pushed temporary destination.
    PublishTempDestination { url: Url },

    // ****************************************
    // ** Async completions (posted by spawned tasks)
    /// The organic-install verification round-trip finished.
    VerificationCompleted {
        result: Result<AttributionSnapshot, AttributionError>,
    },
    /// The remote-config fetch finished.
    ConfigResolved {
        result: Result<ResolvedDestination, ConfigError>,
    },

    // ****************************************
    // ** Lifecycle
    /// Gracefully stop the run loop.
    Shutdown {
        reply: oneshot::Sender<Result<(), HostError>>,
    },
}

/// Events emitted by the launcher.
#[derive(Debug, Clone)]
pub enum LaunchEvent {
    /// The current launch stage changed.
    StageChanged { stage: LaunchStage },
    /// A destination was resolved and persisted.
    DestinationResolved { url: Url },
    /// The pipeline is parked waiting for the push-permission prompt.
    PushPromptRequested,
    /// A pushed temporary destination is ready for the UI layer.
    TempDestinationReady { url: Url },
    /// The run loop exited.
    LauncherShutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_cloneable_for_broadcast() {
        let e = LaunchEvent::StageChanged {
            stage: LaunchStage::WebHost,
        };
        let f = e.clone();
        assert!(matches!(f, LaunchEvent::StageChanged { .. }));
    }

    #[test]
    fn command_debug_formatting() {
        let cmd = LaunchCommand::ConnectivityChanged { reachable: false };
        assert!(format!("{:?}", cmd).contains("ConnectivityChanged"));
    }
}
