//! Launch orchestration and web-surface governance for embedded app shells.
//!
//! Two coupled subsystems:
//!
//! - The [`launcher`]: a state machine that merges delayed, out-of-order
//!   attribution and deep-link signals, resolves a target mode (native UI,
//!   remote web destination, or offline), persists the decision, and
//!   re-evaluates on connectivity loss.
//! - The [`guardian`]: a policy layer over every navigation event of the
//!   embedded web surface — redirect-loop limits, scheme routing, popup
//!   lifecycle, and cookie persistence across launches.
//!
//! The crate is UI-toolkit agnostic: the shell adapts platform callbacks to
//! the typed commands and primitive navigation events defined here, and
//! applies the decisions and directives handed back.

pub mod attribution;
pub mod config;
pub mod connectivity;
pub mod cookies;
pub mod errors;
pub mod events;
pub mod guardian;
pub mod launcher;
pub mod net;
pub mod store;

pub use config::{DeviceIdentity, GuardianConfig, HostConfig};
pub use errors::{AttributionError, ConfigError, HostError, NavigationError};
pub use guardian::{Directive, NavigationGuardian, NavigationRequest, PolicyDecision, SurfaceId};
pub use launcher::{
    AppMode, Launcher, LauncherHandle, LaunchSnapshot, LaunchStage, ResolvedDestination,
};
