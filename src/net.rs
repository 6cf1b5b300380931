//! Network exchanges: remote-config resolution and install verification.
//!
//! Both exchanges are simple request/response calls over a shared
//! `reqwest::Client`. The launcher talks to them through the [`ConfigResolver`]
//! and [`InstallVerifier`] seams so tests can substitute canned outcomes.

pub mod remote_config;
pub mod verify;

pub use remote_config::RemoteConfigClient;
pub use verify::HttpInstallVerifier;

use std::future::Future;
use std::pin::Pin;

use crate::attribution::AttributionSnapshot;
use crate::config::DeviceIdentity;
use crate::errors::{AttributionError, ConfigError};
use crate::launcher::ResolvedDestination;

/// Boxed future returned by the network seams.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Resolves a merged snapshot into a destination.
pub trait ConfigResolver: Send + Sync + 'static {
    fn resolve(
        &self,
        snapshot: AttributionSnapshot,
        identity: DeviceIdentity,
        push_token: Option<String>,
    ) -> BoxFuture<Result<ResolvedDestination, ConfigError>>;
}

/// Performs the organic-install verification round-trip.
pub trait InstallVerifier: Send + Sync + 'static {
    fn verify(&self) -> BoxFuture<Result<AttributionSnapshot, AttributionError>>;
}
