//! Error taxonomy for the launch orchestrator and the navigation guardian.
//!
//! Nothing in this crate surfaces an unrecoverable error to the embedding
//! shell: every failure below is resolved locally to a concrete next stage
//! (FallbackUI, Offline) or a default value. The enums exist so the *reason*
//! still travels through logs and internal channels in a typed form.

/// Failures at the attribution-provider boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttributionError {
    #[error("conversion data failed: {0}")]
    ConversionFailed(String),

    #[error("install verification failed: {0}")]
    Verification(String),
}

/// Failures of the remote-config exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("network error: {0}")]
    NetworkError(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("request timed out")]
    Timeout,
}

/// Navigation failures, consumed entirely inside the guardian.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("too many redirects")]
    TooManyRedirects,

    #[error("load failed: {0}")]
    LoadFailed(String),
}

/// Key/value store failures. Reads that fail are treated as "value absent",
/// writes that fail are dropped after logging; this type never crosses the
/// crate boundary.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("store read failed: {0}")]
    Read(String),

    #[error("store write failed: {0}")]
    Write(String),
}

/// Launcher lifecycle misuse.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("launcher is already running")]
    AlreadyRunning,

    #[error("command channel closed")]
    ChannelClosed,
}
