//! Process-local key/value persistence.
//!
//! Every durable fact in this crate (app mode, cached destination, push
//! flags, the cookie grouping blob) lives behind the [`StateStore`] trait.
//! Stores are shared as `Arc<dyn StateStore + Send + Sync>` and are expected
//! to manage their own internal synchronization; the trait methods take
//! `&self`.
//!
//! Failure policy: a read that fails is indistinguishable from an absent
//! value, and a write that fails is dropped after logging. Callers always
//! have a defined fallback for a missing value, so persistence errors never
//! propagate.

pub mod in_memory;
pub mod json;

pub use in_memory::InMemoryStateStore;
pub use json::JsonStateStore;

use std::sync::Arc;

/// Well-known keys. Each persisted fact is consumed independently; there is
/// no multi-key atomicity.
pub mod keys {
    /// Set after the first resolution reaches a terminal decision.
    pub const HAS_EVER_RUN: &str = "has_ever_run";
    /// Persisted [`AppMode`](crate::launcher::AppMode) string.
    pub const APP_MODE: &str = "app_mode";
    /// Cached resolved destination URL.
    pub const SAVED_DESTINATION: &str = "saved_destination";
    /// Expiry accompanying the cached destination.
    pub const SAVED_EXPIRES: &str = "saved_expires";
    /// Temporary destination delivered by push/deferred deep link.
    pub const TEMP_URL: &str = "temp_url";
    /// Epoch seconds of the last push-permission prompt.
    pub const LAST_PUSH_PROMPT: &str = "last_push_prompt";
    /// Push permission granted.
    pub const PUSH_ACCEPTED: &str = "push_accepted";
    /// Push permission permanently declined.
    pub const PUSH_DECLINED: &str = "push_declined";
    /// Cached push token for the config request body.
    pub const PUSH_TOKEN: &str = "push_token";
    /// Guard flag: the launch's deep link has already been forwarded.
    pub const DEEPLINK_HANDLED: &str = "deeplink_handled";
    /// Serialized cookie grouping (domain -> name -> cookie).
    pub const COOKIE_JAR: &str = "cookie_jar";
}

/// Shared handle to a state store.
pub type StateStoreHandle = Arc<dyn StateStore + Send + Sync>;

/// Minimal string key/value contract.
pub trait StateStore {
    /// Returns the stored value, or `None` when absent or unreadable.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, last write wins.
    fn set(&self, key: &str, value: &str);

    /// Removes `key` if present.
    fn remove(&self, key: &str);
}

/// Typed convenience accessors layered over the string contract.
pub trait StateStoreExt: StateStore {
    fn get_bool(&self, key: &str) -> bool {
        matches!(self.get(key).as_deref(), Some("true"))
    }

    fn set_bool(&self, key: &str, value: bool) {
        self.set(key, if value { "true" } else { "false" });
    }

    fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key)?.parse().ok()
    }

    fn set_u64(&self, key: &str, value: u64) {
        self.set(key, &value.to_string());
    }
}

impl<T: StateStore + ?Sized> StateStoreExt for T {}
