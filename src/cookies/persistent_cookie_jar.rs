//! Persistence decorator for cookie jars.
//!
//! [`PersistentCookieJar`] is transparent for reads but eagerly persists
//! after every mutation: the inner jar is snapshotted and written to the
//! process's state store as the cookie grouping blob. Restoring the blob at
//! construction means session cookies survive process restarts.

use std::sync::{Arc, RwLock};

use http::HeaderMap;
use log::warn;
use url::Url;

use crate::cookies::{Cookie, CookieJar, CookieJarHandle, DomainCookieJar};
use crate::store::{keys, StateStoreHandle};

/// A `CookieJar` decorator that writes the serialized grouping back to the
/// state store after each mutation.
pub struct PersistentCookieJar {
    /// Inner jar holding the actual cookie state.
    inner: Arc<RwLock<DomainCookieJar>>,
    /// Store receiving the grouping blob.
    store: StateStoreHandle,
}

impl PersistentCookieJar {
    /// Opens a jar bound to `store`, restoring any previously persisted
    /// grouping. A missing or corrupt blob starts empty.
    pub fn open(store: StateStoreHandle) -> Self {
        let restored = Self::restore(&store);
        Self {
            inner: Arc::new(RwLock::new(restored)),
            store,
        }
    }

    /// Deserializes the persisted grouping, empty when absent or corrupt.
    pub fn restore(store: &StateStoreHandle) -> DomainCookieJar {
        match store.get(keys::COOKIE_JAR) {
            Some(blob) => serde_json::from_str(&blob).unwrap_or_else(|e| {
                warn!("persisted cookie jar is corrupt, starting empty: {}", e);
                DomainCookieJar::new()
            }),
            None => DomainCookieJar::new(),
        }
    }

    /// Wraps this jar into the shared handle type.
    pub fn into_handle(self) -> CookieJarHandle {
        Arc::new(RwLock::new(self))
    }

    fn persist(&self) {
        let snapshot = match self.inner.read() {
            Ok(inner) => inner.clone(),
            Err(_) => return,
        };
        match serde_json::to_string(&snapshot) {
            Ok(blob) => self.store.set(keys::COOKIE_JAR, &blob),
            Err(e) => warn!("cookie jar snapshot not serializable: {}", e),
        }
    }
}

impl CookieJar for PersistentCookieJar {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn store_response_cookies(&mut self, url: &Url, headers: &HeaderMap) {
        if let Ok(mut inner) = self.inner.write() {
            inner.store_response_cookies(url, headers);
        }
        self.persist();
    }

    fn request_header_for(&self, url: &Url) -> Option<String> {
        self.inner.read().ok()?.request_header_for(url)
    }

    fn clear(&mut self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.clear();
        }
        self.persist();
    }

    fn all_cookies(&self) -> Vec<(String, Cookie)> {
        self.inner
            .read()
            .map(|inner| inner.all_cookies())
            .unwrap_or_default()
    }

    fn remove_cookie(&mut self, domain: &str, name: &str) {
        if let Ok(mut inner) = self.inner.write() {
            inner.remove_cookie(domain, name);
        }
        self.persist();
    }
}
