//! Cookie core types.
//!
//! A **cookie jar** holds the session cookies of the embedded web surface,
//! grouped by domain. The guardian passes response metadata to the jar so it
//! can update cookies after each server-redirect hop, and the shell queries
//! it to seed the surface's own cookie store at initialization.
//!
//! # Concurrency model
//! [`CookieJarHandle`] is `Arc<RwLock<dyn CookieJar + Send + Sync>>`: take a
//! read lock for queries and a write lock for mutations.

pub mod cookie_jar;
pub mod persistent_cookie_jar;

pub use cookie_jar::DomainCookieJar;
pub use persistent_cookie_jar::PersistentCookieJar;

use std::any::Any;
use std::sync::{Arc, RwLock};

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use url::Url;

/// A handle to a cookie jar.
pub type CookieJarHandle = Arc<RwLock<dyn CookieJar + Send + Sync>>;

/// A single cookie's property bag.
///
/// Parsing covers the common subset of RFC 6265 `Set-Cookie` attributes;
/// unknown attributes are ignored. `expires` is stored as the raw string and
/// not enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
    pub expires: Option<String>,
    pub same_site: Option<String>,
    pub http_only: bool,
}

/// Storage, retrieval, and mutation of cookies.
///
/// ### Type erasure
/// `as_any` / `as_any_mut` enable downcasting when callers need the concrete
/// jar, e.g. for snapshotting.
pub trait CookieJar: Send + Sync {
    /// Returns a type-erased reference to the jar.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable type-erased reference to the jar.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Stores cookies found in response `headers` for the given `url`.
    /// Last write per (domain, name) wins.
    fn store_response_cookies(&mut self, url: &Url, headers: &HeaderMap);

    /// Returns the `Cookie` request header value to send for `url`, if any.
    fn request_header_for(&self, url: &Url) -> Option<String>;

    /// Removes all cookies from the jar.
    fn clear(&mut self);

    /// All cookies as `(domain, cookie)` pairs, for replay into a surface's
    /// own store.
    fn all_cookies(&self) -> Vec<(String, Cookie)>;

    /// Removes a single cookie by domain and name.
    fn remove_cookie(&mut self, domain: &str, name: &str);
}
