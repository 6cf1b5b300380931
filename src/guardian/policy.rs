//! The navigation guardian.
//!
//! A pure policy component: the UI shell adapts its platform's navigation
//! callbacks to the primitive events below (decide-policy, server redirect,
//! finish, fail, edge swipe, dismissal) and applies the returned decisions
//! and directives. The guardian itself never touches a UI toolkit.
//!
//! All methods are expected to be called from one sequential context; the
//! shell serializes platform callbacks before calling in, so `SurfaceStack`
//! and the per-surface redirect state are never mutated concurrently.

use std::collections::HashMap;

use http::HeaderMap;
use log::{debug, info, warn};
use url::Url;

use crate::config::GuardianConfig;
use crate::cookies::{Cookie, CookieJar, CookieJarHandle, PersistentCookieJar};
use crate::errors::NavigationError;
use crate::guardian::redirect::RedirectState;
use crate::guardian::surface::{SurfaceId, SurfaceStack, SurfaceTraits};
use crate::store::StateStoreHandle;

/// A navigation the shell asks the guardian to rule on.
#[derive(Debug, Clone)]
pub struct NavigationRequest {
    /// Target URL. Shells map an absent/empty target to `about:blank`.
    pub url: Url,
    /// The navigation requests a new top-level context (no target frame).
    pub opens_new_surface: bool,
}

/// Ruling for a [`NavigationRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyDecision {
    /// Proceed in-surface.
    Allow,
    /// Drop the navigation.
    Cancel,
    /// Cancel in-surface and hand the URL to the platform's external-open
    /// mechanism. `known_app` is set when a failure to open deserves an
    /// explanatory alert (see [`NavigationGuardian::on_external_open_failed`]).
    OpenExternal {
        url: Url,
        known_app: Option<String>,
    },
    /// Cancel in-surface and create a child surface for the URL.
    SpawnChild {
        surface: SurfaceId,
        traits: SurfaceTraits,
    },
}

/// Side effects the shell must apply.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Load `url` on `surface`.
    Load { surface: SurfaceId, url: Url },
    /// Stop the in-flight load on `surface`.
    StopLoading { surface: SurfaceId },
    /// Step `surface` back in its own history (best effort).
    NavigateBack { surface: SurfaceId },
    /// Tear down a child surface.
    DestroySurface { surface: SurfaceId },
    /// Run the viewport-lockdown script on `surface`.
    ApplyViewportLockdown { surface: SurfaceId, script: String },
    /// Tell the user the external app for `scheme` is not installed.
    ShowExternalAppAlert { scheme: String },
}

/// Policy layer governing every navigation of the embedded web surface.
pub struct NavigationGuardian {
    config: GuardianConfig,
    primary: SurfaceId,
    stack: SurfaceStack,
    redirects: HashMap<SurfaceId, RedirectState>,
    jar: CookieJarHandle,
}

impl NavigationGuardian {
    /// Creates a guardian whose cookie jar persists through `store`. Any
    /// previously persisted cookie grouping is restored before the first
    /// navigation.
    pub fn new(config: GuardianConfig, store: StateStoreHandle) -> Self {
        let jar = PersistentCookieJar::open(store).into_handle();
        Self::with_jar(config, jar)
    }

    /// Creates a guardian over an explicit jar handle.
    pub fn with_jar(config: GuardianConfig, jar: CookieJarHandle) -> Self {
        let primary = SurfaceId::new();
        let mut redirects = HashMap::new();
        redirects.insert(primary, RedirectState::new());

        Self {
            config,
            primary,
            stack: SurfaceStack::new(),
            redirects,
            jar,
        }
    }

    /// The primary surface owned by this guardian.
    pub fn primary(&self) -> SurfaceId {
        self.primary
    }

    /// Number of live child surfaces.
    pub fn child_count(&self) -> usize {
        self.stack.len()
    }

    /// The topmost child surface, if any.
    pub fn top_child(&self) -> Option<SurfaceId> {
        self.stack.top()
    }

    /// The `Cookie` request header the shell should seed for `url`.
    pub fn cookie_header_for(&self, url: &Url) -> Option<String> {
        self.jar.read().ok()?.request_header_for(url)
    }

    /// Snapshot of all persisted cookies as `(domain, cookie)` pairs, for
    /// replay into the surface's cookie store at initialization.
    pub fn cookies_snapshot(&self) -> Vec<(String, Cookie)> {
        self.jar
            .read()
            .map(|jar| jar.all_cookies())
            .unwrap_or_default()
    }

    /// Feeds response cookies into the jar (and therefore into the persisted
    /// grouping). Called internally on accepted redirect hops; public so
    /// shells can also feed finish-time enumerations.
    pub fn store_cookies(&self, url: &Url, headers: &HeaderMap) {
        if let Ok(mut jar) = self.jar.write() {
            jar.store_response_cookies(url, headers);
        }
    }

    /// Rules on a navigation before it starts.
    pub fn decide_policy(
        &mut self,
        surface: SurfaceId,
        request: &NavigationRequest,
    ) -> PolicyDecision {
        if request.opens_new_surface {
            return self.spawn_child(&request.url);
        }

        match request.url.scheme() {
            "http" | "https" => {
                // An accepted non-redirect navigation becomes the surface's
                // last known good URL. The redirect counter is untouched.
                self.redirect_state(surface).accept(request.url.clone());
                PolicyDecision::Allow
            }
            scheme => {
                let known_app = self.known_app(scheme);
                debug!("routing {} navigation to external open", scheme);
                PolicyDecision::OpenExternal {
                    url: request.url.clone(),
                    known_app,
                }
            }
        }
    }

    /// Handles one server-initiated redirect hop.
    ///
    /// Below the ceiling the hop proceeds and its cookies are persisted.
    /// Above it, the in-flight load is stopped, the last known good URL is
    /// reloaded, and the counter resets.
    pub fn on_server_redirect(
        &mut self,
        surface: SurfaceId,
        url: &Url,
        headers: &HeaderMap,
    ) -> Vec<Directive> {
        let ceiling = self.config.redirect_ceiling;
        let count = self.redirect_state(surface).record_redirect();

        if count > ceiling {
            warn!(
                "redirect ceiling hit on surface {} ({} consecutive), reverting",
                surface, count
            );
            return self.revert_to_last_good(surface, true);
        }

        self.store_cookies(url, headers);
        Vec::new()
    }

    /// Handles a finished load. Always applies the viewport lockdown; the
    /// redirect counter is deliberately not reset here.
    pub fn on_load_finished(&mut self, surface: SurfaceId, url: &Url) -> Vec<Directive> {
        debug!("load finished on {}: {}", surface, url);
        vec![Directive::ApplyViewportLockdown {
            surface,
            script: self.config.lockdown_script.clone(),
        }]
    }

    /// Handles a failed load. A too-many-redirects failure reverts to the
    /// last known good URL immediately, without waiting for the ceiling.
    pub fn on_load_failed(&mut self, surface: SurfaceId, error: &NavigationError) -> Vec<Directive> {
        match error {
            NavigationError::TooManyRedirects => {
                warn!("platform reported a redirect loop on {}, reverting", surface);
                self.revert_to_last_good(surface, false)
            }
            NavigationError::LoadFailed(reason) => {
                debug!("load failed on {}: {}", surface, reason);
                Vec::new()
            }
        }
    }

    /// Called by the shell when the platform's external-open mechanism could
    /// not handle a scheme. The navigation stays cancelled either way; only
    /// known external-app schemes earn an explanatory alert.
    pub fn on_external_open_failed(&self, url: &Url) -> Option<Directive> {
        self.known_app(url.scheme())
            .map(|scheme| Directive::ShowExternalAppAlert { scheme })
    }

    /// Handles the edge-swipe gesture on a surface: navigate back when
    /// history exists, otherwise pop the surface if it is the topmost child.
    pub fn on_edge_swipe(&mut self, surface: SurfaceId, can_go_back: bool) -> Vec<Directive> {
        if can_go_back {
            return vec![Directive::NavigateBack { surface }];
        }

        if self.stack.top() == Some(surface) {
            self.stack.pop();
            self.redirects.remove(&surface);
            info!("child surface {} dismissed by edge swipe", surface);
            return vec![Directive::DestroySurface { surface }];
        }

        Vec::new()
    }

    /// Removes and destroys the top child surface; loads `redirect_to` on
    /// the primary when supplied. With no children, steps the primary back
    /// in its own history (the shell no-ops when there is none).
    pub fn dismiss_top(&mut self, redirect_to: Option<Url>) -> Vec<Directive> {
        match self.stack.pop() {
            Some(top) => {
                self.redirects.remove(&top);
                let mut directives = vec![Directive::DestroySurface { surface: top }];
                if let Some(url) = redirect_to {
                    directives.push(Directive::Load {
                        surface: self.primary,
                        url,
                    });
                }
                directives
            }
            None => vec![Directive::NavigateBack {
                surface: self.primary,
            }],
        }
    }

    fn spawn_child(&mut self, url: &Url) -> PolicyDecision {
        // No popups for empty targets.
        if url.as_str() == "about:blank" {
            debug!("popup request for blank target cancelled");
            return PolicyDecision::Cancel;
        }

        let child = SurfaceId::new();
        self.stack.push(child);
        self.redirects.insert(child, RedirectState::new());
        info!("child surface {} created for {}", child, url);

        PolicyDecision::SpawnChild {
            surface: child,
            traits: SurfaceTraits::standard(),
        }
    }

    fn revert_to_last_good(&mut self, surface: SurfaceId, stop_first: bool) -> Vec<Directive> {
        let state = self.redirect_state(surface);
        state.reset_counter();
        let last_good = state.last_good().cloned();

        let mut directives = Vec::new();
        if stop_first {
            directives.push(Directive::StopLoading { surface });
        }
        match last_good {
            Some(url) => directives.push(Directive::Load { surface, url }),
            None => warn!("no last known good URL for surface {}", surface),
        }
        directives
    }

    fn redirect_state(&mut self, surface: SurfaceId) -> &mut RedirectState {
        self.redirects.entry(surface).or_default()
    }

    fn known_app(&self, scheme: &str) -> Option<String> {
        self.config
            .known_app_schemes
            .contains(scheme)
            .then(|| scheme.to_string())
    }
}
