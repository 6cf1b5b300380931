use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use lazy_static::lazy_static;

/// Capacity used for the command and event channels.
pub(crate) const DEFAULT_CHANNEL_CAPACITY: usize = 64;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_MERGE_WINDOW: Duration = Duration::from_millis(1500);
const DEFAULT_ORGANIC_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_PUSH_REASK_INTERVAL: Duration = Duration::from_secs(259_200);
const DEFAULT_PUSH_PUBLISH_DELAY: Duration = Duration::from_secs(3);

/// Maximum consecutive server redirects tolerated before the guardian
/// reverts a surface to its last known good URL.
const DEFAULT_REDIRECT_CEILING: u32 = 70;

lazy_static! {
    /// Schemes belonging to external apps the user plausibly expects to have
    /// installed (payment/banking handoffs). Only these get an explanatory
    /// alert when the platform cannot open them.
    static ref DEFAULT_KNOWN_APP_SCHEMES: HashSet<&'static str> = [
        "bankid", "swish", "vipps", "mobilepay", "paytmmp", "phonepe", "tez", "upi",
    ]
    .iter()
    .copied()
    .collect();
}

/// Script injected after every finished load: pins the viewport scale and
/// swallows pinch gestures. Cosmetic policy, no state.
pub const VIEWPORT_LOCKDOWN_SCRIPT: &str = "(function(){\
var m=document.querySelector('meta[name=viewport]');\
if(!m){m=document.createElement('meta');m.name='viewport';document.head.appendChild(m);}\
m.content='width=device-width, initial-scale=1.0, maximum-scale=1.0, user-scalable=no';\
document.addEventListener('gesturestart',function(e){e.preventDefault();},{passive:false});\
})();";

/// Identity fields merged into every remote-config request body.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    /// Attribution-provider device id (sent as `af_id`).
    pub device_id: String,
    /// Application bundle identifier.
    pub bundle_id: String,
    /// Store listing identifier.
    pub store_id: String,
    /// Operating system name reported to the backend.
    pub os_name: String,
    /// Two-letter uppercase locale code.
    pub locale: String,
    /// Push project identifier, if the shell has one.
    pub project_id: Option<String>,
}

/// Configuration for the launch orchestrator.
///
/// Endpoints and provider credentials are deployment-specific and have no
/// defaults; [`HostConfig::new`] fills every tunable with its default.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Remote-config endpoint (single fixed POST target).
    pub config_endpoint: Url,
    /// Base URL of the provider's install-verification endpoint. Must end
    /// with a trailing slash; the app id segment is appended to it.
    pub verification_base: Url,
    /// Store app id used in the verification URL.
    pub app_id: String,
    /// Provider dev key used in the verification query.
    pub dev_key: String,
    /// Device/locale/bundle identity merged into config requests.
    pub identity: DeviceIdentity,
    /// Per-request timeout for both network exchanges.
    pub request_timeout: Duration,
    /// Coalescing window for attribution/deep-link arrival bursts.
    pub merge_window: Duration,
    /// Grace window before the organic-install verification round-trip,
    /// allowing a late deep link to attach.
    pub organic_grace: Duration,
    /// Minimum age of the last push prompt before the user is asked again.
    pub push_reask_interval: Duration,
    /// Delay between caching a pushed URL and publishing it to the shell.
    pub push_publish_delay: Duration,
    /// Capacity of the launcher command channel.
    pub channel_capacity: usize,
}

impl HostConfig {
    /// Builds a config with all tunables at their defaults.
    pub fn new(
        config_endpoint: Url,
        verification_base: Url,
        app_id: impl Into<String>,
        dev_key: impl Into<String>,
        identity: DeviceIdentity,
    ) -> Self {
        Self {
            config_endpoint,
            verification_base,
            app_id: app_id.into(),
            dev_key: dev_key.into(),
            identity,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            merge_window: DEFAULT_MERGE_WINDOW,
            organic_grace: DEFAULT_ORGANIC_GRACE,
            push_reask_interval: DEFAULT_PUSH_REASK_INTERVAL,
            push_publish_delay: DEFAULT_PUSH_PUBLISH_DELAY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Configuration for the navigation guardian.
#[derive(Debug, Clone)]
pub struct GuardianConfig {
    /// Redirect-loop ceiling: consecutive server redirects tolerated before
    /// reverting to the last known good URL.
    pub redirect_ceiling: u32,
    /// Schemes that get an explanatory alert when external open fails.
    pub known_app_schemes: HashSet<String>,
    /// Script applied on every finished load.
    pub lockdown_script: String,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            redirect_ceiling: DEFAULT_REDIRECT_CEILING,
            known_app_schemes: DEFAULT_KNOWN_APP_SCHEMES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            lockdown_script: VIEWPORT_LOCKDOWN_SCRIPT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> DeviceIdentity {
        DeviceIdentity {
            device_id: "dev-1".into(),
            bundle_id: "com.example.app".into(),
            store_id: "id000".into(),
            os_name: "iOS".into(),
            locale: "EN".into(),
            project_id: None,
        }
    }

    #[test]
    fn host_config_defaults() {
        let cfg = HostConfig::new(
            Url::parse("https://backend.example/config.php").unwrap(),
            Url::parse("https://verify.example/install_data/v4.0/").unwrap(),
            "000",
            "devkey",
            identity(),
        );
        assert_eq!(cfg.merge_window, Duration::from_millis(1500));
        assert_eq!(cfg.organic_grace, Duration::from_secs(5));
        assert_eq!(cfg.push_reask_interval, Duration::from_secs(259_200));
        assert_eq!(cfg.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[test]
    fn guardian_defaults_include_known_payment_schemes() {
        let cfg = GuardianConfig::default();
        assert_eq!(cfg.redirect_ceiling, 70);
        assert!(cfg.known_app_schemes.contains("swish"));
        assert!(cfg.known_app_schemes.contains("bankid"));
        assert!(!cfg.known_app_schemes.contains("https"));
        assert!(cfg.lockdown_script.contains("user-scalable=no"));
    }
}
