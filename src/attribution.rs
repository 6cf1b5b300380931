//! Attribution and deep-link payloads, and the aggregator that adapts
//! provider callbacks onto the launcher's command channel.
//!
//! Payload shapes are whatever the measurement provider delivers: flat maps
//! of string keys to scalar values. A snapshot is immutable once published;
//! "merging" always produces a new snapshot via a left-biased union in which
//! provider keys win and deep-link keys fill gaps only.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::errors::AttributionError;
use crate::events::{DeepLinkResolution, LaunchCommand};
use crate::store::{keys, StateStoreExt, StateStoreHandle};

/// Provider field carrying the install status.
pub const INSTALL_STATUS_KEY: &str = "af_status";
/// Install-status value for a non-campaign install.
pub const ORGANIC_INSTALL: &str = "Organic";

/// Merged set of install/campaign attributes from the measurement provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributionSnapshot(BTreeMap<String, Value>);

impl AttributionSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// String view of a field, `None` when absent or not a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Whether the provider reported a non-campaign install.
    pub fn is_organic(&self) -> bool {
        self.str_field(INSTALL_STATUS_KEY) == Some(ORGANIC_INSTALL)
    }

    /// Left-biased union: keys already present win, deep-link keys fill
    /// gaps only.
    pub fn merged_with_deep_link(&self, deep_link: &DeepLinkPayload) -> AttributionSnapshot {
        let mut merged = self.0.clone();
        for (k, v) in deep_link.iter() {
            merged.entry(k.clone()).or_insert_with(|| v.clone());
        }
        AttributionSnapshot(merged)
    }
}

/// A deep-link payload, same shape as a snapshot but delivered out-of-band
/// and cached until consumed by a merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepLinkPayload(BTreeMap<String, Value>);

impl DeepLinkPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// Adapts the attribution provider's callbacks to launcher commands.
///
/// The provider delivers conversion data exactly once per launch and
/// zero-or-more deep-link resolutions; this type enforces both contracts:
/// duplicate conversion callbacks are dropped, and only the first Found
/// deep link per launch is forwarded (guarded by a store flag so a provider
/// re-fire after the merge timer has already run is ignored).
pub struct AttributionAggregator {
    cmd_tx: mpsc::Sender<LaunchCommand>,
    store: StateStoreHandle,
    conversion_seen: AtomicBool,
}

impl AttributionAggregator {
    pub fn new(cmd_tx: mpsc::Sender<LaunchCommand>, store: StateStoreHandle) -> Self {
        // The guard flag is per launch.
        store.remove(keys::DEEPLINK_HANDLED);

        Self {
            cmd_tx,
            store,
            conversion_seen: AtomicBool::new(false),
        }
    }

    /// Conversion callback from the provider SDK.
    pub fn on_conversion_data(&self, result: Result<AttributionSnapshot, AttributionError>) {
        if self.conversion_seen.swap(true, Ordering::SeqCst) {
            warn!("duplicate conversion callback dropped");
            return;
        }

        let cmd = match result {
            Ok(snapshot) => {
                debug!("conversion data received ({} keys)", snapshot.len());
                LaunchCommand::Attribution { snapshot }
            }
            Err(e) => LaunchCommand::AttributionFailed {
                reason: e.to_string(),
            },
        };
        self.post(cmd);
    }

    /// Deep-link resolution callback from the provider SDK.
    pub fn on_deep_link(&self, resolution: DeepLinkResolution) {
        match resolution {
            DeepLinkResolution::Found { payload } => {
                if self.store.get_bool(keys::DEEPLINK_HANDLED) {
                    debug!("deep link already handled this launch, ignoring");
                    return;
                }
                self.store.set_bool(keys::DEEPLINK_HANDLED, true);
                self.post(LaunchCommand::DeepLink { payload });
            }
            DeepLinkResolution::NotFound => {
                debug!("deep-link resolution reported not-found");
            }
        }
    }

    fn post(&self, cmd: LaunchCommand) {
        if let Err(e) = self.cmd_tx.try_send(cmd) {
            warn!("launcher command channel unavailable: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStateStore;
    use std::sync::Arc;

    fn snapshot(pairs: &[(&str, &str)]) -> AttributionSnapshot {
        AttributionSnapshot::from_map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect(),
        )
    }

    fn payload(pairs: &[(&str, &str)]) -> DeepLinkPayload {
        DeepLinkPayload::from_map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect(),
        )
    }

    #[test]
    fn merge_is_left_biased() {
        let snap = snapshot(&[("af_status", "Non-organic"), ("campaign", "summer")]);
        let dl = payload(&[("campaign", "deep"), ("deep_link_value", "promo")]);

        let merged = snap.merged_with_deep_link(&dl);
        assert_eq!(merged.str_field("campaign"), Some("summer"));
        assert_eq!(merged.str_field("deep_link_value"), Some("promo"));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn merge_with_empty_deep_link_is_identity() {
        let snap = snapshot(&[("af_status", "Organic")]);
        let merged = snap.merged_with_deep_link(&DeepLinkPayload::new());
        assert_eq!(merged, snap);
    }

    #[test]
    fn organic_detection() {
        assert!(snapshot(&[("af_status", "Organic")]).is_organic());
        assert!(!snapshot(&[("af_status", "Non-organic")]).is_organic());
        assert!(!AttributionSnapshot::new().is_organic());
    }

    #[tokio::test]
    async fn duplicate_conversion_callbacks_forward_once() {
        let (tx, mut rx) = mpsc::channel(8);
        let store: StateStoreHandle = Arc::new(InMemoryStateStore::new());
        let agg = AttributionAggregator::new(tx, store);

        agg.on_conversion_data(Ok(snapshot(&[("af_status", "Organic")])));
        agg.on_conversion_data(Ok(snapshot(&[("af_status", "Organic")])));

        assert!(matches!(
            rx.try_recv(),
            Ok(LaunchCommand::Attribution { .. })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn only_first_found_deep_link_is_forwarded() {
        let (tx, mut rx) = mpsc::channel(8);
        let store: StateStoreHandle = Arc::new(InMemoryStateStore::new());
        let agg = AttributionAggregator::new(tx, store);

        agg.on_deep_link(DeepLinkResolution::NotFound);
        agg.on_deep_link(DeepLinkResolution::Found {
            payload: payload(&[("deep_link_value", "a")]),
        });
        agg.on_deep_link(DeepLinkResolution::Found {
            payload: payload(&[("deep_link_value", "b")]),
        });

        match rx.try_recv() {
            Ok(LaunchCommand::DeepLink { payload }) => {
                assert_eq!(payload.get("deep_link_value"), Some(&Value::from("a")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_guard_flag_is_cleared_on_construction() {
        let (tx, mut rx) = mpsc::channel(8);
        let store: StateStoreHandle = Arc::new(InMemoryStateStore::new());
        store.set_bool(keys::DEEPLINK_HANDLED, true);

        let agg = AttributionAggregator::new(tx, store);
        agg.on_deep_link(DeepLinkResolution::Found {
            payload: payload(&[("deep_link_value", "x")]),
        });

        assert!(matches!(rx.try_recv(), Ok(LaunchCommand::DeepLink { .. })));
    }

    #[tokio::test]
    async fn conversion_failure_forwards_failure_command() {
        let (tx, mut rx) = mpsc::channel(8);
        let store: StateStoreHandle = Arc::new(InMemoryStateStore::new());
        let agg = AttributionAggregator::new(tx, store);

        agg.on_conversion_data(Err(AttributionError::ConversionFailed("timeout".into())));
        assert!(matches!(
            rx.try_recv(),
            Ok(LaunchCommand::AttributionFailed { .. })
        ));
    }
}
