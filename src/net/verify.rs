//! Organic-install verification.
//!
//! A GET against the provider's install-data endpoint with `devkey` and
//! `device_id` query parameters. The JSON body becomes a fresh attribution
//! snapshot; any failure (transport, non-200, malformed body) is reported as
//! a verification error and routes the launch to fallback.

use std::collections::BTreeMap;
use std::time::Duration;

use log::debug;
use serde_json::Value;
use url::Url;

use crate::attribution::AttributionSnapshot;
use crate::errors::AttributionError;
use crate::net::{BoxFuture, InstallVerifier};

/// HTTP-backed install verifier.
#[derive(Clone)]
pub struct HttpInstallVerifier {
    http: reqwest::Client,
    base: Url,
    app_id: String,
    dev_key: String,
    device_id: String,
    timeout: Duration,
}

impl HttpInstallVerifier {
    pub fn new(
        http: reqwest::Client,
        base: Url,
        app_id: impl Into<String>,
        dev_key: impl Into<String>,
        device_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base,
            app_id: app_id.into(),
            dev_key: dev_key.into(),
            device_id: device_id.into(),
            timeout,
        }
    }

    async fn fetch(&self) -> Result<AttributionSnapshot, AttributionError> {
        let url = verification_url(&self.base, &self.app_id, &self.dev_key, &self.device_id)?;
        debug!("verifying organic install via {}", url.host_str().unwrap_or(""));

        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AttributionError::Verification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttributionError::Verification(format!("status {}", status)));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| AttributionError::Verification(e.to_string()))?;
        snapshot_from_body(&value)
    }
}

impl InstallVerifier for HttpInstallVerifier {
    fn verify(&self) -> BoxFuture<Result<AttributionSnapshot, AttributionError>> {
        let verifier = self.clone();
        Box::pin(async move { verifier.fetch().await })
    }
}

/// `<base>/id<app_id>?devkey=<dev_key>&device_id=<device_id>`. The base must
/// end with a trailing slash.
pub(crate) fn verification_url(
    base: &Url,
    app_id: &str,
    dev_key: &str,
    device_id: &str,
) -> Result<Url, AttributionError> {
    let mut url = base
        .join(&format!("id{}", app_id))
        .map_err(|e| AttributionError::Verification(format!("bad verification url: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("devkey", dev_key)
        .append_pair("device_id", device_id);
    Ok(url)
}

pub(crate) fn snapshot_from_body(value: &Value) -> Result<AttributionSnapshot, AttributionError> {
    let obj = value
        .as_object()
        .ok_or_else(|| AttributionError::Verification("body is not an object".into()))?;

    let map: BTreeMap<String, Value> = obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    Ok(AttributionSnapshot::from_map(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_has_app_id_segment_and_query() {
        let base = Url::parse("https://gcd.example.com/install_data/v4.0/").unwrap();
        let url = verification_url(&base, "6754932560", "devkey-1", "device-1").unwrap();

        assert_eq!(url.path(), "/install_data/v4.0/id6754932560");
        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            query,
            vec![
                ("devkey".to_string(), "devkey-1".to_string()),
                ("device_id".to_string(), "device-1".to_string()),
            ]
        );
    }

    #[test]
    fn body_must_be_an_object() {
        assert!(snapshot_from_body(&json!(["a", "b"])).is_err());
        assert!(snapshot_from_body(&json!("str")).is_err());

        let snap = snapshot_from_body(&json!({"af_status": "Organic", "clicks": 3})).unwrap();
        assert!(snap.is_organic());
        assert_eq!(snap.get("clicks"), Some(&json!(3)));
    }
}
