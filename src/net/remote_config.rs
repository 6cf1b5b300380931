//! Remote-config client.
//!
//! Posts the merged attribution/deep-link fields plus device identity to a
//! single fixed endpoint and expects `{ok: bool, url: string, expires:
//! number}`. A malformed response is never partially accepted. The client is
//! stateless aside from the HTTP connection pool; persistence of the result
//! is the caller's job.

use std::time::Duration;

use log::debug;
use serde_json::{Map, Value};
use url::Url;

use crate::attribution::AttributionSnapshot;
use crate::config::DeviceIdentity;
use crate::errors::ConfigError;
use crate::launcher::ResolvedDestination;
use crate::net::{BoxFuture, ConfigResolver};

/// Client for the remote-config endpoint.
#[derive(Clone)]
pub struct RemoteConfigClient {
    http: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl RemoteConfigClient {
    pub fn new(http: reqwest::Client, endpoint: Url, timeout: Duration) -> Self {
        Self {
            http,
            endpoint,
            timeout,
        }
    }

    /// Resolves `snapshot` into a destination.
    pub async fn fetch(
        &self,
        snapshot: &AttributionSnapshot,
        identity: &DeviceIdentity,
        push_token: Option<&str>,
    ) -> Result<ResolvedDestination, ConfigError> {
        let body = build_request_body(snapshot, identity, push_token);
        debug!("resolving destination via {}", self.endpoint);

        let response = self
            .http
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConfigError::BadResponse(format!("status {}", status)));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ConfigError::BadResponse(e.to_string()))?;
        parse_destination(&value)
    }
}

impl ConfigResolver for RemoteConfigClient {
    fn resolve(
        &self,
        snapshot: AttributionSnapshot,
        identity: DeviceIdentity,
        push_token: Option<String>,
    ) -> BoxFuture<Result<ResolvedDestination, ConfigError>> {
        let client = self.clone();
        Box::pin(async move {
            client
                .fetch(&snapshot, &identity, push_token.as_deref())
                .await
        })
    }
}

fn map_transport_error(e: reqwest::Error) -> ConfigError {
    if e.is_timeout() {
        ConfigError::Timeout
    } else {
        ConfigError::NetworkError(e.to_string())
    }
}

/// Request body: snapshot fields first, identity fields layered on top.
pub(crate) fn build_request_body(
    snapshot: &AttributionSnapshot,
    identity: &DeviceIdentity,
    push_token: Option<&str>,
) -> Map<String, Value> {
    let mut body = Map::new();
    for (k, v) in snapshot.iter() {
        body.insert(k.clone(), v.clone());
    }

    body.insert("af_id".into(), Value::from(identity.device_id.clone()));
    body.insert("bundle_id".into(), Value::from(identity.bundle_id.clone()));
    body.insert("store_id".into(), Value::from(identity.store_id.clone()));
    body.insert("os".into(), Value::from(identity.os_name.clone()));
    body.insert("locale".into(), Value::from(identity.locale.clone()));
    body.insert(
        "push_token".into(),
        push_token.map(Value::from).unwrap_or(Value::Null),
    );
    body.insert(
        "firebase_project_id".into(),
        identity
            .project_id
            .clone()
            .map(Value::from)
            .unwrap_or(Value::Null),
    );

    body
}

/// Strict parse of `{ok, url, expires}`.
pub(crate) fn parse_destination(value: &Value) -> Result<ResolvedDestination, ConfigError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ConfigError::BadResponse("body is not an object".into()))?;

    let ok = obj
        .get("ok")
        .and_then(Value::as_bool)
        .ok_or_else(|| ConfigError::BadResponse("missing ok field".into()))?;
    if !ok {
        return Err(ConfigError::BadResponse("ok=false".into()));
    }

    let url_str = obj
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| ConfigError::BadResponse("missing url field".into()))?;
    let url =
        Url::parse(url_str).map_err(|e| ConfigError::BadResponse(format!("invalid url: {}", e)))?;

    let expires = obj
        .get("expires")
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f as u64)))
        .ok_or_else(|| ConfigError::BadResponse("missing expires field".into()))?;

    Ok(ResolvedDestination { url, expires })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn identity() -> DeviceIdentity {
        DeviceIdentity {
            device_id: "af-uid-1".into(),
            bundle_id: "com.example.app".into(),
            store_id: "id6754932560".into(),
            os_name: "iOS".into(),
            locale: "EN".into(),
            project_id: Some("gcm-42".into()),
        }
    }

    fn snapshot() -> AttributionSnapshot {
        let mut map = BTreeMap::new();
        map.insert("af_status".to_string(), json!("Non-organic"));
        map.insert("campaign".to_string(), json!("summer"));
        AttributionSnapshot::from_map(map)
    }

    #[test]
    fn body_contains_snapshot_and_identity_fields() {
        let body = build_request_body(&snapshot(), &identity(), Some("tok-1"));

        assert_eq!(body.get("af_status"), Some(&json!("Non-organic")));
        assert_eq!(body.get("campaign"), Some(&json!("summer")));
        assert_eq!(body.get("af_id"), Some(&json!("af-uid-1")));
        assert_eq!(body.get("bundle_id"), Some(&json!("com.example.app")));
        assert_eq!(body.get("store_id"), Some(&json!("id6754932560")));
        assert_eq!(body.get("os"), Some(&json!("iOS")));
        assert_eq!(body.get("locale"), Some(&json!("EN")));
        assert_eq!(body.get("push_token"), Some(&json!("tok-1")));
        assert_eq!(body.get("firebase_project_id"), Some(&json!("gcm-42")));
    }

    #[test]
    fn missing_push_token_is_null_not_absent() {
        let body = build_request_body(&snapshot(), &identity(), None);
        assert_eq!(body.get("push_token"), Some(&Value::Null));
    }

    #[test]
    fn parse_accepts_well_formed_response() {
        let dest = parse_destination(&json!({
            "ok": true,
            "url": "https://play.example.com/entry",
            "expires": 86400,
        }))
        .unwrap();

        assert_eq!(dest.url.as_str(), "https://play.example.com/entry");
        assert_eq!(dest.expires, 86_400);
    }

    #[test]
    fn parse_accepts_float_expires() {
        let dest = parse_destination(&json!({
            "ok": true,
            "url": "https://play.example.com/entry",
            "expires": 86400.5,
        }))
        .unwrap();
        assert_eq!(dest.expires, 86_400);
    }

    #[test]
    fn parse_rejects_every_malformed_shape() {
        for bad in [
            json!({"ok": false, "url": "https://x.example/", "expires": 1}),
            json!({"url": "https://x.example/", "expires": 1}),
            json!({"ok": true, "expires": 1}),
            json!({"ok": true, "url": "https://x.example/"}),
            json!({"ok": true, "url": "not a url", "expires": 1}),
            json!({"ok": true, "url": "https://x.example/", "expires": "soon"}),
            json!([1, 2, 3]),
        ] {
            assert!(
                matches!(parse_destination(&bad), Err(ConfigError::BadResponse(_))),
                "accepted malformed response: {}",
                bad
            );
        }
    }
}
