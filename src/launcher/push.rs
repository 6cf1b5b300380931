//! Push-payload intake.
//!
//! Inbound push payloads may carry a destination URL either at the top
//! level or nested under `data.url`. When present it is cached as the
//! temporary destination and later published to the UI layer.

use serde_json::Value;
use url::Url;

/// Extracts the destination URL from a push payload, if any.
pub fn extract_push_url(payload: &Value) -> Option<Url> {
    let direct = payload.get("url").and_then(Value::as_str);
    let nested = payload
        .get("data")
        .and_then(|data| data.get("url"))
        .and_then(Value::as_str);

    direct
        .or(nested)
        .and_then(|candidate| Url::parse(candidate).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn top_level_url_wins_over_nested() {
        let payload = json!({
            "url": "https://top.example/",
            "data": { "url": "https://nested.example/" },
        });
        assert_eq!(
            extract_push_url(&payload).unwrap().as_str(),
            "https://top.example/"
        );
    }

    #[test]
    fn nested_url_is_found() {
        let payload = json!({ "data": { "url": "https://nested.example/promo" } });
        assert_eq!(
            extract_push_url(&payload).unwrap().as_str(),
            "https://nested.example/promo"
        );
    }

    #[test]
    fn absent_or_invalid_urls_are_ignored() {
        assert!(extract_push_url(&json!({})).is_none());
        assert!(extract_push_url(&json!({"url": 42})).is_none());
        assert!(extract_push_url(&json!({"url": "not a url"})).is_none());
        assert!(extract_push_url(&json!({"data": {}})).is_none());
    }
}
