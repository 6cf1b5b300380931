//! In-memory cookie jar keyed by domain.
//!
//! Cookies live in a two-level map `domain -> cookie-name -> cookie`, which
//! makes the last-write-wins rule per (domain, name) structural and gives
//! persistence a stable, inspectable shape.

use std::collections::HashMap;

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cookies::{Cookie, CookieJar};

/// Cookie jar bucketing cookies by effective domain.
///
/// The effective domain is the `Domain` attribute (leading dot stripped)
/// when present, the request host otherwise. Matching for outgoing requests
/// applies basic host/subdomain, path-prefix, and `Secure` checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainCookieJar {
    /// domain -> cookie-name -> cookie.
    pub entries: HashMap<String, HashMap<String, Cookie>>,
}

impl DomainCookieJar {
    /// Creates an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of cookies across all domains.
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cookie(&self, domain: &str, name: &str) -> Option<&Cookie> {
        self.entries.get(domain)?.get(name)
    }
}

fn parse_set_cookie(header_str: &str, request_url: &Url) -> Option<Cookie> {
    let (name, rest) = header_str.split_once('=')?;
    let default_path = request_url
        .path()
        .rsplit_once('/')
        .map_or("/", |(a, _)| if a.is_empty() { "/" } else { a });

    let mut cookie = Cookie {
        name: name.trim().to_string(),
        value: String::new(),
        path: None,
        domain: None,
        secure: false,
        expires: None,
        same_site: None,
        http_only: false,
    };

    for part in rest.split(';') {
        let part = part.trim();
        // First segment is the value, everything after it is attributes.
        if cookie.value.is_empty() {
            cookie.value = part.to_string();
            continue;
        }

        if let Some((k, v)) = part.split_once('=') {
            match k.to_ascii_lowercase().as_str() {
                "path" => cookie.path = Some(v.to_string()),
                "domain" => cookie.domain = Some(v.trim_start_matches('.').to_string()),
                "expires" => cookie.expires = Some(v.to_string()),
                "samesite" => {
                    let val = v.trim();
                    if val.eq_ignore_ascii_case("lax") {
                        cookie.same_site = Some("Lax".to_string());
                    } else if val.eq_ignore_ascii_case("strict") {
                        cookie.same_site = Some("Strict".to_string());
                    } else if val.eq_ignore_ascii_case("none") {
                        cookie.same_site = Some("None".to_string());
                    } else {
                        cookie.same_site = Some(val.to_string());
                    }
                }
                _ => {}
            }
        } else if part.eq_ignore_ascii_case("secure") {
            cookie.secure = true;
        } else if part.eq_ignore_ascii_case("httponly") {
            cookie.http_only = true;
        }
    }

    if cookie.path.is_none() {
        cookie.path = Some(default_path.to_string());
    }

    Some(cookie)
}

impl CookieJar for DomainCookieJar {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn store_response_cookies(&mut self, url: &Url, headers: &HeaderMap) {
        let host = url.host_str().unwrap_or_default().to_string();

        for header in headers.get_all("set-cookie") {
            let Ok(header_str) = header.to_str() else {
                continue;
            };
            let Some(cookie) = parse_set_cookie(header_str, url) else {
                continue;
            };

            let domain = cookie.domain.clone().unwrap_or_else(|| host.clone());
            if domain.is_empty() {
                continue;
            }

            self.entries
                .entry(domain)
                .or_default()
                .insert(cookie.name.clone(), cookie);
        }
    }

    fn request_header_for(&self, url: &Url) -> Option<String> {
        let host = url.host_str().unwrap_or_default();
        let path = url.path();
        let is_https = url.scheme() == "https";

        let mut pairs: Vec<String> = Vec::new();
        for (domain, cookies) in &self.entries {
            let domain_matches =
                host == domain || host.ends_with(&format!(".{}", domain));
            if !domain_matches {
                continue;
            }

            for cookie in cookies.values() {
                let path_matches = match &cookie.path {
                    Some(cookie_path) => path.starts_with(cookie_path.as_str()),
                    None => true,
                };
                if !path_matches {
                    continue;
                }
                if cookie.secure && !is_https {
                    continue;
                }
                pairs.push(format!("{}={}", cookie.name, cookie.value));
            }
        }

        pairs.sort();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn all_cookies(&self) -> Vec<(String, Cookie)> {
        let mut out: Vec<(String, Cookie)> = self
            .entries
            .iter()
            .flat_map(|(domain, cookies)| {
                cookies
                    .values()
                    .map(move |c| (domain.clone(), c.clone()))
            })
            .collect();
        out.sort_by(|a, b| (&a.0, &a.1.name).cmp(&(&b.0, &b.1.name)));
        out
    }

    fn remove_cookie(&mut self, domain: &str, name: &str) {
        if let Some(cookies) = self.entries.get_mut(domain) {
            cookies.remove(name);
            if cookies.is_empty() {
                self.entries.remove(domain);
            }
        }
    }
}
