//! Webhook target resolution
//!
//! Picks the upstream URL from the layered configuration sources and decides
//! how the API key travels. Priority, first match wins:
//!
//! 1. persisted override URL, verbatim
//! 2. `base_url` + normalized `webhook_path`
//! 3. legacy full URL, verbatim
//!
//! Nothing here performs I/O.

use crate::config::{WebhookConfig, DEFAULT_API_KEY_HEADER};
use axum::http::{HeaderName, HeaderValue};
use std::collections::BTreeMap;
use tracing::warn;
use url::Url;

const PRODUCTION_PREFIX: &str = "webhook/";
const TEST_PREFIX: &str = "webhook-test/";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct ConfigError {
    pub reason: String,
}

impl ConfigError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn not_configured() -> Self {
        Self::new("webhook not configured")
    }
}

/// How the API key is attached to a resolved target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    None,
    Header,
    Query,
}

impl Credential {
    pub fn as_str(&self) -> &'static str {
        match self {
            Credential::None => "none",
            Credential::Header => "header",
            Credential::Query => "query",
        }
    }
}

/// Where the resolved URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    Override,
    Composed,
    Legacy,
}

#[derive(Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub credential: Credential,
    pub source: TargetSource,
}

// Header values may carry the API key; only the names are printed.
impl std::fmt::Debug for WebhookTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookTarget")
            .field("url", &self.url)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("credential", &self.credential)
            .field("source", &self.source)
            .finish()
    }
}

/// Resolve the upstream target for one request.
pub fn resolve(
    config: &WebhookConfig,
    override_url: Option<&str>,
) -> Result<WebhookTarget, ConfigError> {
    let (url, source) = base_target(config, override_url)?;
    attach_credentials(config, url, source)
}

/// The URL the relay would call, before any credential is attached.
pub fn base_target(
    config: &WebhookConfig,
    override_url: Option<&str>,
) -> Result<(String, TargetSource), ConfigError> {
    if let Some(url) = override_url.filter(|u| !u.trim().is_empty()) {
        return Ok((url.to_string(), TargetSource::Override));
    }

    let base = non_blank(config.base_url.as_deref());
    let path = config
        .webhook_path
        .as_deref()
        .and_then(normalize_webhook_path);
    if let (Some(base), Some(path)) = (base, path) {
        let url = format!("{}/webhook/{}", base.trim_end_matches('/'), path);
        return Ok((url, TargetSource::Composed));
    }

    if let Some(url) = non_blank(config.legacy_full_url.as_deref()) {
        return Ok((url.to_string(), TargetSource::Legacy));
    }

    Err(ConfigError::not_configured())
}

/// Normalize a configured webhook path to the part after `/webhook/`.
///
/// Returns `None` when nothing usable is left.
pub fn normalize_webhook_path(raw: &str) -> Option<String> {
    let mut path = raw.trim().trim_matches('/');

    if let Some(rest) = path.strip_prefix(TEST_PREFIX) {
        warn!(
            webhook_path = raw,
            "webhook path uses the n8n test prefix; using the production webhook instead"
        );
        path = rest;
    } else if let Some(rest) = path.strip_prefix(PRODUCTION_PREFIX) {
        path = rest;
    } else if path == "webhook" || path == "webhook-test" {
        path = "";
    }

    let path = path.trim_matches('/');
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

fn attach_credentials(
    config: &WebhookConfig,
    url: String,
    source: TargetSource,
) -> Result<WebhookTarget, ConfigError> {
    let mut headers = BTreeMap::new();

    let Some(api_key) = non_blank(config.api_key.as_deref()) else {
        return Ok(WebhookTarget {
            url,
            headers,
            credential: Credential::None,
            source,
        });
    };

    if let Some(param) = non_blank(config.api_key_query_param.as_deref()) {
        let url = upsert_query_param(&url, param, api_key)?;
        return Ok(WebhookTarget {
            url,
            headers,
            credential: Credential::Query,
            source,
        });
    }

    let header_name = non_blank(Some(config.api_key_header_name.as_str()))
        .unwrap_or(DEFAULT_API_KEY_HEADER);
    HeaderName::from_bytes(header_name.as_bytes())
        .map_err(|_| ConfigError::new(format!("invalid API key header name: {}", header_name)))?;
    HeaderValue::from_str(api_key)
        .map_err(|_| ConfigError::new("API key is not a valid header value"))?;
    headers.insert(header_name.to_string(), api_key.to_string());

    Ok(WebhookTarget {
        url,
        headers,
        credential: Credential::Header,
        source,
    })
}

/// Set `name=value` in the URL's query string. An existing entry keeps its
/// position, duplicates of it are dropped, other parameters are untouched.
fn upsert_query_param(raw_url: &str, name: &str, value: &str) -> Result<String, ConfigError> {
    let mut url = Url::parse(raw_url)
        .map_err(|e| ConfigError::new(format!("invalid webhook url: {}", e)))?;

    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut replaced = false;
    for (k, v) in url.query_pairs() {
        if k == name {
            if !replaced {
                pairs.push((k.into_owned(), value.to_string()));
                replaced = true;
            }
        } else {
            pairs.push((k.into_owned(), v.into_owned()));
        }
    }
    if !replaced {
        pairs.push((name.to_string(), value.to_string()));
    }

    url.query_pairs_mut().clear().extend_pairs(pairs.iter());
    Ok(url.to_string())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composed(base: &str, path: &str) -> WebhookConfig {
        WebhookConfig {
            base_url: Some(base.to_string()),
            webhook_path: Some(path.to_string()),
            ..WebhookConfig::default()
        }
    }

    fn legacy(url: &str) -> WebhookConfig {
        WebhookConfig {
            legacy_full_url: Some(url.to_string()),
            ..WebhookConfig::default()
        }
    }

    #[test]
    fn test_legacy_url_unchanged() {
        for url in [
            "https://hooks.example.com/webhook/985e88ec",
            "http://localhost:8001/webhook/chat?x=1&y=two",
            "https://n8n.test/custom/path/",
        ] {
            let target = resolve(&legacy(url), None).unwrap();
            assert_eq!(target.url, url);
            assert_eq!(target.source, TargetSource::Legacy);
            assert!(target.headers.is_empty());
        }
    }

    #[test]
    fn test_webhook_prefix_stripped_once() {
        let target = resolve(&composed("https://x.test", "/webhook/abc"), None).unwrap();
        assert_eq!(target.url, "https://x.test/webhook/abc");
        assert_eq!(target.source, TargetSource::Composed);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let target = resolve(&composed("https://x.test///", "abc/"), None).unwrap();
        assert_eq!(target.url, "https://x.test/webhook/abc");
    }

    #[test]
    fn test_test_prefix_becomes_production_path() {
        let target = resolve(&composed("https://x.test", "webhook-test/abc"), None).unwrap();
        assert_eq!(target.url, "https://x.test/webhook/abc");

        let target = resolve(&composed("https://x.test", "/webhook-test/abc/"), None).unwrap();
        assert_eq!(target.url, "https://x.test/webhook/abc");
    }

    #[test]
    fn test_normalize_webhook_path() {
        assert_eq!(normalize_webhook_path("abc").as_deref(), Some("abc"));
        assert_eq!(normalize_webhook_path("/webhook/a/b/").as_deref(), Some("a/b"));
        assert_eq!(normalize_webhook_path("   "), None);
        assert_eq!(normalize_webhook_path("/"), None);
        assert_eq!(normalize_webhook_path("/webhook/"), None);
        assert_eq!(normalize_webhook_path("webhook-test/"), None);
    }

    #[test]
    fn test_blank_path_falls_back_to_legacy() {
        let config = WebhookConfig {
            base_url: Some("https://x.test".to_string()),
            webhook_path: Some("/webhook/".to_string()),
            legacy_full_url: Some("https://legacy.test/hook".to_string()),
            ..WebhookConfig::default()
        };
        let target = resolve(&config, None).unwrap();
        assert_eq!(target.url, "https://legacy.test/hook");
    }

    #[test]
    fn test_composed_wins_over_legacy() {
        let config = WebhookConfig {
            legacy_full_url: Some("https://legacy.test/hook".to_string()),
            ..composed("https://x.test", "abc")
        };
        assert_eq!(resolve(&config, None).unwrap().url, "https://x.test/webhook/abc");
    }

    #[test]
    fn test_override_wins() {
        let config = WebhookConfig {
            legacy_full_url: Some("https://legacy.test/hook".to_string()),
            ..composed("https://x.test", "abc")
        };
        let target = resolve(&config, Some("https://override.test/hook")).unwrap();
        assert_eq!(target.url, "https://override.test/hook");
        assert_eq!(target.source, TargetSource::Override);

        // Blank override is ignored
        let target = resolve(&config, Some("  ")).unwrap();
        assert_eq!(target.url, "https://x.test/webhook/abc");
    }

    #[test]
    fn test_nothing_configured_fails_closed() {
        let err = resolve(&WebhookConfig::default(), None).unwrap_err();
        assert_eq!(err.to_string(), "webhook not configured");

        let config = WebhookConfig {
            base_url: Some("https://x.test".to_string()),
            ..WebhookConfig::default()
        };
        assert_eq!(resolve(&config, None).unwrap_err(), ConfigError::not_configured());
    }

    #[test]
    fn test_query_param_takes_precedence_over_header() {
        let config = WebhookConfig {
            api_key: Some("secret".to_string()),
            api_key_query_param: Some("key".to_string()),
            ..legacy("https://x.test/webhook/abc")
        };
        let target = resolve(&config, None).unwrap();

        let url = Url::parse(&target.url).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("key".to_string(), "secret".to_string())]);
        assert!(target.headers.is_empty());
        assert_eq!(target.credential, Credential::Query);
    }

    #[test]
    fn test_query_param_upsert_preserves_other_params() {
        let config = WebhookConfig {
            api_key: Some("new secret".to_string()),
            api_key_query_param: Some("key".to_string()),
            ..legacy("https://x.test/hook?a=1&key=old&b=two&key=dup")
        };
        let target = resolve(&config, None).unwrap();
        assert_eq!(target.url, "https://x.test/hook?a=1&key=new+secret&b=two");
    }

    #[test]
    fn test_query_param_with_invalid_url() {
        let config = WebhookConfig {
            api_key: Some("secret".to_string()),
            api_key_query_param: Some("key".to_string()),
            ..legacy("not a url")
        };
        let err = resolve(&config, None).unwrap_err();
        assert!(err.reason.starts_with("invalid webhook url"));
    }

    #[test]
    fn test_header_attached_when_no_query_param() {
        let config = WebhookConfig {
            api_key: Some("secret".to_string()),
            ..legacy("https://x.test/webhook/abc?a=1")
        };
        let target = resolve(&config, None).unwrap();
        assert_eq!(target.url, "https://x.test/webhook/abc?a=1");
        assert_eq!(target.headers.get("X-N8N-API-KEY").map(String::as_str), Some("secret"));
        assert_eq!(target.headers.len(), 1);
        assert_eq!(target.credential, Credential::Header);
    }

    #[test]
    fn test_custom_header_name() {
        let config = WebhookConfig {
            api_key: Some("secret".to_string()),
            api_key_header_name: "Authorization-Key".to_string(),
            ..legacy("https://x.test/hook")
        };
        let target = resolve(&config, None).unwrap();
        assert_eq!(target.headers.get("Authorization-Key").map(String::as_str), Some("secret"));

        let config = WebhookConfig {
            api_key_header_name: "bad header".to_string(),
            ..config
        };
        assert!(resolve(&config, None).is_err());
    }

    #[test]
    fn test_no_api_key_no_credential() {
        let config = WebhookConfig {
            api_key_query_param: Some("key".to_string()),
            ..legacy("https://x.test/hook")
        };
        let target = resolve(&config, None).unwrap();
        assert_eq!(target.url, "https://x.test/hook");
        assert!(target.headers.is_empty());
        assert_eq!(target.credential, Credential::None);
    }

    #[test]
    fn test_debug_hides_header_values() {
        let config = WebhookConfig {
            api_key: Some("secret".to_string()),
            ..legacy("https://x.test/hook")
        };
        let rendered = format!("{:?}", resolve(&config, None).unwrap());
        assert!(!rendered.contains("secret"));
    }
}
