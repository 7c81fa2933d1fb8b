//! Client configuration.
//!
//! The API base URL follows the frontend convention of a public build-time variable,
//! `NEXT_PUBLIC_API_URL`. On native targets the runtime environment wins over the
//! value baked in at compile time.

use std::time::Duration;
use url::Url;

/// Environment variable holding the marketplace API base URL.
pub const API_URL_ENV: &str = "NEXT_PUBLIC_API_URL";
/// Base URL used when [`API_URL_ENV`] is unset or invalid.
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_TOKEN_REFRESH_INTERVAL: Duration = Duration::from_secs(14 * 60);

/// Settings shared by [`ApiClient`](crate::ApiClient) and the stores built on it.
#[derive(Debug, Clone, bon::Builder)]
pub struct ClientConfig {
    /// Root of the REST API; endpoint paths such as `/api/cart` are joined onto it.
    #[builder(default = default_api_url())]
    pub api_base_url: Url,

    /// Per-request timeout. Ignored on `wasm32`, where `fetch` has no timeout.
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    pub request_timeout: Duration,

    /// How often an authenticated session refreshes its bearer token.
    #[builder(default = DEFAULT_TOKEN_REFRESH_INTERVAL)]
    pub token_refresh_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientConfig {
    /// Reads [`API_URL_ENV`], falling back to [`DEFAULT_API_URL`].
    pub fn from_env() -> Self {
        let api_base_url = api_url_from_env().unwrap_or_else(default_api_url);
        Self::builder().api_base_url(api_base_url).build()
    }
}

fn api_url_from_env() -> Option<Url> {
    #[cfg(not(target_family = "wasm"))]
    let runtime = std::env::var(API_URL_ENV).ok();
    #[cfg(target_family = "wasm")]
    let runtime: Option<String> = None;
    resolve_base_url(runtime.as_deref(), option_env!("NEXT_PUBLIC_API_URL"))
}

/// The runtime value wins when it parses; otherwise the compile-time one is used.
fn resolve_base_url(runtime: Option<&str>, compiled: Option<&str>) -> Option<Url> {
    runtime
        .and_then(parse_base_url)
        .or_else(|| compiled.and_then(parse_base_url))
}

fn parse_base_url(value: &str) -> Option<Url> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match Url::parse(value) {
        Ok(url) => Some(url),
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("Ignoring invalid {API_URL_ENV} value {value:?}: {_e}");
            None
        }
    }
}

fn default_api_url() -> Url {
    Url::parse(DEFAULT_API_URL).expect("DEFAULT_API_URL is a valid URL")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_backend() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base_url.as_str(), "http://localhost:5000/");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.token_refresh_interval, Duration::from_secs(840));
    }

    #[test]
    fn builder_overrides_individual_fields() {
        let config = ClientConfig::builder()
            .api_base_url(Url::parse("https://api.caicos.example").unwrap())
            .token_refresh_interval(Duration::from_secs(60))
            .build();
        assert_eq!(config.api_base_url.host_str(), Some("api.caicos.example"));
        assert_eq!(config.token_refresh_interval, Duration::from_secs(60));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn invalid_runtime_url_falls_back_to_compiled_one() {
        let compiled = Some("https://build.example.com");
        let resolved = |runtime| resolve_base_url(runtime, compiled).map(|url| url.to_string());

        assert_eq!(
            resolved(Some("https://runtime.example.com")).as_deref(),
            Some("https://runtime.example.com/")
        );
        assert_eq!(resolved(Some("not a url")).as_deref(), Some("https://build.example.com/"));
        assert_eq!(resolved(Some("  ")).as_deref(), Some("https://build.example.com/"));
        assert_eq!(resolved(None).as_deref(), Some("https://build.example.com/"));
        assert_eq!(resolve_base_url(Some("not a url"), None), None);
    }

    #[test]
    fn blank_or_invalid_urls_are_ignored() {
        assert!(parse_base_url("   ").is_none());
        assert!(parse_base_url("not a url").is_none());
        assert_eq!(
            parse_base_url(" https://api.example.com ").map(|url| url.to_string()),
            Some("https://api.example.com/".to_string())
        );
    }
}
