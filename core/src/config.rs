//! Client configuration: endpoint, app id and optional auth token.
//!
//! # Design
//! `ClientConfig` can only be obtained through validation, so a value in
//! hand always has a well-formed `base_endpoint`. Embedding applications that
//! keep their settings in a file deserialize `ClientConfig` directly; serde
//! routes through the same validation via `RawClientConfig`.

use serde::Deserialize;
use url::Url;

use crate::error::{ClientError, Result};

/// Path segment every Dozuki API 2.0 route lives under.
pub const API_PATH: &str = "/api/2.0/";

/// Scheme used by `ClientConfig::from_domain`.
pub const DEFAULT_SCHEME: &str = "https";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawClientConfig")]
pub struct ClientConfig {
    base_endpoint: String,
    app_id: String,
    auth_token: Option<String>,
}

/// Unvalidated settings as an embedding application stores them.
///
/// `endpoint` takes precedence over `domain` when both are present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawClientConfig {
    pub endpoint: Option<String>,
    pub domain: Option<String>,
    pub app_id: Option<String>,
    pub auth_token: Option<String>,
}

impl ClientConfig {
    /// Validate `endpoint` and `app_id` and derive the API base URL.
    ///
    /// `endpoint` must be an absolute `http`/`https` URL with a host and no
    /// query or fragment; surrounding whitespace is ignored. The
    /// `/api/2.0/` suffix is appended once; an endpoint that already carries
    /// it is not suffixed again.
    pub fn new(endpoint: &str, app_id: Option<&str>) -> Result<Self> {
        let base_endpoint = base_endpoint(endpoint)?;
        let app_id = match app_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(ClientError::Configuration("app id is required".to_string())),
        };
        Ok(Self {
            base_endpoint,
            app_id,
            auth_token: None,
        })
    }

    /// Build the endpoint from a bare site domain such as
    /// `example.dozuki.com`.
    pub fn from_domain(domain: &str, app_id: Option<&str>) -> Result<Self> {
        let domain = domain.trim();
        if domain.is_empty() {
            return Err(ClientError::Configuration(
                "domain must not be blank".to_string(),
            ));
        }
        Self::new(&format!("{DEFAULT_SCHEME}://{domain}"), app_id)
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Absolute base URL ending in `/api/2.0/`.
    pub fn base_endpoint(&self) -> &str {
        &self.base_endpoint
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub(crate) fn set_auth_token(&mut self, token: String) {
        self.auth_token = Some(token);
    }

    /// Absolute URL for a path relative to the API base, e.g. `guides/3`.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_endpoint, path)
    }
}

impl TryFrom<RawClientConfig> for ClientConfig {
    type Error = ClientError;

    fn try_from(raw: RawClientConfig) -> Result<Self> {
        let config = match (raw.endpoint, raw.domain) {
            (Some(endpoint), _) => Self::new(&endpoint, raw.app_id.as_deref())?,
            (None, Some(domain)) => Self::from_domain(&domain, raw.app_id.as_deref())?,
            (None, None) => {
                return Err(ClientError::Configuration(
                    "either endpoint or domain is required".to_string(),
                ))
            }
        };
        Ok(match raw.auth_token {
            Some(token) if !token.is_empty() => config.with_auth_token(token),
            _ => config,
        })
    }
}

fn base_endpoint(endpoint: &str) -> Result<String> {
    let endpoint = endpoint.trim();
    let parsed = Url::parse(endpoint).map_err(|e| {
        ClientError::Configuration(format!("endpoint '{endpoint}' is not a valid URL: {e}"))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ClientError::Configuration(format!(
            "endpoint '{endpoint}' must be an absolute http(s) URL"
        )));
    }
    // The API path is appended to the URL path, so nothing may follow it.
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(ClientError::Configuration(format!(
            "endpoint '{endpoint}' must not carry a query or fragment"
        )));
    }

    let trimmed = parsed.as_str().trim_end_matches('/');
    let suffix = API_PATH.trim_end_matches('/');
    let root = trimmed.strip_suffix(suffix).unwrap_or(trimmed);
    Ok(format!("{root}{API_PATH}"))
}
