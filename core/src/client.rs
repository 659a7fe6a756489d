//! The Dozuki API client.
//!
//! # Design
//! `DozukiClient` owns a validated `ClientConfig` and a `Transport`. Every
//! resource method is a `build_*` method producing an `HttpRequest`, a round
//! trip through the transport, and `parse_response`. The build and parse
//! halves are public so a host can run the I/O itself.
//!
//! The only mutable state is the auth token, and changing it needs
//! `&mut self` (or consumes the client via `with_auth_token`).

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, JsonErrorKind, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::types::{Credentials, NewGuide, SearchOptions};

/// Path of the token endpoint, relative to the API base.
pub const TOKEN_PATH: &str = "user/token";

/// Synchronous client for the Dozuki API 2.0.
#[derive(Debug, Clone)]
pub struct DozukiClient<T = UreqTransport> {
    config: ClientConfig,
    transport: T,
}

impl DozukiClient<UreqTransport> {
    /// Client over the default blocking `ureq` transport.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, UreqTransport::new())
    }
}

impl<T> DozukiClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.config.auth_token()
    }

    pub fn set_auth_token(&mut self, token: impl Into<String>) {
        self.config.set_auth_token(token.into());
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.set_auth_token(token);
        self
    }

    // -----------------------------------------------------------------------
    // Request builders
    // -----------------------------------------------------------------------

    /// GET request for an absolute URL.
    pub fn build_get(&self, url: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: url.to_string(),
            headers: vec![("Accept-Charset".to_string(), "utf-8".to_string())],
            body: None,
        }
    }

    /// POST request for an absolute URL with a JSON body. Carries the app id
    /// and, once authenticated, the auth token.
    pub fn build_post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<HttpRequest> {
        let mut request = self.build_app_post(url, body)?;
        if let Some(token) = self.config.auth_token() {
            request
                .headers
                .push(("Authorization".to_string(), format!("api {token}")));
        }
        Ok(request)
    }

    fn build_app_post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<HttpRequest> {
        let body = serde_json::to_string(body)?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: url.to_string(),
            headers: vec![
                ("X-App-Id".to_string(), self.config.app_id().to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: Some(body),
        })
    }

    /// Token request for `email`/`password`. Sent with the app id only.
    pub fn build_auth_token(&self, email: &str, password: &str) -> Result<HttpRequest> {
        let url = self.config.url_for(TOKEN_PATH);
        self.build_app_post(&url, &Credentials { email, password })
    }

    pub fn build_list_categories(&self) -> HttpRequest {
        self.build_get(&self.config.url_for("categories"))
    }

    /// `name` must already be URL-encoded; it is inserted verbatim.
    pub fn build_get_category(&self, name: &str) -> Result<HttpRequest> {
        if name.trim().is_empty() {
            return Err(ClientError::Validation("category name must not be blank".to_string()));
        }
        Ok(self.build_get(&self.config.url_for(&format!("categories/{name}"))))
    }

    pub fn build_list_categories_flat(&self) -> HttpRequest {
        self.build_get(&self.config.url_for("categories/all"))
    }

    pub fn build_list_guides(&self) -> HttpRequest {
        self.build_get(&self.config.url_for("guides"))
    }

    pub fn build_get_guide(&self, guide_id: u64) -> Result<HttpRequest> {
        let guide_id = positive_id("guide", guide_id)?;
        Ok(self.build_get(&self.config.url_for(&format!("guides/{guide_id}"))))
    }

    pub fn build_create_guide(&self, guide: &NewGuide) -> Result<HttpRequest> {
        guide.validate()?;
        self.build_post(&self.config.url_for("guides"), guide)
    }

    pub fn build_list_work_logs(&self) -> HttpRequest {
        self.build_get(&self.config.url_for("work_log"))
    }

    pub fn build_get_work_log(&self, entry_id: u64) -> Result<HttpRequest> {
        let entry_id = positive_id("work log entry", entry_id)?;
        Ok(self.build_get(&self.config.url_for(&format!("work_log/{entry_id}"))))
    }

    /// Search request. `query` is percent-encoded as a single path segment;
    /// paging and filters go in the query string.
    pub fn build_search(&self, query: &str, options: &SearchOptions) -> Result<HttpRequest> {
        if query.trim().is_empty() {
            return Err(ClientError::Validation("search query must not be blank".to_string()));
        }
        options.validate()?;

        let mut url = Url::parse(self.config.base_endpoint())
            .map_err(|e| ClientError::Configuration(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Configuration("endpoint cannot be a base URL".to_string()))?
            .pop_if_empty()
            .push("search")
            .push(query);
        url.query_pairs_mut().extend_pairs(options.query_pairs());

        Ok(self.build_get(url.as_str()))
    }

    // -----------------------------------------------------------------------
    // Response handling
    // -----------------------------------------------------------------------

    /// Parse the response to a `build_auth_token` request and keep the token.
    ///
    /// Any failure, including a body without a string `authToken`, is
    /// reported as `ClientError::Authentication`.
    pub fn store_auth_token(&mut self, response: &HttpResponse) -> Result<()> {
        let url = self.config.url_for(TOKEN_PATH);
        let decoded =
            parse_response(&url, response).map_err(|e| authentication_failure(&url, e))?;
        let token = decoded
            .get("authToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ClientError::Authentication {
                url: url.clone(),
                reason: "response has no authToken".to_string(),
            })?;
        self.config.set_auth_token(token.to_string());
        Ok(())
    }
}

impl<T: Transport> DozukiClient<T> {
    /// Exchange credentials for an auth token and keep it for later POSTs.
    pub fn authenticate(&mut self, email: &str, password: &str) -> Result<()> {
        let request = self.build_auth_token(email, password)?;
        debug!(url = %request.url, "requesting auth token");
        let response = self
            .transport
            .execute(&request)
            .map_err(|e| ClientError::Authentication {
                url: request.url.clone(),
                reason: e.to_string(),
            })?;
        self.store_auth_token(&response).inspect_err(|e| {
            warn!(error = %e, "authentication failed");
        })?;
        info!(app_id = %self.config.app_id(), "authenticated");
        Ok(())
    }

    /// GET an absolute URL and decode the JSON response.
    pub fn get(&self, url: &str) -> Result<Value> {
        self.execute(self.build_get(url))
    }

    /// POST a JSON body to an absolute URL and decode the JSON response.
    pub fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<Value> {
        self.execute(self.build_post(url, body)?)
    }

    /// Category hierarchy, without stub categories.
    pub fn list_categories(&self) -> Result<Value> {
        self.execute(self.build_list_categories())
    }

    /// Full category page and its guides. `name` must be URL-encoded.
    pub fn get_category(&self, name: &str) -> Result<Value> {
        self.execute(self.build_get_category(name)?)
    }

    /// Flat list of category names.
    pub fn list_categories_flat(&self) -> Result<Value> {
        self.execute(self.build_list_categories_flat())
    }

    pub fn list_guides(&self) -> Result<Value> {
        self.execute(self.build_list_guides())
    }

    pub fn get_guide(&self, guide_id: u64) -> Result<Value> {
        self.execute(self.build_get_guide(guide_id)?)
    }

    /// Create a guide. Requires an auth token on the server side.
    pub fn create_guide(&self, guide: &NewGuide) -> Result<Value> {
        self.execute(self.build_create_guide(guide)?)
    }

    pub fn list_work_logs(&self) -> Result<Value> {
        self.execute(self.build_list_work_logs())
    }

    pub fn get_work_log(&self, entry_id: u64) -> Result<Value> {
        self.execute(self.build_get_work_log(entry_id)?)
    }

    pub fn search(&self, query: &str, options: &SearchOptions) -> Result<Value> {
        self.execute(self.build_search(query, options)?)
    }

    fn execute(&self, request: HttpRequest) -> Result<Value> {
        debug!(method = request.method.as_str(), url = %request.url, "sending request");
        let response = self
            .transport
            .execute(&request)
            .map_err(|e| ClientError::Transport {
                url: request.url.clone(),
                cause: e.to_string(),
            })?;
        debug!(status = response.status, bytes = response.body.len(), "received response");
        parse_response(&request.url, &response).inspect_err(|e| {
            warn!(error = %e, "request failed");
        })
    }
}

/// Turn a raw response into decoded JSON or the matching error.
///
/// A non-200 status always wins over a decode failure: the error message is
/// `errors[0].message` from the body when present, else `Status {code}`.
pub fn parse_response(url: &str, response: &HttpResponse) -> Result<Value> {
    let decoded = decode_body(&response.body);

    if response.status != 200 {
        let message = decoded
            .as_ref()
            .ok()
            .and_then(|v| v.pointer("/errors/0/message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Status {}", response.status));
        return Err(ClientError::Api {
            url: url.to_string(),
            status: response.status,
            message,
        });
    }

    decoded.map_err(|kind| ClientError::Decode {
        url: url.to_string(),
        kind,
    })
}

/// Decode a body into JSON. A body that decodes to `null` carries no value
/// and is reported with kind `None`.
fn decode_body(body: &[u8]) -> std::result::Result<Value, JsonErrorKind> {
    if std::str::from_utf8(body).is_err() {
        return Err(JsonErrorKind::MalformedEncoding);
    }
    match serde_json::from_slice(body) {
        Ok(Value::Null) => Err(JsonErrorKind::None),
        Ok(value) => Ok(value),
        Err(e) => Err(JsonErrorKind::classify(body, &e)),
    }
}

fn positive_id(what: &str, id: u64) -> Result<u64> {
    if id == 0 {
        return Err(ClientError::Validation(format!("{what} id must be a positive integer")));
    }
    Ok(id)
}

fn authentication_failure(url: &str, err: ClientError) -> ClientError {
    let reason = match err {
        ClientError::Transport { cause, .. } => cause,
        ClientError::Api { message, .. } => message,
        ClientError::Decode { kind, .. } => kind.to_string(),
        other => other.to_string(),
    };
    ClientError::Authentication {
        url: url.to_string(),
        reason,
    }
}
