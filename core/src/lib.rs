//! Synchronous client for the Dozuki API 2.0.
//!
//! # Overview
//! Builds requests against `{endpoint}/api/2.0/`, sends them through a
//! blocking `Transport`, and decodes the JSON that comes back. Failures are
//! returned as `ClientError` variants; nothing is retried.
//!
//! # Design
//! - `ClientConfig` is validated on construction: absolute http(s) endpoint,
//!   non-blank app id, `/api/2.0/` appended exactly once.
//! - `DozukiClient` splits each call into `build_*` (produces an
//!   `HttpRequest`) and `parse_response` (consumes an `HttpResponse`), with
//!   the transport in between. Hosts can run the I/O themselves.
//! - Responses are `serde_json::Value`; the client does no schema checks.
//! - The auth token is the only mutable state and lives on the client.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod types;

pub use client::{parse_response, DozukiClient, TOKEN_PATH};
pub use config::{ClientConfig, RawClientConfig, API_PATH};
pub use error::{ClientError, JsonErrorKind, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportFailure, UreqTransport};
pub use types::{NewGuide, SearchFilter, SearchOptions};
