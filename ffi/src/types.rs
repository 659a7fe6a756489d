//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, pointer + length instead of `Vec`, and
//! enums with explicit discriminants. Decoded JSON crosses the boundary as
//! text; the host parses it with whatever JSON library it already has.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use dozuki_core::{ClientError, DozukiClient, HttpMethod, HttpRequest, JsonErrorKind};

/// Opaque handle to a client. The host executes requests itself, so the
/// wrapped client carries no transport.
pub struct FfiDozukiClient {
    pub(crate) inner: DozukiClient<()>,
}

/// Copy `s` into a heap C string, dropping interior NULs.
pub(crate) fn to_c_string(s: impl Into<Vec<u8>>) -> *mut c_char {
    let c_string = CString::new(s).unwrap_or_else(|e| {
        let mut bytes = e.into_vec();
        bytes.retain(|b| *b != 0);
        CString::new(bytes).unwrap_or_default()
    });
    c_string.into_raw()
}

/// Borrow a C string as UTF-8. `None` for null or non-UTF-8 input.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
pub(crate) unsafe fn read_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request described as C-compatible plain data.
///
/// Built by `dozuki_build_*` functions. The host executes the request and
/// passes it back, together with the response, to `dozuki_parse_*`.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
}

impl FfiHttpRequest {
    /// Convert a core `HttpRequest` into a heap-allocated `FfiHttpRequest`.
    pub(crate) fn from_core(req: HttpRequest) -> *mut Self {
        let url = to_c_string(req.url);
        let body = match req.body {
            Some(b) => to_c_string(b),
            None => std::ptr::null_mut(),
        };

        let headers_len = req.headers.len() as u32;
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_headers: Box<[FfiHeader]> = req
                .headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: to_c_string(k),
                    value: to_c_string(v),
                })
                .collect();
            Box::into_raw(ffi_headers) as *mut FfiHeader
        };

        Box::into_raw(Box::new(FfiHttpRequest {
            method: req.method.into(),
            url,
            headers,
            headers_len,
            body,
        }))
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// The host fills this in after executing a request. The body is raw bytes
/// and need not be NUL-terminated. The FFI layer reads but never frees it.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const u8,
    pub body_len: usize,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    Configuration = 1,
    Transport = 2,
    Api = 3,
    Decode = 4,
    Authentication = 5,
    Validation = 6,
    Serialization = 7,
    Panic = 8,
    NullArg = 9,
}

/// Decode failure detail, set when `error_code` is `Decode`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiDecodeError {
    NotApplicable = 0,
    NullBody = 1,
    DepthExceeded = 2,
    StateMismatch = 3,
    ControlCharacter = 4,
    Syntax = 5,
    MalformedEncoding = 6,
    Unknown = 7,
}

impl From<JsonErrorKind> for FfiDecodeError {
    fn from(kind: JsonErrorKind) -> Self {
        match kind {
            JsonErrorKind::None => FfiDecodeError::NullBody,
            JsonErrorKind::DepthExceeded => FfiDecodeError::DepthExceeded,
            JsonErrorKind::StateMismatch => FfiDecodeError::StateMismatch,
            JsonErrorKind::ControlCharacter => FfiDecodeError::ControlCharacter,
            JsonErrorKind::Syntax => FfiDecodeError::Syntax,
            JsonErrorKind::MalformedEncoding => FfiDecodeError::MalformedEncoding,
            JsonErrorKind::Unknown => FfiDecodeError::Unknown,
        }
    }
}

/// Result envelope for all parse operations.
///
/// On success `error_code` is `Ok`, `error_message` is null, and `json`
/// holds the decoded body re-serialized as JSON text (null for operations
/// with no payload). On failure `error_code` names the category,
/// `error_message` is human-readable, and `json` is null.
#[repr(C)]
pub struct FfiDozukiResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub decode_error: FfiDecodeError,
    pub json: *mut c_char,
}

impl FfiDozukiResult {
    fn boxed(self) -> *mut Self {
        Box::into_raw(Box::new(self))
    }

    pub(crate) fn ok_json(value: &serde_json::Value) -> *mut Self {
        FfiDozukiResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            http_status: 200,
            decode_error: FfiDecodeError::NotApplicable,
            json: to_c_string(value.to_string()),
        }
        .boxed()
    }

    pub(crate) fn ok_empty() -> *mut Self {
        FfiDozukiResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            http_status: 200,
            decode_error: FfiDecodeError::NotApplicable,
            json: std::ptr::null_mut(),
        }
        .boxed()
    }

    pub(crate) fn from_error(err: ClientError) -> *mut Self {
        Self::error_value(err).boxed()
    }

    /// Failure of a token exchange. `status` is the token response's HTTP
    /// status, so hosts can tell a rejected login from a server failure.
    pub(crate) fn from_auth_error(err: ClientError, status: u16) -> *mut Self {
        let mut result = Self::error_value(err);
        result.http_status = status;
        result.boxed()
    }

    fn error_value(err: ClientError) -> Self {
        let (error_code, http_status, decode_error) = match &err {
            ClientError::Configuration(_) => {
                (FfiErrorCode::Configuration, 0, FfiDecodeError::NotApplicable)
            }
            ClientError::Transport { .. } => {
                (FfiErrorCode::Transport, 0, FfiDecodeError::NotApplicable)
            }
            ClientError::Api { status, .. } => {
                (FfiErrorCode::Api, *status, FfiDecodeError::NotApplicable)
            }
            ClientError::Decode { kind, .. } => (FfiErrorCode::Decode, 200, (*kind).into()),
            ClientError::Authentication { .. } => {
                (FfiErrorCode::Authentication, 0, FfiDecodeError::NotApplicable)
            }
            ClientError::Validation(_) => {
                (FfiErrorCode::Validation, 0, FfiDecodeError::NotApplicable)
            }
            ClientError::Serialization(_) => {
                (FfiErrorCode::Serialization, 0, FfiDecodeError::NotApplicable)
            }
        };

        FfiDozukiResult {
            error_code,
            error_message: to_c_string(err.to_string()),
            http_status,
            decode_error,
            json: std::ptr::null_mut(),
        }
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::failure(FfiErrorCode::NullArg, &format!("null or invalid argument: {name}"))
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::failure(FfiErrorCode::Panic, msg)
    }

    fn failure(error_code: FfiErrorCode, msg: &str) -> *mut Self {
        FfiDozukiResult {
            error_code,
            error_message: to_c_string(msg),
            http_status: 0,
            decode_error: FfiDecodeError::NotApplicable,
            json: std::ptr::null_mut(),
        }
        .boxed()
    }
}
