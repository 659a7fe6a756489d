//! C-ABI wrapper around `dozuki-core`.
//!
//! # Overview
//! Exposes every Dozuki resource request through `extern "C"` functions so
//! any language with a C FFI can build requests and decode responses while
//! running the HTTP round trip itself.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - One `dozuki_build_*` per core `build_*` method. All responses go through
//!   `dozuki_parse_response`, except the token response, which
//!   `dozuki_parse_auth_token` stores on the handle.
//! - The C caller owns all returned pointers and must call the matching
//!   `dozuki_free_*` function to release them.

pub mod types;

use std::ffi::CString;
use std::os::raw::c_char;
use std::panic::catch_unwind;

use dozuki_core::{
    ClientConfig, DozukiClient, HttpRequest, HttpResponse, NewGuide, SearchFilter, SearchOptions,
};

use types::*;

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a client for the site at `endpoint`, identified by `app_id`.
///
/// Returns null if either argument is null or not UTF-8, if the endpoint is
/// not an http(s) URL, if `app_id` is blank, or if an internal panic occurs.
/// The caller must free the returned pointer with `dozuki_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_client_new(
    endpoint: *const c_char,
    app_id: *const c_char,
) -> *mut FfiDozukiClient {
    catch_unwind(|| {
        let (Some(endpoint), Some(app_id)) = (unsafe { read_str(endpoint) }, unsafe { read_str(app_id) })
        else {
            return std::ptr::null_mut();
        };
        match ClientConfig::new(endpoint, Some(app_id)) {
            Ok(config) => Box::into_raw(Box::new(FfiDozukiClient {
                inner: DozukiClient::with_transport(config, ()),
            })),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `dozuki_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_client_free(client: *mut FfiDozukiClient) {
    if !client.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(client) });
        });
    }
}

/// Replace the auth token sent with POST requests.
///
/// Returns false if either argument is null or `token` is not UTF-8.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_client_set_auth_token(
    client: *mut FfiDozukiClient,
    token: *const c_char,
) -> bool {
    catch_unwind(|| {
        if client.is_null() {
            return false;
        }
        let Some(token) = (unsafe { read_str(token) }) else {
            return false;
        };
        let client = unsafe { &mut *client };
        client.inner.set_auth_token(token);
        true
    })
    .unwrap_or(false)
}

/// The current auth token, or null when none is set.
///
/// The caller must free a non-null result with `dozuki_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_client_auth_token(client: *const FfiDozukiClient) -> *mut c_char {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        match client.inner.auth_token() {
            Some(token) => to_c_string(token),
            None => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Build request functions
// ---------------------------------------------------------------------------

fn request_or_null(result: dozuki_core::Result<HttpRequest>) -> *mut FfiHttpRequest {
    match result {
        Ok(req) => FfiHttpRequest::from_core(req),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Build the token request for `email` and `password`.
///
/// Returns null if any argument is null or not UTF-8.
/// The caller must free the returned pointer with `dozuki_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_build_auth_token(
    client: *const FfiDozukiClient,
    email: *const c_char,
    password: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let (Some(email), Some(password)) = (unsafe { read_str(email) }, unsafe { read_str(password) })
        else {
            return std::ptr::null_mut();
        };
        let client = unsafe { &*client };
        request_or_null(client.inner.build_auth_token(email, password))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build a request for the category hierarchy.
///
/// Returns null if `client` is null.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_build_list_categories(client: *const FfiDozukiClient) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        FfiHttpRequest::from_core(client.inner.build_list_categories())
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build a request for one category page. `name` must already be
/// URL-encoded.
///
/// Returns null if `client` or `name` is null, or if `name` is blank.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_build_get_category(
    client: *const FfiDozukiClient,
    name: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let Some(name) = (unsafe { read_str(name) }) else {
            return std::ptr::null_mut();
        };
        let client = unsafe { &*client };
        request_or_null(client.inner.build_get_category(name))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build a request for the flat list of category names.
///
/// Returns null if `client` is null.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_build_list_categories_flat(
    client: *const FfiDozukiClient,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        FfiHttpRequest::from_core(client.inner.build_list_categories_flat())
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build a request listing guides.
///
/// Returns null if `client` is null.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_build_list_guides(client: *const FfiDozukiClient) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        FfiHttpRequest::from_core(client.inner.build_list_guides())
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build a request for one guide.
///
/// Returns null if `client` is null or `guide_id` is 0.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_build_get_guide(
    client: *const FfiDozukiClient,
    guide_id: u64,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        request_or_null(client.inner.build_get_guide(guide_id))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build a guide creation request from a JSON object such as
/// `{"category":"Examples","type":"repair","subject":"Hinge"}`.
///
/// Returns null if `client` or `guide_json` is null, if the JSON does not
/// describe a valid guide, or if serialization fails.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_build_create_guide(
    client: *const FfiDozukiClient,
    guide_json: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let Some(guide_json) = (unsafe { read_str(guide_json) }) else {
            return std::ptr::null_mut();
        };
        let guide = match serde_json::from_str::<serde_json::Value>(guide_json)
            .map_err(dozuki_core::ClientError::from)
            .and_then(NewGuide::try_from)
        {
            Ok(g) => g,
            Err(_) => return std::ptr::null_mut(),
        };
        let client = unsafe { &*client };
        request_or_null(client.inner.build_create_guide(&guide))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build a request listing work log entries.
///
/// Returns null if `client` is null.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_build_list_work_logs(client: *const FfiDozukiClient) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        FfiHttpRequest::from_core(client.inner.build_list_work_logs())
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build a request for one work log entry.
///
/// Returns null if `client` is null or `entry_id` is 0.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_build_get_work_log(
    client: *const FfiDozukiClient,
    entry_id: u64,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        request_or_null(client.inner.build_get_work_log(entry_id))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build a search request.
///
/// `filter` may be null (no filter) or a comma-separated list of result
/// types such as `"guide,category"`.
/// Returns null if `client` or `query` is null, if `query` is blank, if
/// `limit` is outside 1..=200, or if `filter` names an unknown type.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_build_search(
    client: *const FfiDozukiClient,
    query: *const c_char,
    offset: u32,
    limit: u32,
    filter: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let Some(query) = (unsafe { read_str(query) }) else {
            return std::ptr::null_mut();
        };
        let filters = if filter.is_null() {
            Vec::new()
        } else {
            let parsed = unsafe { read_str(filter) }
                .ok_or(())
                .and_then(|f| SearchFilter::parse_list(f).map_err(|_| ()));
            match parsed {
                Ok(filters) => filters,
                Err(()) => return std::ptr::null_mut(),
            }
        };
        let options = SearchOptions {
            offset,
            limit,
            filters,
        };
        let client = unsafe { &*client };
        request_or_null(client.inner.build_search(query, &options))
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Parse response functions
// ---------------------------------------------------------------------------

/// Copy an `FfiHttpResponse` into a core `HttpResponse`. A null body is an
/// empty body.
fn ffi_response_to_core(resp: &FfiHttpResponse) -> HttpResponse {
    let body = if resp.body.is_null() || resp.body_len == 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(resp.body, resp.body_len) }.to_vec()
    };
    HttpResponse::new(resp.status, body)
}

/// Decode the response to a request built by any `dozuki_build_*` function
/// except `dozuki_build_auth_token`.
///
/// `request` supplies the URL reported in errors. On success `json` holds the
/// decoded body as JSON text.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_parse_response(
    request: *const FfiHttpRequest,
    response: *const FfiHttpResponse,
) -> *mut FfiDozukiResult {
    catch_unwind(|| {
        if request.is_null() {
            return FfiDozukiResult::null_arg("request");
        }
        if response.is_null() {
            return FfiDozukiResult::null_arg("response");
        }
        let req = unsafe { &*request };
        let Some(url) = (unsafe { read_str(req.url) }) else {
            return FfiDozukiResult::null_arg("request.url");
        };
        let core_resp = ffi_response_to_core(unsafe { &*response });
        match dozuki_core::parse_response(url, &core_resp) {
            Ok(value) => FfiDozukiResult::ok_json(&value),
            Err(e) => FfiDozukiResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiDozukiResult::panic("panic in dozuki_parse_response"))
}

/// Decode the response to a `dozuki_build_auth_token` request and store
/// the token on `client`.
///
/// Every failure is reported with `error_code = Authentication` and
/// `http_status` set to the response status; the client keeps its previous
/// token in that case.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_parse_auth_token(
    client: *mut FfiDozukiClient,
    response: *const FfiHttpResponse,
) -> *mut FfiDozukiResult {
    catch_unwind(|| {
        if client.is_null() {
            return FfiDozukiResult::null_arg("client");
        }
        if response.is_null() {
            return FfiDozukiResult::null_arg("response");
        }
        let client = unsafe { &mut *client };
        let core_resp = ffi_response_to_core(unsafe { &*response });
        match client.inner.store_auth_token(&core_resp) {
            Ok(()) => FfiDozukiResult::ok_empty(),
            Err(e) => FfiDozukiResult::from_auth_error(e, core_resp.status),
        }
    })
    .unwrap_or_else(|_| FfiDozukiResult::panic("panic in dozuki_parse_auth_token"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiHttpRequest` returned by any `dozuki_build_*` function.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let req = unsafe { Box::from_raw(req) };
        if !req.url.is_null() {
            drop(unsafe { CString::from_raw(req.url) });
        }
        if !req.body.is_null() {
            drop(unsafe { CString::from_raw(req.body) });
        }
        if !req.headers.is_null() && req.headers_len > 0 {
            let headers = unsafe {
                Vec::from_raw_parts(req.headers, req.headers_len as usize, req.headers_len as usize)
            };
            for h in headers {
                if !h.key.is_null() {
                    drop(unsafe { CString::from_raw(h.key) });
                }
                if !h.value.is_null() {
                    drop(unsafe { CString::from_raw(h.value) });
                }
            }
        }
    });
}

/// Free an `FfiDozukiResult` returned by any `dozuki_parse_*` function.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_free_result(result: *mut FfiDozukiResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { CString::from_raw(result.error_message) });
        }
        if !result.json.is_null() {
            drop(unsafe { CString::from_raw(result.json) });
        }
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn dozuki_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
