//! Response translation.
//!
//! # Responsibilities
//! - Relay the upstream status (with the optional 301 → 200 remap)
//! - Relay sanitized upstream headers
//! - Either stream the body through untouched, or buffer it and wrap it in
//!   a `{status, contentType, data}` envelope
//!
//! # Design Decisions
//! - Streaming keeps memory O(1) in body size; a mid-stream failure aborts
//!   the connection instead of producing a truncated "complete" body
//! - Envelope classification is a pure function over (mode, type, bytes)

use std::io::Read;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::read::GzDecoder;
use serde::Serialize;

use crate::config::ResponseType;
use crate::error::Result;
use crate::forward::UpstreamResponse;
use crate::security::headers::outbound_response_headers;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Upper bound on a decompressed envelope body.
const MAX_INFLATED_BYTES: u64 = 32 * 1024 * 1024;

pub const HTML_UTF8: &str = "text/html; charset=utf-8";
pub const JSON_UTF8: &str = "application/json; charset=utf-8";
pub const TEXT_UTF8: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// Buffered response handed back in envelope mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub status: u16,
    pub content_type: String,
    pub data: String,
}

/// Status reported to the caller.
pub fn client_status(upstream: StatusCode, remap_moved_permanently: bool) -> StatusCode {
    if remap_moved_permanently && upstream == StatusCode::MOVED_PERMANENTLY {
        StatusCode::OK
    } else {
        upstream
    }
}

/// HTTP status carrying an envelope. Statuses that forbid a body (1xx, 204,
/// 205, 304) are sent as 200; the envelope's `status` keeps the original.
pub fn envelope_http_status(status: StatusCode) -> StatusCode {
    let forbids_body = status.is_informational()
        || matches!(
            status,
            StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT | StatusCode::NOT_MODIFIED
        );
    if forbids_body {
        StatusCode::OK
    } else {
        status
    }
}

/// Build the outbound response for `upstream` in the requested mode.
pub async fn translate(
    upstream: UpstreamResponse,
    response_type: ResponseType,
    remap_moved_permanently: bool,
) -> Result<Response> {
    let status = client_status(upstream.status, remap_moved_permanently);
    let headers = outbound_response_headers(&upstream.headers, response_type.is_envelope());

    if !response_type.is_envelope() {
        let mut response = Response::new(Body::from_stream(upstream.into_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        return Ok(response);
    }

    let upstream_type = upstream
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = upstream.bytes().await?;

    let (content_type, data) = encode(response_type, upstream_type.as_deref(), &body);
    let envelope = Envelope {
        status: status.as_u16(),
        content_type,
        data,
    };

    let mut response = (envelope_http_status(status), Json(envelope)).into_response();
    for (name, value) in headers.iter() {
        response.headers_mut().append(name.clone(), value.clone());
    }
    Ok(response)
}

fn is_binary(content_type: &str) -> bool {
    let ct = content_type.trim().to_ascii_lowercase();
    ct.starts_with("image/") || ct.starts_with("application/pdf") || ct.starts_with(OCTET_STREAM)
}

fn contains_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|w| w.eq_ignore_ascii_case(needle))
}

fn looks_like_html(content_type: &str, body: &[u8]) -> bool {
    content_type.trim().to_ascii_lowercase().starts_with("text/html")
        || contains_ignore_case(body, b"<html")
        || contains_ignore_case(body, b"<!doctype")
}

fn gunzip(body: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(body)
        .take(MAX_INFLATED_BYTES)
        .read_to_end(&mut out)
        .ok()?;
    Some(out)
}

fn text(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}

/// Classify and encode an upstream body. Returns `(contentType, data)`.
pub fn encode(response_type: ResponseType, upstream_type: Option<&str>, body: &[u8]) -> (String, String) {
    let upstream_type = upstream_type.unwrap_or("text/plain");

    match response_type {
        ResponseType::Html => (HTML_UTF8.to_string(), text(body)),
        ResponseType::Text => (TEXT_UTF8.to_string(), text(body)),
        ResponseType::Json => {
            if is_binary(upstream_type) {
                (upstream_type.to_string(), STANDARD.encode(body))
            } else if body.starts_with(&GZIP_MAGIC) {
                match gunzip(body) {
                    Some(inflated) => (JSON_UTF8.to_string(), text(&inflated)),
                    None => (OCTET_STREAM.to_string(), STANDARD.encode(body)),
                }
            } else {
                (JSON_UTF8.to_string(), text(body))
            }
        }
        ResponseType::Auto | ResponseType::Stream => {
            if is_binary(upstream_type) {
                (upstream_type.to_string(), STANDARD.encode(body))
            } else if looks_like_html(upstream_type, body) {
                (HTML_UTF8.to_string(), text(body))
            } else {
                (upstream_type.to_string(), text(body))
            }
        }
    }
}
