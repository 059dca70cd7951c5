//! Inbound request handling.
//!
//! # Responsibilities
//! - Read the `url` and `responseType` query parameters
//! - Validate the target URL before any I/O
//! - Buffer the body (bounded) only for methods that forward one
//!
//! # Design Decisions
//! - Checks run cheapest-first: missing url, bad url, bad mode, body size
//! - The result is immutable once built

use axum::body::{Body, Bytes};
use axum::http::{header, request::Parts, HeaderMap, Method, Request};
use serde::Deserialize;
use url::Url;

use crate::config::{ProxyConfig, ResponseType};
use crate::error::{ProxyError, Result};
use crate::forward::carries_body;
use crate::security::validate_target;

/// Query string of `/proxy`.
#[derive(Debug, Default, Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
    #[serde(rename = "responseType")]
    pub response_type: Option<String>,
}

/// A validated inbound proxy call.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub target: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub response_type: ResponseType,
}

impl ProxyRequest {
    /// Validate `query` and take ownership of the inbound request.
    pub async fn extract(query: ProxyQuery, request: Request<Body>, config: &ProxyConfig) -> Result<Self> {
        let candidate = match query.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => return Err(ProxyError::MissingUrl),
        };
        let target = validate_target(candidate)?;

        let response_type = match query.response_type.as_deref() {
            None | Some("") => config.forward.default_response_type,
            Some(value) => ResponseType::from_query(value)
                .ok_or_else(|| ProxyError::InvalidResponseType(value.to_string()))?,
        };

        let (parts, body) = request.into_parts();
        let body = read_body(&parts, body, config.security.max_body_size).await?;

        Ok(Self {
            method: parts.method,
            target,
            headers: parts.headers,
            body,
            response_type,
        })
    }
}

async fn read_body(parts: &Parts, body: Body, limit: usize) -> Result<Option<Bytes>> {
    if !carries_body(&parts.method) {
        return Ok(None);
    }

    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if matches!(declared, Some(len) if len > limit) {
        return Err(ProxyError::PayloadTooLarge { limit });
    }

    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| ProxyError::PayloadTooLarge { limit })?;

    Ok(if bytes.is_empty() { None } else { Some(bytes) })
}
