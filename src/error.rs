//! Error taxonomy for the proxy endpoint and its mapping to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::security::{BlockedAddress, InvalidUrl};

pub type Result<T> = std::result::Result<T, ProxyError>;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("missing 'url' parameter")]
    MissingUrl,

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] InvalidUrl),

    #[error("malformed query string: {0}")]
    InvalidQuery(String),

    #[error("invalid responseType: {0}")]
    InvalidResponseType(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("blocked: {0}")]
    Blocked(#[from] BlockedAddress),

    #[error("blocked during upstream call: {0}")]
    BlockedUpstream(String),

    #[error("upstream timed out after {0} seconds")]
    UpstreamTimeout(u64),

    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("upstream protocol error: {0}")]
    UpstreamProtocol(String),
}

/// JSON body for every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub error: &'static str,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingUrl
            | ProxyError::InvalidQuery(_)
            | ProxyError::InvalidUrl(_)
            | ProxyError::InvalidResponseType(_) => StatusCode::BAD_REQUEST,
            ProxyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Blocked(_) | ProxyError::BlockedUpstream(_) => StatusCode::FORBIDDEN,
            ProxyError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::UpstreamUnreachable(_) | ProxyError::UpstreamProtocol(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Caller-facing message. Details stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            ProxyError::MissingUrl => "Missing 'url' parameter.",
            ProxyError::InvalidQuery(_) => "Invalid query string.",
            ProxyError::InvalidUrl(_) => "Invalid URL.",
            ProxyError::InvalidResponseType(_) => "Invalid responseType.",
            ProxyError::PayloadTooLarge { .. } => "Request body too large.",
            ProxyError::Blocked(_) | ProxyError::BlockedUpstream(_) => "Blocked private or local IP.",
            ProxyError::UpstreamTimeout(_) => "Upstream request timed out.",
            ProxyError::UpstreamUnreachable(_) | ProxyError::UpstreamProtocol(_) => {
                "Error fetching target URL."
            }
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::MissingUrl
            | ProxyError::InvalidQuery(_)
            | ProxyError::InvalidUrl(_)
            | ProxyError::InvalidResponseType(_)
            | ProxyError::PayloadTooLarge { .. } => "invalid_input",
            ProxyError::Blocked(_) | ProxyError::BlockedUpstream(_) => "blocked",
            ProxyError::UpstreamTimeout(_) => "timeout",
            ProxyError::UpstreamUnreachable(_) => "unreachable",
            ProxyError::UpstreamProtocol(_) => "protocol",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            status: status.as_u16(),
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
