//! Target URL validation. Never performs I/O.

use thiserror::Error;
use url::Url;

/// Why a candidate target was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidUrl {
    #[error("unparsable URL: {0}")]
    Parse(#[from] url::ParseError),

    #[error("scheme not allowed: {0}")]
    Scheme(String),

    #[error("URL has no host")]
    MissingHost,
}

/// Parse `candidate` as an absolute http(s) URL.
pub fn validate_target(candidate: &str) -> Result<Url, InvalidUrl> {
    let url = Url::parse(candidate.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(InvalidUrl::Scheme(other.to_string())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(InvalidUrl::MissingHost),
    }
}
