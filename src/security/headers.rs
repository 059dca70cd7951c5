//! Header sanitization.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Strip headers named by the `Connection` header
//! - Drop framing headers when the body is re-encoded
//! - Replace the caller's User-Agent with one from a fixed pool
//!
//! # Design Decisions
//! - Multi-valued headers keep every value, in order
//! - Comparison is case-insensitive (`HeaderName` is always lowercase)

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use rand::Rng;

/// Headers that describe a single transport hop and are never relayed.
pub const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// Browser, crawler and API-client identifiers presented upstream.
pub const USER_AGENTS: &[&str] = &[
    // Desktop browsers
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:129.0) Gecko/20100101 Firefox/129.0",
    // Mobile
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
    // Crawlers
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
    "Mozilla/5.0 (compatible; Bingbot/2.0; +http://www.bing.com/bingbot.htm)",
    "DuckDuckBot/1.1 (+http://duckduckgo.com/duckduckbot.html)",
    "Applebot/0.1 (+http://www.apple.com/go/applebot)",
    "Discordbot/2.0 (+https://discordapp.com)",
    "Slack-ImgProxy/1.0 (+https://slack.com/)",
    // API clients and tools
    "OpenAI-Python/1.0 (github.com/openai/openai-python)",
    "OpenAI-Node/3.2.1 (https://github.com/openai/openai-node)",
    "curl/8.4.0",
    "Wget/1.21.3 (linux-gnu)",
    "python-requests/2.31.0",
    "Go-http-client/1.1",
];

/// Draw one User-Agent uniformly from [`USER_AGENTS`].
pub fn pick_user_agent<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
}

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Lowercased header names listed in `Connection` values.
fn connection_tokens(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn strip(headers: &HeaderMap, extra: &[HeaderName]) -> HeaderMap {
    let listed = connection_tokens(headers);
    let mut out = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers.iter() {
        if is_hop_by_hop(name.as_str())
            || listed.iter().any(|t| t == name.as_str())
            || extra.contains(name)
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }

    out
}

/// Headers sent upstream: hop-by-hop and `content-length` removed (the
/// client re-frames the body), User-Agent replaced.
pub fn outbound_request_headers(inbound: &HeaderMap, user_agent: &'static str) -> HeaderMap {
    let mut out = strip(inbound, &[header::CONTENT_LENGTH, header::USER_AGENT]);
    out.insert(header::USER_AGENT, HeaderValue::from_static(user_agent));
    out
}

/// Headers relayed to the caller. When `reframed` the body is replaced by an
/// envelope, so its length, encoding and type no longer apply.
pub fn outbound_response_headers(upstream: &HeaderMap, reframed: bool) -> HeaderMap {
    if reframed {
        strip(
            upstream,
            &[header::CONTENT_LENGTH, header::CONTENT_ENCODING, header::CONTENT_TYPE],
        )
    } else {
        strip(upstream, &[])
    }
}
