//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Root configuration for the fetch proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Upstream forwarding behaviour.
    pub forward: ForwardConfig,

    /// SSRF and request limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Total time for one upstream call, body included, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            request_secs: 30,
        }
    }
}

/// What to do when the upstream answers with a 3xx.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectPolicy {
    /// Relay the 3xx and its Location header untouched.
    Manual,
    /// Follow up to `max_redirects` hops and return the final response.
    Follow,
}

/// How the upstream body is handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Byte-for-byte passthrough.
    Stream,
    /// Envelope, encoding chosen from content-type and body sniffing.
    Auto,
    /// Envelope, body treated as (possibly gzipped) JSON.
    Json,
    /// Envelope, body forced to HTML text.
    Html,
    /// Envelope, body forced to plain text.
    Text,
}

impl ResponseType {
    /// Parse the `responseType` query value. Case-insensitive.
    pub fn from_query(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "stream" => Some(Self::Stream),
            "auto" => Some(Self::Auto),
            "json" => Some(Self::Json),
            "html" => Some(Self::Html),
            "text" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn is_envelope(self) -> bool {
        self != Self::Stream
    }
}

/// Upstream forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardConfig {
    /// Redirect handling.
    pub redirect_policy: RedirectPolicy,

    /// Hop limit when `redirect_policy` is `follow`.
    pub max_redirects: usize,

    /// Report upstream 301 as 200 to callers that cannot see redirects.
    pub remap_moved_permanently: bool,

    /// Response mode used when the caller omits `responseType`.
    pub default_response_type: ResponseType,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            redirect_policy: RedirectPolicy::Follow,
            max_redirects: 10,
            remap_moved_permanently: false,
            default_response_type: ResponseType::Stream,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,

    /// Exact addresses exempt from the private-range block.
    pub allowed_addresses: Vec<IpAddr>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024, // 10MB
            allowed_addresses: Vec::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
