//! SSRF-guarded forward fetch proxy.
//!
//! A caller hands `/proxy` a target URL; the proxy validates it, resolves the
//! host and refuses anything that lands in private address space, then
//! forwards the call with sanitized headers and relays the upstream response
//! either as a byte stream or as a JSON envelope.

pub mod config;
pub mod error;
pub mod forward;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
