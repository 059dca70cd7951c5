//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → request.rs (query parameters, URL validation, bounded body)
//!     → [security::guard resolves and classifies the target]
//!     → [forward::client performs the upstream call]
//!     → response.rs (stream or envelope, sanitized headers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{ProxyQuery, ProxyRequest};
pub use response::{translate, Envelope};
pub use server::{AppState, HttpServer};
