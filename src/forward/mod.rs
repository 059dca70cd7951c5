//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyRequest + checked AddressSet
//!     → plan.rs (ForwardPlan: method, sanitized headers, body, limits)
//!     → client.rs (pinned reqwest client, redirect policy, timeout)
//!     → UpstreamResponse (status, headers, body stream)
//! ```
//!
//! # Design Decisions
//! - One client per call, pinned to the guard's addresses
//! - Redirect hops are re-checked by the same guard
//! - No retries; a failed call is reported once

pub mod client;
pub mod plan;

pub use client::{Forwarder, UpstreamResponse};
pub use plan::{carries_body, ForwardPlan};
