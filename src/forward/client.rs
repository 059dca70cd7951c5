//! Upstream HTTP client.
//!
//! # Responsibilities
//! - Build a client pinned to the addresses the guard approved
//! - Apply the configured redirect policy, re-checking every hop
//! - Bound the whole call (body included) with the request timeout
//! - Translate transport failures into timeout / unreachable / protocol

use std::error::Error as StdError;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use futures_util::{Stream, TryStreamExt};
use reqwest::redirect::Policy;
use thiserror::Error;
use url::Host;

use crate::config::RedirectPolicy;
use crate::error::ProxyError;
use crate::forward::plan::{carries_body, ForwardPlan};
use crate::security::{BlockedAddress, SsrfGuard};

#[derive(Debug, Error)]
#[error("too many redirects (limit {0})")]
struct TooManyRedirects(usize);

#[derive(Debug, Error)]
#[error("redirect to blocked address {0}")]
struct BlockedRedirect(IpAddr);

/// Response head plus the still-unread body.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    timeout: Duration,
    inner: reqwest::Response,
}

impl UpstreamResponse {
    /// Body as a stream of chunks. Errors after the head has been relayed
    /// abort the downstream connection.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static {
        self.inner.bytes_stream().inspect_err(|e| {
            tracing::warn!(error = %e, timeout = e.is_timeout(), "Upstream body stream aborted");
        })
    }

    /// Buffer the entire body.
    pub async fn bytes(self) -> Result<Bytes, ProxyError> {
        let timeout = self.timeout;
        self.inner.bytes().await.map_err(|e| classify(e, timeout))
    }
}

/// Executes forward plans against the network.
#[derive(Clone)]
pub struct Forwarder {
    guard: SsrfGuard,
}

impl Forwarder {
    pub fn new(guard: SsrfGuard) -> Self {
        Self { guard }
    }

    fn redirect_policy(&self, plan: &ForwardPlan) -> Policy {
        match plan.redirect_policy {
            RedirectPolicy::Manual => Policy::none(),
            RedirectPolicy::Follow => {
                let guard = self.guard.clone();
                let max = plan.max_redirects;
                Policy::custom(move |attempt| {
                    if attempt.previous().len() > max {
                        return attempt.error(TooManyRedirects(max));
                    }
                    // Hostnames are checked by the guard's resolver; literals never reach it.
                    let literal = match attempt.url().host() {
                        Some(Host::Ipv4(v4)) => Some(IpAddr::V4(v4)),
                        Some(Host::Ipv6(v6)) => Some(IpAddr::V6(v6)),
                        _ => None,
                    };
                    match literal {
                        Some(ip) if !guard.permits(&ip) => {
                            tracing::warn!(ip = %ip, "SSRF blocked: redirect to private IP");
                            attempt.error(BlockedRedirect(ip))
                        }
                        _ => attempt.follow(),
                    }
                })
            }
        }
    }

    fn client_for(&self, plan: &ForwardPlan) -> Result<reqwest::Client, ProxyError> {
        let mut builder = reqwest::Client::builder()
            .no_proxy()
            .timeout(plan.timeout)
            .connect_timeout(plan.connect_timeout)
            .redirect(self.redirect_policy(plan))
            .dns_resolver(Arc::new(self.guard.clone()))
            .gzip(plan.decompress)
            .brotli(plan.decompress)
            .deflate(plan.decompress)
            .pool_max_idle_per_host(0);

        if !plan.pinned.is_literal() {
            builder = builder.resolve_to_addrs(plan.pinned.host(), &plan.pinned.socket_addrs());
        }

        builder
            .build()
            .map_err(|e| ProxyError::UpstreamUnreachable(format!("client setup failed: {}", e)))
    }

    /// Perform the upstream call described by `plan`.
    pub async fn execute(&self, plan: ForwardPlan) -> Result<UpstreamResponse, ProxyError> {
        let client = self.client_for(&plan)?;
        let ForwardPlan {
            method,
            url,
            headers,
            body,
            timeout,
            ..
        } = plan;

        tracing::debug!(method = %method, url = %url, "Forwarding upstream");

        let mut request = client.request(method.clone(), url).headers(headers);
        if carries_body(&method) {
            if let Some(body) = body {
                request = request.body(body);
            }
        }

        let response = request.send().await.map_err(|e| classify(e, timeout))?;

        Ok(UpstreamResponse {
            status: response.status(),
            headers: response.headers().clone(),
            timeout,
            inner: response,
        })
    }
}

/// Find a guard refusal anywhere in an error's source chain.
fn blocked_cause(err: &(dyn StdError + 'static)) -> Option<String> {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(blocked) = e.downcast_ref::<BlockedAddress>() {
            return Some(blocked.to_string());
        }
        if let Some(blocked) = e.downcast_ref::<BlockedRedirect>() {
            return Some(blocked.to_string());
        }
        current = e.source();
    }
    None
}

fn has_io_cause(err: &(dyn StdError + 'static)) -> bool {
    let mut current = err.source();
    while let Some(e) = current {
        if e.is::<std::io::Error>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Map a transport error onto the proxy taxonomy.
fn classify(err: reqwest::Error, timeout: Duration) -> ProxyError {
    if let Some(reason) = blocked_cause(&err) {
        return ProxyError::BlockedUpstream(reason);
    }
    if err.is_timeout() {
        return ProxyError::UpstreamTimeout(timeout.as_secs());
    }
    if err.is_redirect() || err.is_decode() || err.is_body() {
        return ProxyError::UpstreamProtocol(err.to_string());
    }
    if err.is_connect() || has_io_cause(&err) {
        return ProxyError::UpstreamUnreachable(err.to_string());
    }
    ProxyError::UpstreamProtocol(err.to_string())
}
