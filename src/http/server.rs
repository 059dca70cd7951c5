//! HTTP server setup and the proxy handler.
//!
//! # Responsibilities
//! - Create the Axum Router with all handlers
//! - Wire up middleware (tracing, request ID)
//! - Run the validate → guard → forward → translate pipeline per request
//! - Graceful shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Query, State},
    http::{Method, Request},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{ProxyConfig, ResponseType};
use crate::error::{ProxyError, Result};
use crate::forward::{ForwardPlan, Forwarder};
use crate::http::request::{ProxyQuery, ProxyRequest};
use crate::http::response::translate;
use crate::lifecycle::shutdown::signalled;
use crate::observability::metrics;
use crate::security::headers::pick_user_agent;
use crate::security::{Resolver, SsrfGuard, SystemResolver};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub guard: SsrfGuard,
    pub forwarder: Forwarder,
}

/// HTTP server for the fetch proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a server that resolves upstream hosts through the OS.
    pub fn new(config: ProxyConfig) -> Self {
        Self::with_resolver(config, Arc::new(SystemResolver))
    }

    /// Create a server with a custom resolver.
    pub fn with_resolver(config: ProxyConfig, resolver: Arc<dyn Resolver>) -> Self {
        let guard = SsrfGuard::new(resolver, config.security.allowed_addresses.iter().copied())
            .with_lookup_timeout(Duration::from_secs(config.timeouts.request_secs));
        let state = AppState {
            config: Arc::new(config.clone()),
            forwarder: Forwarder::new(guard.clone()),
            guard,
        };

        let router = Self::build_router(state);
        Self { router, config }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/proxy", any(proxy_handler))
            .route("/health", get(health_handler))
            .route("/", get(index_handler))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for embedding or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            redirect_policy = ?self.config.forward.redirect_policy,
            default_response_type = ?self.config.forward.default_response_type,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(signalled(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

async fn index_handler() -> &'static str {
    "Fetch proxy. Use /proxy?url=<target>&responseType=<stream|auto|json|html|text>"
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn mode_label(response_type: Option<ResponseType>) -> &'static str {
    match response_type {
        Some(ResponseType::Stream) => "stream",
        Some(_) => "envelope",
        None => "none",
    }
}

/// `ANY /proxy`.
async fn proxy_handler(
    State(state): State<AppState>,
    query: std::result::Result<Query<ProxyQuery>, QueryRejection>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let method = request.method().clone();

    let mut response_type = None;
    let result = match query {
        Ok(Query(query)) => forward(&state, query, request, &mut response_type).await,
        Err(rejection) => Err(ProxyError::InvalidQuery(rejection.body_text())),
    };
    let mode = mode_label(response_type);

    match result {
        Ok(response) => {
            tracing::info!(
                request_id = %request_id,
                method = %method,
                status = response.status().as_u16(),
                mode,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Proxied request"
            );
            metrics::record_request(method.as_str(), response.status().as_u16(), mode, start);
            response
        }
        Err(err) => {
            log_failure(&request_id, &method, &err);
            if matches!(err, ProxyError::Blocked(_) | ProxyError::BlockedUpstream(_)) {
                metrics::record_blocked();
            }
            metrics::record_error(err.kind());
            metrics::record_request(method.as_str(), err.status().as_u16(), mode, start);
            err.into_response()
        }
    }
}

async fn forward(
    state: &AppState,
    query: ProxyQuery,
    request: Request<Body>,
    response_type: &mut Option<ResponseType>,
) -> Result<Response> {
    let proxy_request = ProxyRequest::extract(query, request, &state.config).await?;
    *response_type = Some(proxy_request.response_type);
    let mode = proxy_request.response_type;

    let pinned = state.guard.check(&proxy_request.target).await?;

    let user_agent = pick_user_agent(&mut rand::thread_rng());
    let plan = ForwardPlan::new(proxy_request, pinned, &state.config, user_agent);

    let upstream = state.forwarder.execute(plan).await?;
    translate(upstream, mode, state.config.forward.remap_moved_permanently).await
}

fn log_failure(request_id: &str, method: &Method, err: &ProxyError) {
    match err {
        ProxyError::UpstreamTimeout(_)
        | ProxyError::UpstreamUnreachable(_)
        | ProxyError::UpstreamProtocol(_) => {
            tracing::error!(request_id = %request_id, method = %method, error = %err, "Upstream error");
        }
        ProxyError::Blocked(_) | ProxyError::BlockedUpstream(_) => {
            tracing::warn!(request_id = %request_id, method = %method, error = %err, "Request blocked");
        }
        _ => {
            tracing::debug!(request_id = %request_id, method = %method, error = %err, "Rejected request");
        }
    }
}
