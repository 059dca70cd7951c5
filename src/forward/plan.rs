//! Forward plan construction.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method};
use url::Url;

use crate::config::{ProxyConfig, RedirectPolicy};
use crate::http::request::ProxyRequest;
use crate::security::headers::outbound_request_headers;
use crate::security::AddressSet;

/// Methods whose body is forwarded. Everything else goes out bodiless.
pub fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Everything the forwarder needs for one upstream call.
#[derive(Debug, Clone)]
pub struct ForwardPlan {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub redirect_policy: RedirectPolicy,
    pub max_redirects: usize,
    /// Decode `Content-Encoding` before the body is handed on. Set for
    /// envelopes, which re-encode the body; streams pass bytes through.
    pub decompress: bool,
    /// Addresses that passed the guard; the connection goes nowhere else.
    pub pinned: AddressSet,
}

impl ForwardPlan {
    pub fn new(
        request: ProxyRequest,
        pinned: AddressSet,
        config: &ProxyConfig,
        user_agent: &'static str,
    ) -> Self {
        let body = if carries_body(&request.method) {
            request.body
        } else {
            None
        };

        let decompress = request.response_type.is_envelope();
        let mut headers = outbound_request_headers(&request.headers, user_agent);
        if decompress {
            // The client advertises only the codings it can decode.
            headers.remove(header::ACCEPT_ENCODING);
        }

        Self {
            headers,
            method: request.method,
            url: request.target,
            body,
            timeout: Duration::from_secs(config.timeouts.request_secs),
            connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
            redirect_policy: config.forward.redirect_policy,
            max_redirects: config.forward.max_redirects,
            decompress,
            pinned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResponseType;
    use crate::security::{SsrfGuard, StaticResolver};
    use std::sync::Arc;

    async fn pinned(url: &Url) -> AddressSet {
        let resolver = StaticResolver::new().with_host("example.com", vec!["93.184.216.34".parse().unwrap()]);
        SsrfGuard::new(Arc::new(resolver), Vec::new())
            .check(url)
            .await
            .unwrap()
    }

    fn request(method: Method, body: Option<&'static [u8]>) -> ProxyRequest {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_ENCODING, "gzip, zstd".parse().unwrap());
        headers.insert(header::HOST, "proxy.local".parse().unwrap());
        headers.insert(header::USER_AGENT, "caller/1.0".parse().unwrap());
        headers.insert("x-test", "abc".parse().unwrap());
        ProxyRequest {
            method,
            target: Url::parse("https://example.com/api").unwrap(),
            headers,
            body: body.map(Bytes::from_static),
            response_type: ResponseType::Stream,
        }
    }

    #[test]
    fn test_carries_body() {
        assert!(carries_body(&Method::POST));
        assert!(carries_body(&Method::PUT));
        assert!(carries_body(&Method::PATCH));
        assert!(!carries_body(&Method::GET));
        assert!(!carries_body(&Method::HEAD));
        assert!(!carries_body(&Method::DELETE));
        assert!(!carries_body(&Method::OPTIONS));
    }

    #[tokio::test]
    async fn test_plan_drops_body_for_get() {
        let req = request(Method::GET, Some(b"ignored"));
        let pinned = pinned(&req.target).await;
        let plan = ForwardPlan::new(req, pinned, &ProxyConfig::default(), "curl/8.4.0");
        assert!(plan.body.is_none());
        assert_eq!(plan.method, Method::GET);
    }

    #[tokio::test]
    async fn test_plan_keeps_body_for_post() {
        let req = request(Method::POST, Some(b"{\"a\":1}"));
        let pinned = pinned(&req.target).await;
        let plan = ForwardPlan::new(req, pinned, &ProxyConfig::default(), "curl/8.4.0");
        assert_eq!(plan.body.as_deref(), Some(&b"{\"a\":1}"[..]));
    }

    #[tokio::test]
    async fn test_plan_headers_and_limits() {
        let mut config = ProxyConfig::default();
        config.timeouts.request_secs = 12;
        config.forward.redirect_policy = RedirectPolicy::Manual;

        let req = request(Method::GET, None);
        let pinned = pinned(&req.target).await;
        let plan = ForwardPlan::new(req, pinned, &config, "curl/8.4.0");

        assert!(!plan.headers.contains_key(header::HOST));
        assert_eq!(plan.headers.get(header::USER_AGENT).unwrap(), "curl/8.4.0");
        assert_eq!(plan.headers.get("x-test").unwrap(), "abc");
        assert_eq!(plan.timeout, Duration::from_secs(12));
        assert_eq!(plan.redirect_policy, RedirectPolicy::Manual);
        assert_eq!(plan.pinned.host(), "example.com");
        assert!(!plan.decompress);
        assert_eq!(plan.headers.get(header::ACCEPT_ENCODING).unwrap(), "gzip, zstd");
    }

    #[tokio::test]
    async fn test_envelope_plan_decodes_bodies() {
        let mut req = request(Method::GET, None);
        req.response_type = ResponseType::Auto;
        let pinned = pinned(&req.target).await;
        let plan = ForwardPlan::new(req, pinned, &ProxyConfig::default(), "curl/8.4.0");

        assert!(plan.decompress);
        assert!(!plan.headers.contains_key(header::ACCEPT_ENCODING));
    }
}
