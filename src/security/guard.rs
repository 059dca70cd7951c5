//! SSRF guard.
//!
//! Resolves a target host to every address it could route to and refuses the
//! request if resolution fails, yields nothing, or yields ANY blocked
//! address. The checked [`AddressSet`] is handed on to the forwarder so the
//! upstream connection goes to exactly the addresses that passed.
//!
//! The guard also implements [`reqwest::dns::Resolve`], which lets the
//! upstream client re-run the same check for every redirect hop.

use std::collections::{HashMap, HashSet};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use thiserror::Error;
use url::{Host, Url};

use crate::security::classifier::is_blocked;

/// Refusal raised by the guard. Always reported as 403.
#[derive(Debug, Error)]
pub enum BlockedAddress {
    #[error("resolution of {host} failed: {source}")]
    Resolution {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("{host} resolved to no addresses")]
    Empty { host: String },

    #[error("{host} resolves to blocked address {ip}")]
    Private { host: String, ip: IpAddr },
}

/// Name resolution seam. Production uses [`SystemResolver`].
pub trait Resolver: Send + Sync {
    /// Resolve `host` to all of its addresses, both families.
    fn lookup<'a>(&'a self, host: &'a str) -> BoxFuture<'a, io::Result<Vec<IpAddr>>>;
}

/// Resolver backed by the operating system (getaddrinfo via Tokio).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn lookup<'a>(&'a self, host: &'a str) -> BoxFuture<'a, io::Result<Vec<IpAddr>>> {
        Box::pin(async move {
            let addrs = tokio::net::lookup_host((host, 0)).await?;
            Ok(addrs.map(|addr| addr.ip()).collect())
        })
    }
}

/// Fixed host table. Unknown hosts fail to resolve.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: &str, addrs: Vec<IpAddr>) -> Self {
        self.hosts.insert(host.to_ascii_lowercase(), addrs);
        self
    }
}

impl Resolver for StaticResolver {
    fn lookup<'a>(&'a self, host: &'a str) -> BoxFuture<'a, io::Result<Vec<IpAddr>>> {
        let result = self
            .hosts
            .get(&host.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no such host: {}", host)));
        Box::pin(async move { result })
    }
}

/// Addresses a host resolved to, all of which passed the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSet {
    host: String,
    addrs: Vec<IpAddr>,
    literal: bool,
}

impl AddressSet {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn addrs(&self) -> &[IpAddr] {
        &self.addrs
    }

    /// True when the URL named an IP literal and no DNS was involved.
    pub fn is_literal(&self) -> bool {
        self.literal
    }

    /// Socket addresses with port 0, which the upstream client replaces
    /// with the URL's port.
    pub fn socket_addrs(&self) -> Vec<SocketAddr> {
        self.addrs.iter().map(|ip| SocketAddr::new(*ip, 0)).collect()
    }
}

/// Resolves and classifies upstream hosts.
#[derive(Clone)]
pub struct SsrfGuard {
    resolver: Arc<dyn Resolver>,
    allowed: Arc<HashSet<IpAddr>>,
    lookup_timeout: Option<Duration>,
}

impl SsrfGuard {
    /// Create a guard. `allowed` lists exact addresses exempt from the
    /// private-range block.
    pub fn new(resolver: Arc<dyn Resolver>, allowed: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            resolver,
            allowed: Arc::new(allowed.into_iter().collect()),
            lookup_timeout: None,
        }
    }

    /// Bound every resolution. A lookup that outlives `timeout` counts as a
    /// resolution failure.
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = Some(timeout);
        self
    }

    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let Some(limit) = self.lookup_timeout else {
            return self.resolver.lookup(host).await;
        };
        match tokio::time::timeout(limit, self.resolver.lookup(host)).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("lookup exceeded {:?}", limit),
            )),
        }
    }

    /// Whether a single address may be contacted.
    pub fn permits(&self, ip: &IpAddr) -> bool {
        self.allowed.contains(ip) || !is_blocked(ip)
    }

    /// Check the host of a validated URL.
    pub async fn check(&self, url: &Url) -> Result<AddressSet, BlockedAddress> {
        match url.host() {
            Some(Host::Ipv4(v4)) => self.check_literal(url_host(url), IpAddr::V4(v4)),
            Some(Host::Ipv6(v6)) => self.check_literal(url_host(url), IpAddr::V6(v6)),
            Some(Host::Domain(domain)) => self.check_host(domain).await,
            None => Err(BlockedAddress::Empty { host: String::new() }),
        }
    }

    /// Resolve a hostname and classify every answer.
    pub async fn check_host(&self, host: &str) -> Result<AddressSet, BlockedAddress> {
        if let Ok(ip) = host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
            return self.check_literal(host.to_string(), ip);
        }

        let addrs = self.lookup(host).await.map_err(|source| {
            tracing::warn!(host = %host, error = %source, "SSRF blocked: resolution failed");
            BlockedAddress::Resolution {
                host: host.to_string(),
                source,
            }
        })?;

        if addrs.is_empty() {
            tracing::warn!(host = %host, "SSRF blocked: empty resolution");
            return Err(BlockedAddress::Empty { host: host.to_string() });
        }

        if let Some(ip) = addrs.iter().find(|ip| !self.permits(ip)) {
            tracing::warn!(host = %host, ip = %ip, "SSRF blocked: resolved to private IP");
            return Err(BlockedAddress::Private {
                host: host.to_string(),
                ip: *ip,
            });
        }

        tracing::debug!(host = %host, addrs = ?addrs, "Resolved upstream host");
        Ok(AddressSet {
            host: host.to_string(),
            addrs,
            literal: false,
        })
    }

    fn check_literal(&self, host: String, ip: IpAddr) -> Result<AddressSet, BlockedAddress> {
        if !self.permits(&ip) {
            tracing::warn!(host = %host, ip = %ip, "SSRF blocked: URL targets private IP");
            return Err(BlockedAddress::Private { host, ip });
        }
        Ok(AddressSet {
            host,
            addrs: vec![ip],
            literal: true,
        })
    }
}

fn url_host(url: &Url) -> String {
    url.host_str().unwrap_or_default().to_string()
}

impl Resolve for SsrfGuard {
    fn resolve(&self, name: Name) -> Resolving {
        let guard = self.clone();
        Box::pin(async move {
            let set = guard.check_host(name.as_str()).await?;
            let addrs: Addrs = Box::new(set.socket_addrs().into_iter());
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn guard(resolver: StaticResolver) -> SsrfGuard {
        SsrfGuard::new(Arc::new(resolver), Vec::new())
    }

    #[tokio::test]
    async fn test_public_host_passes() {
        let g = guard(StaticResolver::new().with_host("example.com", vec![ip("93.184.216.34")]));
        let set = g.check(&Url::parse("https://example.com/x").unwrap()).await.unwrap();
        assert_eq!(set.host(), "example.com");
        assert_eq!(set.addrs(), &[ip("93.184.216.34")]);
        assert!(!set.is_literal());
        assert_eq!(set.socket_addrs(), vec!["93.184.216.34:0".parse::<SocketAddr>().unwrap()]);
    }

    #[tokio::test]
    async fn test_any_private_answer_blocks() {
        let g = guard(
            StaticResolver::new()
                .with_host("mixed.test", vec![ip("93.184.216.34"), ip("10.0.0.5")]),
        );
        let err = g.check(&Url::parse("http://mixed.test/").unwrap()).await.unwrap_err();
        assert!(matches!(err, BlockedAddress::Private { ip: blocked, .. } if blocked == ip("10.0.0.5")));
    }

    #[tokio::test]
    async fn test_resolution_failure_blocks() {
        let g = guard(StaticResolver::new());
        let err = g.check(&Url::parse("http://nowhere.invalid/").unwrap()).await.unwrap_err();
        assert!(matches!(err, BlockedAddress::Resolution { .. }));
    }

    #[tokio::test]
    async fn test_empty_resolution_blocks() {
        let g = guard(StaticResolver::new().with_host("empty.test", Vec::new()));
        let err = g.check(&Url::parse("http://empty.test/").unwrap()).await.unwrap_err();
        assert!(matches!(err, BlockedAddress::Empty { .. }));
    }

    #[tokio::test]
    async fn test_literals_skip_dns() {
        let g = guard(StaticResolver::new());

        for target in [
            "http://127.0.0.1/",
            "http://10.1.2.3/",
            "http://[::1]/",
            "http://169.254.169.254/latest/meta-data/",
            "http://[::ffff:192.168.0.1]/",
            "http://2130706433/",
        ] {
            let url = Url::parse(target).unwrap();
            assert!(g.check(&url).await.is_err(), "{} should be blocked", target);
        }

        let set = g.check(&Url::parse("http://8.8.8.8/").unwrap()).await.unwrap();
        assert!(set.is_literal());
    }

    #[tokio::test]
    async fn test_allowlist_is_exact() {
        let g = SsrfGuard::new(Arc::new(StaticResolver::new()), vec![ip("127.0.0.1")]);
        assert!(g.check(&Url::parse("http://127.0.0.1:8080/").unwrap()).await.is_ok());
        assert!(g.check(&Url::parse("http://127.0.0.2/").unwrap()).await.is_err());
    }

    struct StallingResolver;

    impl Resolver for StallingResolver {
        fn lookup<'a>(&'a self, _host: &'a str) -> BoxFuture<'a, io::Result<Vec<IpAddr>>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(vec![ip("93.184.216.34")])
            })
        }
    }

    #[tokio::test]
    async fn test_stalled_lookup_times_out_and_blocks() {
        let g = SsrfGuard::new(Arc::new(StallingResolver), Vec::new())
            .with_lookup_timeout(Duration::from_millis(100));
        let started = std::time::Instant::now();
        let err = g.check(&Url::parse("http://slow.test/").unwrap()).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        match err {
            BlockedAddress::Resolution { source, .. } => assert_eq!(source.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected resolution failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_impl_blocks_private() {
        let g = guard(StaticResolver::new().with_host("internal.test", vec![ip("192.168.1.10")]));
        let name: Name = "internal.test".parse().unwrap();
        let result = Resolve::resolve(&g, name).await;
        assert!(result.is_err());
    }
}
