//! Private/internal address classification.
//!
//! Pure functions over `IpAddr`; no I/O.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Returns true if the address points into private, loopback or link-local
/// space and must never be fetched.
pub fn is_blocked(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_v4(v4),
        IpAddr::V6(v6) => is_blocked_v6(v6),
    }
}

/// IPv4: 10/8, 172.16/12, 192.168/16, 127/8, 169.254/16 and 0/8.
pub fn is_blocked_v4(ip: &Ipv4Addr) -> bool {
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        // 0.0.0.0/8 routes to the local host on most stacks
        || ip.octets()[0] == 0
}

/// IPv6: ::1, fe80::/10, fc00::/7, :: and IPv4-mapped addresses whose
/// embedded IPv4 address is blocked.
pub fn is_blocked_v6(ip: &Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_blocked_v4(&v4);
    }

    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xffc0) == 0xfe80 // link-local
        || (first & 0xfe00) == 0xfc00 // unique local
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocked(s: &str) -> bool {
        is_blocked(&s.parse::<IpAddr>().unwrap())
    }

    #[test]
    fn test_ipv4_private_ranges() {
        assert!(blocked("10.0.0.1"));
        assert!(blocked("10.255.255.255"));
        assert!(blocked("172.16.0.1"));
        assert!(blocked("172.31.255.255"));
        assert!(blocked("192.168.1.1"));
        assert!(blocked("127.0.0.1"));
        assert!(blocked("127.10.20.30"));
        assert!(blocked("169.254.169.254")); // cloud metadata
        assert!(blocked("0.0.0.0"));
    }

    #[test]
    fn test_ipv4_range_edges() {
        assert!(!blocked("172.15.255.255"));
        assert!(!blocked("172.32.0.0"));
        assert!(!blocked("192.167.255.255"));
        assert!(!blocked("169.253.0.1"));
        assert!(!blocked("11.0.0.1"));
    }

    #[test]
    fn test_ipv4_public() {
        assert!(!blocked("8.8.8.8"));
        assert!(!blocked("93.184.216.34"));
        assert!(!blocked("1.1.1.1"));
    }

    #[test]
    fn test_ipv6_ranges() {
        assert!(blocked("::1"));
        assert!(blocked("::"));
        assert!(blocked("fe80::1"));
        assert!(blocked("febf::1"));
        assert!(blocked("fc00::1"));
        assert!(blocked("fd12:3456:789a::1"));
        assert!(!blocked("fec0::1"));
        assert!(!blocked("2001:4860:4860::8888"));
        assert!(!blocked("2606:4700::1111"));
    }

    #[test]
    fn test_ipv4_mapped() {
        assert!(blocked("::ffff:127.0.0.1"));
        assert!(blocked("::ffff:10.1.2.3"));
        assert!(blocked("::ffff:169.254.169.254"));
        assert!(!blocked("::ffff:8.8.8.8"));
    }
}
