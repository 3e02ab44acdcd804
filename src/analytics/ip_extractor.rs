//! Client IP extraction from HTTP headers with trust validation
//!
//! This module implements secure client IP extraction that:
//! - Uses the immediate peer address unless proxy headers are trusted
//! - Walks X-Forwarded-For and Forwarded chains right-to-left
//! - Supports vendor-specific headers (e.g., CF-Connecting-IP)
//! - Handles both IPv4 and IPv6

use axum::http::HeaderMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::warn;

use crate::config::{ClientIpConfig, TrustedProxyMode};

/// Parse a textual address, returning `None` when it is not a valid IP
pub fn validate_ip(raw: &str) -> Option<IpAddr> {
    raw.trim().parse::<IpAddr>().ok()
}

/// Extract the client IP address for a request
///
/// # Arguments
/// * `headers` - HTTP request headers
/// * `peer` - The socket remote address, if the transport provided one
/// * `config` - Trust settings
///
/// # Returns
/// The client address, anonymized if configured, or `None` when no valid
/// address can be determined.
pub fn extract_client_ip(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    config: &ClientIpConfig,
) -> Option<IpAddr> {
    let ip = match config.trusted_proxy_mode {
        TrustedProxyMode::None => peer,
        TrustedProxyMode::Cloudflare => extract_cloudflare_ip(headers).or_else(|| {
            warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
            peer
        }),
        TrustedProxyMode::Standard => {
            if peer.is_some_and(|p| !is_trusted_peer(p, config)) {
                peer
            } else {
                extract_standard_ip(headers, config).or(peer)
            }
        }
    }?;

    Some(if config.ip_anonymization {
        anonymize_ip(ip)
    } else {
        ip
    })
}

/// Headers are only honoured from peers inside the trusted ranges, when
/// ranges are configured
fn is_trusted_peer(peer: IpAddr, config: &ClientIpConfig) -> bool {
    config.trusted_proxies.is_empty() || is_trusted_proxy(peer, config)
}

fn is_trusted_proxy(ip: IpAddr, config: &ClientIpConfig) -> bool {
    config.trusted_proxies.iter().any(|net| net.contains(&ip))
}

/// Extract IP from Cloudflare-specific header
fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(validate_ip)
}

/// Extract IP from standard headers (Forwarded, X-Forwarded-For)
fn extract_standard_ip(headers: &HeaderMap, config: &ClientIpConfig) -> Option<IpAddr> {
    // Prefer RFC 7239 Forwarded header
    let mut chain = forwarded_chain(headers);
    if chain.is_empty() {
        chain = x_forwarded_for_chain(headers);
    }

    select_from_chain(&chain, config)
}

/// Addresses from the `for=` parameters of a Forwarded header, left to right
///
/// Forwarded: for=192.0.2.60;proto=http;by=203.0.113.43, for="[2001:db8::1]:4711"
fn forwarded_chain(headers: &HeaderMap) -> Vec<IpAddr> {
    let Some(forwarded) = headers.get("forwarded").and_then(|h| h.to_str().ok()) else {
        return Vec::new();
    };

    forwarded
        .split(',')
        .filter_map(|element| {
            element.split(';').find_map(|param| {
                let param = param.trim();
                let value = param
                    .strip_prefix("for=")
                    .or_else(|| param.strip_prefix("For="))?;
                parse_forwarded_node(value.trim_matches('"'))
            })
        })
        .collect()
}

/// Parse a Forwarded node: `1.2.3.4`, `1.2.3.4:80`, `[2001:db8::1]` or
/// `[2001:db8::1]:443`
fn parse_forwarded_node(node: &str) -> Option<IpAddr> {
    if let Some(rest) = node.strip_prefix('[') {
        let (addr, _) = rest.split_once(']')?;
        return addr.parse::<Ipv6Addr>().ok().map(IpAddr::V6);
    }

    if let Ok(ip) = node.parse::<IpAddr>() {
        return Some(ip);
    }

    let (addr, _port) = node.rsplit_once(':')?;
    addr.parse::<Ipv4Addr>().ok().map(IpAddr::V4)
}

/// Addresses from X-Forwarded-For, left to right, invalid entries dropped
fn x_forwarded_for_chain(headers: &HeaderMap) -> Vec<IpAddr> {
    headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(validate_ip)
        .collect()
}

/// Pick the client from a proxy chain, walking right to left
fn select_from_chain(chain: &[IpAddr], config: &ClientIpConfig) -> Option<IpAddr> {
    if chain.is_empty() {
        return None;
    }

    // If num_trusted_proxies is specified, skip that many from the right
    if let Some(num_trusted) = config.num_trusted_proxies {
        return if chain.len() > num_trusted {
            Some(chain[chain.len() - num_trusted - 1])
        } else {
            // Not enough hops in chain, return the leftmost (least trusted)
            chain.first().copied()
        };
    }

    // Otherwise the first address from the right outside the trusted ranges
    if !config.trusted_proxies.is_empty() {
        return chain
            .iter()
            .rev()
            .find(|ip| !is_trusted_proxy(**ip, config))
            .or_else(|| chain.first())
            .copied();
    }

    // No trust configuration, return the rightmost IP
    chain.last().copied()
}

/// Anonymize an IP address by truncating to network prefix
///
/// - IPv4: Truncate to /24 (zero last octet)
/// - IPv6: Truncate to /48 (zero last 80 bits)
pub fn anonymize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(addr) => {
            let octets = addr.octets();
            IpAddr::V4(Ipv4Addr::new(octets[0], octets[1], octets[2], 0))
        }
        IpAddr::V6(addr) => {
            let segments = addr.segments();
            IpAddr::V6(Ipv6Addr::new(
                segments[0],
                segments[1],
                segments[2],
                0,
                0,
                0,
                0,
                0,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn create_config(mode: TrustedProxyMode) -> ClientIpConfig {
        ClientIpConfig {
            trusted_proxy_mode: mode,
            trusted_proxies: vec![],
            num_trusted_proxies: None,
            ip_anonymization: false,
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_validate_ip() {
        assert_eq!(validate_ip("127.0.0.1"), Some(ip("127.0.0.1")));
        assert_eq!(validate_ip(" ::1 "), Some(ip("::1")));
        assert_eq!(validate_ip("999.1.1.1"), None);
        assert_eq!(validate_ip("unknown"), None);
        assert_eq!(validate_ip(""), None);
    }

    #[test]
    fn test_extract_client_ip_none_mode_ignores_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.1"));
        let config = create_config(TrustedProxyMode::None);

        let result = extract_client_ip(&headers, Some(ip("192.168.1.1")), &config);
        assert_eq!(result, Some(ip("192.168.1.1")));
    }

    #[test]
    fn test_missing_peer_without_headers_is_none() {
        let headers = HeaderMap::new();
        for mode in [
            TrustedProxyMode::None,
            TrustedProxyMode::Standard,
            TrustedProxyMode::Cloudflare,
        ] {
            assert_eq!(extract_client_ip(&headers, None, &create_config(mode)), None);
        }
    }

    #[test]
    fn test_extract_cloudflare_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.1"));
        let config = create_config(TrustedProxyMode::Cloudflare);

        let result = extract_client_ip(&headers, Some(ip("192.168.1.1")), &config);
        assert_eq!(result, Some(ip("203.0.113.1")));
    }

    #[test]
    fn test_extract_x_forwarded_for_basic() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1"),
        );
        let config = create_config(TrustedProxyMode::Standard);

        let result = extract_client_ip(&headers, Some(ip("192.168.1.1")), &config);
        // Should return rightmost IP in the absence of trust configuration
        assert_eq!(result, Some(ip("198.51.100.1")));
    }

    #[test]
    fn test_x_forwarded_for_skips_trusted_hops() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1, 10.0.0.2"),
        );
        let mut config = create_config(TrustedProxyMode::Standard);
        config.num_trusted_proxies = Some(1);

        let result = extract_client_ip(&headers, Some(ip("10.0.0.1")), &config);
        assert_eq!(result, Some(ip("198.51.100.1")));
    }

    #[test]
    fn test_x_forwarded_for_with_trusted_cidrs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.1.2.3, 10.0.0.2"),
        );
        let mut config = create_config(TrustedProxyMode::Standard);
        config.trusted_proxies = vec!["10.0.0.0/8".parse().unwrap()];

        let result = extract_client_ip(&headers, Some(ip("10.0.0.1")), &config);
        assert_eq!(result, Some(ip("203.0.113.7")));
    }

    #[test]
    fn test_untrusted_peer_cannot_spoof_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4"));
        let mut config = create_config(TrustedProxyMode::Standard);
        config.trusted_proxies = vec!["10.0.0.0/8".parse().unwrap()];

        let result = extract_client_ip(&headers, Some(ip("198.51.100.9")), &config);
        assert_eq!(result, Some(ip("198.51.100.9")));
    }

    #[test]
    fn test_forwarded_header_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "forwarded",
            HeaderValue::from_static("for=\"[2001:db8::1]:4711\";proto=https, for=192.0.2.60:8080"),
        );
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.1"));
        let mut config = create_config(TrustedProxyMode::Standard);
        config.num_trusted_proxies = Some(1);

        let result = extract_client_ip(&headers, Some(ip("10.0.0.1")), &config);
        assert_eq!(result, Some(ip("2001:db8::1")));
    }

    #[test]
    fn test_garbage_forwarded_falls_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip, also bad"));
        let config = create_config(TrustedProxyMode::Standard);

        let result = extract_client_ip(&headers, Some(ip("192.168.1.1")), &config);
        assert_eq!(result, Some(ip("192.168.1.1")));
    }

    #[test]
    fn test_anonymization_applied() {
        let mut config = create_config(TrustedProxyMode::None);
        config.ip_anonymization = true;

        let result = extract_client_ip(&HeaderMap::new(), Some(ip("192.168.1.100")), &config);
        assert_eq!(result, Some(ip("192.168.1.0")));
    }

    #[test]
    fn test_anonymize_ipv4() {
        let anonymized = anonymize_ip(ip("192.168.1.100"));
        assert_eq!(anonymized, ip("192.168.1.0"));
    }

    #[test]
    fn test_anonymize_ipv6() {
        let anonymized = anonymize_ip(ip("2001:db8::1234:5678"));
        // Should zero out everything after first 48 bits (3 segments)
        assert_eq!(anonymized, ip("2001:db8::"));
    }
}
