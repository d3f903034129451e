//! Client IP resolution for tracked events
//!
//! Forwarding headers are only honoured according to the configured trust
//! mode. Without trust configuration the socket address is used.

use axum::http::HeaderMap;
use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::warn;

use crate::config::{AnalyticsConfig, TrustedProxyMode};

/// Extract the client IP address from HTTP headers, falling back to
/// the socket address
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: IpAddr,
    config: &AnalyticsConfig,
) -> IpAddr {
    match config.trusted_proxy_mode {
        TrustedProxyMode::Cloudflare => extract_cloudflare_ip(headers).unwrap_or_else(|| {
            warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
            socket_addr
        }),
        TrustedProxyMode::Standard => {
            let trusted = parse_trusted_proxies(&config.trusted_proxies);
            if !peer_is_trusted(socket_addr, config, &trusted) {
                return socket_addr;
            }
            extract_from_forwarded(headers, config, &trusted)
                .or_else(|| extract_from_x_forwarded_for(headers, config, &trusted))
                .unwrap_or(socket_addr)
        }
        TrustedProxyMode::None => socket_addr,
    }
}

/// Resolve the address recorded with a tracked event, applying
/// anonymization when enabled
pub fn resolve_event_ip(
    headers: &HeaderMap,
    socket_addr: IpAddr,
    config: &AnalyticsConfig,
) -> String {
    let ip = extract_client_ip(headers, socket_addr, config);
    if config.ip_anonymization {
        anonymize_ip(ip).to_string()
    } else {
        ip.to_string()
    }
}

fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

fn parse_trusted_proxies(entries: &[String]) -> Vec<IpNet> {
    entries
        .iter()
        .filter_map(|entry| {
            let entry = entry.trim();
            entry
                .parse::<IpNet>()
                .or_else(|_| entry.parse::<IpAddr>().map(IpNet::from))
                .map_err(|_| warn!("Ignoring invalid trusted proxy entry: {}", entry))
                .ok()
        })
        .collect()
}

/// Forwarding headers are read only from peers inside `trusted_proxies`.
/// When no networks are listed (proxy count or rightmost hop only) the peer
/// is not checked, so the service must not be reachable except through
/// its proxies.
fn peer_is_trusted(socket_addr: IpAddr, config: &AnalyticsConfig, trusted: &[IpNet]) -> bool {
    if trusted.is_empty() {
        if config.trusted_proxies.iter().any(|e| !e.trim().is_empty()) {
            // Every configured entry was invalid
            return false;
        }
        return true;
    }
    trusted.iter().any(|net| net.contains(&socket_addr))
}

/// Pick the client out of a proxy chain ordered left (client) to right
/// (nearest proxy)
fn select_from_chain(
    chain: &[IpAddr],
    config: &AnalyticsConfig,
    trusted: &[IpNet],
) -> Option<IpAddr> {
    if chain.is_empty() {
        return None;
    }

    if let Some(num_trusted) = config.num_trusted_proxies {
        return if chain.len() > num_trusted {
            Some(chain[chain.len() - num_trusted - 1])
        } else {
            chain.first().copied()
        };
    }

    if !trusted.is_empty() {
        // Walk right to left, skipping hops inside trusted networks
        return chain
            .iter()
            .rev()
            .find(|ip| !trusted.iter().any(|net| net.contains(*ip)))
            .or_else(|| chain.first())
            .copied();
    }

    chain.last().copied()
}

/// Strip quotes, brackets and port from a `for=` value
fn parse_forwarded_node(value: &str) -> Option<IpAddr> {
    let value = value.trim().trim_matches('"');
    if let Some(rest) = value.strip_prefix('[') {
        return rest.split(']').next()?.parse().ok();
    }
    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip);
    }
    value.split(':').next()?.parse().ok()
}

/// RFC 7239 `Forwarded` header
fn extract_from_forwarded(
    headers: &HeaderMap,
    config: &AnalyticsConfig,
    trusted: &[IpNet],
) -> Option<IpAddr> {
    let forwarded = headers.get("forwarded")?.to_str().ok()?;

    let chain: Vec<IpAddr> = forwarded
        .split(',')
        .filter_map(|element| {
            element.split(';').find_map(|param| {
                let param = param.trim();
                let (key, value) = param.split_once('=')?;
                if key.eq_ignore_ascii_case("for") {
                    parse_forwarded_node(value)
                } else {
                    None
                }
            })
        })
        .collect();

    select_from_chain(&chain, config, trusted)
}

fn extract_from_x_forwarded_for(
    headers: &HeaderMap,
    config: &AnalyticsConfig,
    trusted: &[IpNet],
) -> Option<IpAddr> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;

    let chain: Vec<IpAddr> = xff
        .split(',')
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .collect();

    select_from_chain(&chain, config, trusted)
}

/// Truncate an address to its network prefix (/24 for IPv4, /48 for IPv6)
pub fn anonymize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(addr) => {
            let [a, b, c, _] = addr.octets();
            IpAddr::V4(Ipv4Addr::new(a, b, c, 0))
        }
        IpAddr::V6(addr) => {
            let s = addr.segments();
            IpAddr::V6(Ipv6Addr::new(s[0], s[1], s[2], 0, 0, 0, 0, 0))
        }
    }
}
