//! Connect-time address check for outbound webhook deliveries.
//!
//! [`super::url_policy`] screens the hostname text when a webhook is saved.
//! A hostname that passed then can still resolve to an internal address
//! later (DNS rebinding). Delivery code calls [`resolve_public_addrs`] right
//! before connecting and connects only to the addresses it returns.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tracing::{debug, warn};
use url::Url;

use crate::{Error, Result};

/// Whether an address is private, loopback, link-local, multicast or
/// otherwise reserved, including IPv4 addresses tunnelled inside IPv6
/// (mapped, compatible, 6to4 and NAT64).
#[must_use]
pub fn is_private_or_reserved(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => is_private_v6(v6),
    }
}

fn is_private_v4(addr: Ipv4Addr) -> bool {
    let [a, b, c, _] = addr.octets();
    addr.is_loopback()          // 127.0.0.0/8
    || addr.is_private()        // 10/8, 172.16/12, 192.168/16
    || addr.is_link_local()     // 169.254/16, includes cloud metadata
    || addr.is_multicast()      // 224.0.0.0/4
    || a >= 240                 // 240.0.0.0/4 reserved, includes broadcast
    || addr.is_unspecified()
    || a == 0                   // 0.0.0.0/8 "this network"
    || (a == 198 && (b & 0xFE) == 18) // 198.18/15 benchmarking
    || (a == 100 && (b & 0xC0) == 64) // 100.64/10 CGN, includes Alibaba metadata
    || (a == 192 && b == 0 && c == 2)
    || (a == 198 && b == 51 && c == 100)
    || (a == 203 && b == 0 && c == 113)
}

/// Embedded IPv4 from a 6to4, NAT64, IPv4-mapped or IPv4-compatible address.
#[allow(clippy::cast_possible_truncation)] // splitting u16 segments into octets
fn embedded_v4(addr: Ipv6Addr) -> Option<Ipv4Addr> {
    let s = addr.segments();
    let from = |hi: u16, lo: u16| Ipv4Addr::new((hi >> 8) as u8, hi as u8, (lo >> 8) as u8, lo as u8);

    if let Some(v4) = addr.to_ipv4_mapped() {
        return Some(v4);
    }
    // ::a.b.c.d, excluding :: and ::1
    if s[..6].iter().all(|&x| x == 0) && (s[6] != 0 || s[7] > 1) {
        return Some(from(s[6], s[7]));
    }
    // 2002:AABB:CCDD::/48
    if s[0] == 0x2002 {
        return Some(from(s[1], s[2]));
    }
    // 64:ff9b::a.b.c.d
    if s[0] == 0x0064 && s[1] == 0xff9b && s[2..6].iter().all(|&x| x == 0) {
        return Some(from(s[6], s[7]));
    }
    None
}

fn is_private_v6(addr: Ipv6Addr) -> bool {
    let first = addr.segments()[0];
    if addr.is_loopback() || addr.is_unspecified() {
        return true;
    }
    if first & 0xFFC0 == 0xFE80 || first & 0xFE00 == 0xFC00 || addr.is_multicast() {
        return true;
    }
    embedded_v4(addr).is_some_and(is_private_v4)
}

/// Reject a single address if it is private or reserved.
pub fn ensure_public_ip(addr: IpAddr) -> Result<()> {
    if is_private_or_reserved(addr) {
        return Err(Error::Blocked(format!(
            "address {addr} is private or reserved"
        )));
    }
    Ok(())
}

/// Resolve the host of `url` and return its socket addresses, failing if any
/// of them is private or reserved.
///
/// All addresses must be public: a mixed answer is treated as an attempt to
/// slip an internal target past the check.
pub async fn resolve_public_addrs(url: &str) -> Result<Vec<SocketAddr>> {
    let parsed = Url::parse(url).map_err(|e| Error::Resolve(format!("invalid URL: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::Resolve("URL has no host".to_string()))?;
    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| Error::Resolve(format!("no port known for scheme '{}'", parsed.scheme())))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');

    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| Error::Resolve(format!("{host}: {e}")))?
        .collect();

    if addrs.is_empty() {
        return Err(Error::Resolve(format!("{host}: no addresses")));
    }

    for addr in &addrs {
        if let Err(e) = ensure_public_ip(addr.ip()) {
            warn!(host, addr = %addr.ip(), "Outbound target resolved to a private address");
            return Err(e);
        }
    }

    debug!(host, count = addrs.len(), "Resolved outbound target");
    Ok(addrs)
}
