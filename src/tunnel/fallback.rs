//! NAT64 resolution fallback.
//!
//! When the direct destination cannot be reached, the destination name is
//! resolved to IPv4 over DoH and reached again through the NAT64 prefix.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::doh::DohClient;
use crate::protocol::Address;
use crate::tunnel::error::TunnelError;

/// Embed `ipv4` in the low 32 bits of the /96 `prefix`.
///
/// `93.184.216.34` under `2001:67c:2960:6464::` becomes
/// `2001:67c:2960:6464::5db8:d822`.
pub fn synthesize_nat64(prefix: Ipv6Addr, ipv4: Ipv4Addr) -> Ipv6Addr {
    let [a, b, c, d] = ipv4.octets();
    let mut segments = prefix.segments();
    segments[6] = u16::from_be_bytes([a, b]);
    segments[7] = u16::from_be_bytes([c, d]);
    Ipv6Addr::from(segments)
}

/// Resolve the fallback address for `address`.
///
/// Literal destinations have nothing to resolve and yield `None`.
pub async fn resolve_fallback(
    doh: &DohClient,
    prefix: Ipv6Addr,
    address: &Address,
) -> Option<Result<Ipv6Addr, TunnelError>> {
    let domain = address.domain()?;
    let result = doh
        .lookup_ipv4(domain)
        .await
        .map(|ipv4| synthesize_nat64(prefix, ipv4))
        .map_err(TunnelError::Resolution);
    Some(result)
}
