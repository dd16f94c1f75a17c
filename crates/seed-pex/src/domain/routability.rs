//! Routability predicate for peer addresses.
//!
//! An address is routable when it can be reached from the public internet.
//! Private, loopback, link-local, shared (CGNAT), benchmarking,
//! documentation, multicast and reserved ranges are not.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Check whether an IP address is globally routable.
pub fn is_routable(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => ipv4_is_routable(v4),
        IpAddr::V6(v6) => ipv6_is_routable(v6),
    }
}

/// Check whether an IP address belongs to this host or its local network.
pub fn is_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback() || v6.is_unspecified() || is_unique_local(v6) || is_unicast_link_local(v6)
        }
    }
}

fn ipv4_is_routable(addr: &Ipv4Addr) -> bool {
    let [a, b, _, _] = addr.octets();

    // 192.0.0.9 and 192.0.0.10 are the only globally routable addresses in 192.0.0.0/24.
    if u32::from(*addr) == 0xc000_0009 || u32::from(*addr) == 0xc000_000a {
        return true;
    }

    !addr.is_private()
        && !addr.is_loopback()
        && !addr.is_link_local()
        && !addr.is_broadcast()
        && !addr.is_documentation()
        && !addr.is_multicast()
        // 0.0.0.0/8
        && a != 0
        // 100.64.0.0/10 shared address space (RFC 6598)
        && !(a == 100 && (b & 0b1100_0000) == 0b0100_0000)
        // 198.18.0.0/15 benchmarking (RFC 2544)
        && !(a == 198 && (b & 0xfe) == 18)
        // 192.0.0.0/24 IETF protocol assignments
        && !(a == 192 && b == 0 && addr.octets()[2] == 0)
        // 240.0.0.0/4 reserved
        && a < 240
}

fn ipv6_is_routable(addr: &Ipv6Addr) -> bool {
    if let Some(v4) = addr.to_ipv4_mapped() {
        return ipv4_is_routable(&v4);
    }

    let segments = addr.segments();
    !addr.is_loopback()
        && !addr.is_unspecified()
        && !addr.is_multicast()
        && !is_unique_local(addr)
        && !is_unicast_link_local(addr)
        // 2001:db8::/32 documentation (RFC 3849)
        && !(segments[0] == 0x2001 && segments[1] == 0x0db8)
        // 2001:10::/28 ORCHID (RFC 4843)
        && !(segments[0] == 0x2001 && (segments[1] & 0xfff0) == 0x0010)
}

/// fc00::/7 (RFC 4193)
fn is_unique_local(addr: &Ipv6Addr) -> bool {
    (addr.segments()[0] & 0xfe00) == 0xfc00
}

/// fe80::/10 (RFC 4862)
fn is_unicast_link_local(addr: &Ipv6Addr) -> bool {
    (addr.segments()[0] & 0xffc0) == 0xfe80
}
