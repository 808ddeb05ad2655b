//! Security services: Sybil resistance logic.
//!
//! SECURITY-CRITICAL: Contains IP diversity checks.
//! Isolate for security audits.

use std::net::IpAddr;

use crate::domain::SubnetMask;

/// Check if two IP addresses share the same subnet prefix.
///
/// # Security (Sybil Resistance)
/// Used to cap how many bucketed routing-set entries one subnet may hold.
/// Prevents a single attacker controlling a subnet from filling our buckets.
pub fn is_same_subnet(a: &IpAddr, b: &IpAddr, mask: &SubnetMask) -> bool {
    match (a, b) {
        (IpAddr::V4(a), IpAddr::V4(b)) => {
            prefix_matches(&a.octets(), &b.octets(), mask.prefix_length)
        }
        (IpAddr::V6(a), IpAddr::V6(b)) => {
            prefix_matches(&a.octets(), &b.octets(), mask.prefix_length)
        }
        // IPv4 and IPv6 addresses are in disjoint address spaces
        _ => false,
    }
}

/// Default diversity mask for the address family of `ip`.
pub fn subnet_mask_for(ip: &IpAddr) -> SubnetMask {
    match ip {
        IpAddr::V4(_) => SubnetMask::ipv4_default(),
        IpAddr::V6(_) => SubnetMask::ipv6_default(),
    }
}

/// Addresses exempt from diversity limits (loopback, private, link-local).
///
/// Private networks legitimately host many nodes behind one prefix.
pub fn is_lan(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            // fc00::/7 unique local, fe80::/10 link local
            let first = v6.segments()[0];
            v6.is_loopback() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}

/// Compare byte slices up to a prefix length in bits.
fn prefix_matches(a: &[u8], b: &[u8], prefix_bits: u8) -> bool {
    let max_bytes = a.len().min(b.len());
    let prefix_bytes = (prefix_bits / 8) as usize;
    let remaining_bits = prefix_bits % 8;

    for i in 0..prefix_bytes.min(max_bytes) {
        if a[i] != b[i] {
            return false;
        }
    }

    // Compare partial byte if prefix doesn't align to byte boundary
    if remaining_bits > 0 && prefix_bytes < max_bytes {
        let mask_byte = 0xFFu8 << (8 - remaining_bits);
        return (a[prefix_bytes] & mask_byte) == (b[prefix_bytes] & mask_byte);
    }

    true
}
