//! Tests for Domain Services - Pure functions for Kademlia operations

use std::cmp::Ordering;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::*;
use crate::domain::{Node, NodeId, NodeKey, NodeRole, SubnetMask, Timestamp, NODE_ID_LEN};

fn key_with_first_byte(first: u8) -> NodeKey {
    let mut bytes = [0u8; 32];
    bytes[0] = first;
    NodeKey(bytes)
}

fn make_node(seed: u16) -> Node {
    let mut bytes = [0u8; NODE_ID_LEN];
    bytes[..2].copy_from_slice(&seed.to_be_bytes());
    Node::new(
        NodeId::new(bytes),
        IpAddr::V4(Ipv4Addr::new(10, 0, (seed >> 8) as u8, seed as u8)),
        30303,
        30303,
        NodeRole::Endpoint,
        Timestamp::new(1000),
    )
}

fn assert_sorted(list: &NodesByDistance) {
    for pair in list.entries().windows(2) {
        assert_ne!(
            dist_cmp(list.target(), pair[0].key(), pair[1].key()),
            Ordering::Greater,
            "entries must be non-decreasing in distance"
        );
    }
}

// =============================================================================
// Test Group 1: Distance Calculation
// =============================================================================

#[test]
fn test_log_dist_is_symmetric() {
    let a = key_with_first_byte(0b1010_0000);
    let b = key_with_first_byte(0b0101_0000);
    assert_eq!(log_dist(&a, &b), log_dist(&b, &a));
}

#[test]
fn test_log_dist_to_self_is_zero() {
    let a = key_with_first_byte(0b1010_1010);
    assert_eq!(log_dist(&a, &a), 0);
}

#[test]
fn test_log_dist_counts_bits_after_common_prefix() {
    let zero = NodeKey([0u8; 32]);
    assert_eq!(log_dist(&zero, &key_with_first_byte(0b1000_0000)), 256);
    assert_eq!(log_dist(&zero, &key_with_first_byte(0b0100_0000)), 255);

    let mut last = [0u8; 32];
    last[31] = 1;
    assert_eq!(log_dist(&zero, &NodeKey(last)), 1);
}

#[test]
fn test_dist_cmp_orders_by_xor() {
    let target = NodeKey([0u8; 32]);
    let near = key_with_first_byte(0b0000_0001);
    let far = key_with_first_byte(0b1000_0000);

    assert_eq!(dist_cmp(&target, &near, &far), Ordering::Less);
    assert_eq!(dist_cmp(&target, &far, &near), Ordering::Greater);
    assert_eq!(dist_cmp(&target, &near, &near), Ordering::Equal);
}

// =============================================================================
// Test Group 2: Candidate Ranking
// =============================================================================

#[test]
fn test_push_keeps_ascending_order_and_bound() {
    let target = NodeId::random().key();
    let mut list = NodesByDistance::new(target, 16);

    for seed in 0..200u16 {
        list.push(make_node(seed));
        assert!(list.len() <= 16);
        assert_sorted(&list);
    }
    assert_eq!(list.len(), 16);
}

#[test]
fn test_push_keeps_the_closest_nodes() {
    let target = NodeId::random().key();
    let nodes: Vec<Node> = (0..64u16).map(make_node).collect();

    let mut list = NodesByDistance::new(target, 8);
    for n in &nodes {
        list.push(n.clone());
    }

    let mut expected = nodes.clone();
    expected.sort_by(|a, b| dist_cmp(&target, a.key(), b.key()));
    expected.truncate(8);

    let got: Vec<NodeId> = list.entries().iter().map(|n| n.id).collect();
    let want: Vec<NodeId> = expected.iter().map(|n| n.id).collect();
    assert_eq!(got, want);
}

#[test]
fn test_push_with_zero_capacity_is_noop() {
    let mut list = NodesByDistance::new(NodeId::random().key(), 0);
    list.push(make_node(1));
    assert!(list.is_empty());
}

#[test]
fn test_closest_to_ranks_input() {
    let target = NodeId::random().key();
    let nodes: Vec<Node> = (0..30u16).map(make_node).collect();
    let list = closest_to(nodes.iter(), &target, 5);
    assert_eq!(list.len(), 5);
    assert_sorted(&list);
}

// =============================================================================
// Test Group 3: IP Diversity
// =============================================================================

#[test]
fn test_same_subnet_ipv4() {
    let mask = SubnetMask::ipv4_default();
    let a = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 1));
    let b = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 200));
    let c = IpAddr::V4(Ipv4Addr::new(203, 0, 114, 1));

    assert!(is_same_subnet(&a, &b, &mask));
    assert!(!is_same_subnet(&a, &c, &mask));
}

#[test]
fn test_same_subnet_partial_prefix() {
    let mask = SubnetMask::new(20);
    let a = IpAddr::V4(Ipv4Addr::new(198, 51, 0x10, 1));
    let b = IpAddr::V4(Ipv4Addr::new(198, 51, 0x1f, 1));
    let c = IpAddr::V4(Ipv4Addr::new(198, 51, 0x20, 1));

    assert!(is_same_subnet(&a, &b, &mask));
    assert!(!is_same_subnet(&a, &c, &mask));
}

#[test]
fn test_mixed_families_never_share_subnet() {
    let mask = SubnetMask::ipv4_default();
    let v4 = IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0));
    let v6 = IpAddr::V6(Ipv6Addr::UNSPECIFIED);
    assert!(!is_same_subnet(&v4, &v6, &mask));
}

#[test]
fn test_lan_detection() {
    assert!(is_lan(&IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))));
    assert!(is_lan(&IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))));
    assert!(is_lan(&IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))));
    assert!(!is_lan(&IpAddr::V4(Ipv4Addr::new(203, 0, 113, 1))));
    assert!(is_lan(&IpAddr::V6(Ipv6Addr::LOCALHOST)));
    assert!(is_lan(&IpAddr::V6("fd00::1".parse().unwrap())));
    assert!(!is_lan(&IpAddr::V6("2001:db8::1".parse().unwrap())));
}
