//! Core Domain Entities for the Discovery Table
//!
//! Node identity, derived distance key, role tag and the node record itself.

use std::fmt;
use std::hash::Hash;
use std::net::{IpAddr, SocketAddr};

use sha3::{Digest, Keccak256};

/// Length of a node identifier in bytes (uncompressed secp256k1 public key).
pub const NODE_ID_LEN: usize = 64;

/// Length of a distance key in bytes.
pub const NODE_KEY_LEN: usize = 32;

/// 512-bit public node identifier.
///
/// The identifier is never used for distance comparisons directly; see
/// [`NodeKey`].
///
/// # Security (Timing Attack Prevention)
///
/// Equality is constant-time. Standard `PartialEq` for byte arrays
/// short-circuits on the first difference, which leaks identifier prefixes
/// through timing.
// SAFETY: derived_hash_with_manual_eq is intentionally allowed here.
// The manual PartialEq provides constant-time comparison, and hashing the
// underlying bytes is consistent with it since equal ids have equal bytes.
#[allow(clippy::derived_hash_with_manual_eq)]
#[derive(Clone, Copy, Hash)]
pub struct NodeId(pub [u8; NODE_ID_LEN]);

impl PartialEq for NodeId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        let mut result = 0u8;
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            result |= a ^ b;
        }
        result == 0
    }
}

impl Eq for NodeId {}

impl NodeId {
    /// Create a NodeId from a raw 64-byte array.
    pub fn new(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }

    /// The all-zero identifier. Never valid for a live node.
    pub fn zero() -> Self {
        Self([0u8; NODE_ID_LEN])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Generate a random identifier (used as a lookup target).
    pub fn random() -> Self {
        let mut bytes = [0u8; NODE_ID_LEN];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes[..]);
        Self(bytes)
    }

    /// Derive the distance key for this identifier.
    pub fn key(&self) -> NodeKey {
        NodeKey::of(self)
    }
}

impl AsRef<[u8]> for NodeId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Abbreviated, full ids flood the logs.
        write!(f, "NodeId({}..)", hex::encode(&self.0[..8]))
    }
}

/// 256-bit distance key: Keccak-256 of a [`NodeId`].
///
/// All XOR distance computations operate on this key. Because it is a
/// one-way hash, a peer cannot place itself next to a chosen target by
/// picking its identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub [u8; NODE_KEY_LEN]);

impl NodeKey {
    /// Hash an identifier into its distance key.
    pub fn of(id: &NodeId) -> Self {
        let digest = Keccak256::digest(id.as_bytes());
        let mut bytes = [0u8; NODE_KEY_LEN];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NODE_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeKey({}..)", hex::encode(&self.0[..8]))
    }
}

/// Peer classification. Determines which routing topology applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeRole {
    /// Member of the consensus committee.
    Consensus,
    /// Relay between consensus nodes and the open network.
    Proxy,
    /// General network participant.
    Endpoint,
    /// Discovery seed. Never an application-level peer.
    Bootnode,
}

impl NodeRole {
    /// All roles, in a stable order.
    pub const ALL: [NodeRole; 4] = [
        NodeRole::Consensus,
        NodeRole::Proxy,
        NodeRole::Endpoint,
        NodeRole::Bootnode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consensus => "consensus",
            Self::Proxy => "proxy",
            Self::Endpoint => "endpoint",
            Self::Bootnode => "bootnode",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote peer as known to the discovery table.
///
/// Nodes are plain values: storages and the node store keep independent
/// copies. The distance key is private and always recomputed from the
/// identifier, so a key received over the wire is never trusted.
#[derive(Debug, Clone)]
pub struct Node {
    /// Public identifier.
    pub id: NodeId,
    /// IP address of the node.
    pub ip: IpAddr,
    /// Discovery (UDP) port.
    pub udp: u16,
    /// Peer-to-peer (TCP) port.
    pub tcp: u16,
    /// Role tag.
    pub role: NodeRole,
    /// When the node entered the local table.
    pub added_at: Timestamp,
    key: NodeKey,
}

impl Node {
    /// Create a node, deriving its distance key from `id`.
    pub fn new(
        id: NodeId,
        ip: IpAddr,
        udp: u16,
        tcp: u16,
        role: NodeRole,
        added_at: Timestamp,
    ) -> Self {
        Self {
            id,
            ip,
            udp,
            tcp,
            role,
            added_at,
            key: id.key(),
        }
    }

    /// The distance key (Keccak-256 of the identifier).
    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    /// UDP endpoint used for discovery traffic.
    pub fn udp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.udp)
    }

    /// Check that the record carries everything needed to contact the node.
    pub fn validate_complete(&self) -> Result<(), &'static str> {
        if self.id.is_zero() {
            return Err("missing node id");
        }
        if self.ip.is_unspecified() {
            return Err("unspecified IP address");
        }
        if self.udp == 0 {
            return Err("missing UDP port");
        }
        Ok(())
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{} ({})",
            hex::encode(&self.id.0[..8]),
            self.ip,
            self.udp,
            self.role
        )
    }
}

/// Unix timestamp in seconds
///
/// # Security (Timestamp Bounds)
///
/// Timestamps are clamped to a reasonable maximum to prevent overflow
/// attacks in sorting and comparison operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Maximum reasonable timestamp (year 9999).
    pub const MAX_REASONABLE: u64 = 253_402_300_799;

    /// Create a new timestamp, clamping to MAX_REASONABLE.
    pub fn new(secs: u64) -> Self {
        Self(secs.min(Self::MAX_REASONABLE))
    }

    /// Get the underlying seconds value.
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Add seconds to timestamp (saturating at MAX_REASONABLE).
    pub fn add_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs).min(Self::MAX_REASONABLE))
    }

    /// Subtract seconds from timestamp (saturating at 0).
    pub fn sub_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    /// Seconds elapsed from `earlier` to `self` (0 if `earlier` is later).
    pub fn secs_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}
