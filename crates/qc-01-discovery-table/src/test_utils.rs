//! Test utilities for the discovery table.
//!
//! Mock implementations of the driven ports for deterministic testing.
//! Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust,ignore
//! use qc_01_discovery_table::test_utils::ControllableTimeSource;
//! use qc_01_discovery_table::ports::TimeSource;
//!
//! let time = ControllableTimeSource::new(1000);
//! time.advance(60);
//! assert_eq!(time.now().as_secs(), 1060);
//! ```

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{
    closest_to, Node, NodeId, NodeRole, Timestamp, TransportError, NODE_ID_LEN,
};
use crate::ports::{TimeSource, Transport};

// ============================================================================
// ControllableTimeSource
// ============================================================================

/// Thread-safe TimeSource for tests requiring time advancement.
#[derive(Debug, Default)]
pub struct ControllableTimeSource {
    time: AtomicU64,
}

impl ControllableTimeSource {
    pub fn new(initial: u64) -> Self {
        Self {
            time: AtomicU64::new(initial),
        }
    }

    /// Advances the clock by `secs`.
    pub fn advance(&self, secs: u64) {
        self.time.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ControllableTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.time.load(Ordering::SeqCst))
    }
}

// ============================================================================
// MockTransport
// ============================================================================

/// Maximum nodes in one findnode reply.
const MAX_NEIGHBORS: usize = 16;

#[derive(Default)]
struct MockState {
    /// Reachable nodes and the neighbours each one knows.
    peers: HashMap<NodeId, Vec<Node>>,
    unreachable: HashSet<NodeId>,
    failing_find_node: HashSet<NodeId>,
    pings: Vec<NodeId>,
    wait_pings: Vec<NodeId>,
    pings_in_flight: usize,
    max_pings_in_flight: usize,
    find_nodes: Vec<(NodeId, NodeId)>,
    in_flight: HashMap<NodeId, usize>,
    max_in_flight: HashMap<NodeId, usize>,
    closed: bool,
}

/// In-memory discovery network.
///
/// Nodes are registered with the neighbours they report. Pings to
/// unregistered or unreachable nodes fail, findnode requests can be made to
/// fail per node, and every request is recorded. Each request waits
/// `latency` so concurrency can be observed under paused tokio time.
pub struct MockTransport {
    state: Mutex<MockState>,
    latency: Duration,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            latency,
        }
    }

    /// Make `node` reachable, answering findnode with `neighbors`.
    pub fn register(&self, node: &Node, neighbors: Vec<Node>) {
        self.state.lock().peers.insert(node.id, neighbors);
    }

    /// Make pings to `id` fail.
    pub fn set_unreachable(&self, id: NodeId) {
        self.state.lock().unreachable.insert(id);
    }

    /// Make findnode requests to `id` fail.
    pub fn fail_find_node(&self, id: NodeId) {
        self.state.lock().failing_find_node.insert(id);
    }

    /// Number of pings sent to `id`.
    pub fn ping_count(&self, id: &NodeId) -> usize {
        self.state.lock().pings.iter().filter(|p| *p == id).count()
    }

    /// Number of times the table waited for `id` to ping back.
    pub fn wait_ping_count(&self, id: &NodeId) -> usize {
        self.state.lock().wait_pings.iter().filter(|p| *p == id).count()
    }

    /// Highest number of pings in flight at once.
    pub fn max_concurrent_pings(&self) -> usize {
        self.state.lock().max_pings_in_flight
    }

    /// Number of findnode requests sent to `id`.
    pub fn find_node_count(&self, id: &NodeId) -> usize {
        self.state
            .lock()
            .find_nodes
            .iter()
            .filter(|(to, _)| to == id)
            .count()
    }

    /// Highest number of concurrent findnode requests seen for `target`.
    pub fn max_in_flight(&self, target: &NodeId) -> usize {
        self.state
            .lock()
            .max_in_flight
            .get(target)
            .copied()
            .unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn ping(&self, id: NodeId, addr: SocketAddr) -> Result<(), TransportError> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(TransportError::Closed);
            }
            state.pings.push(id);
            state.pings_in_flight += 1;
            state.max_pings_in_flight = state.max_pings_in_flight.max(state.pings_in_flight);
        }
        self.delay().await;

        let mut state = self.state.lock();
        state.pings_in_flight -= 1;
        if state.unreachable.contains(&id) || !state.peers.contains_key(&id) {
            return Err(TransportError::Unreachable(addr.to_string()));
        }
        Ok(())
    }

    async fn wait_ping(&self, id: NodeId) -> Result<(), TransportError> {
        self.state.lock().wait_pings.push(id);
        Ok(())
    }

    async fn find_node(
        &self,
        id: NodeId,
        addr: SocketAddr,
        target: NodeId,
        role: NodeRole,
    ) -> Result<Vec<Node>, TransportError> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(TransportError::Closed);
            }
            state.find_nodes.push((id, target));
            let in_flight = state.in_flight.entry(target).or_insert(0);
            *in_flight += 1;
            let current = *in_flight;
            let max = state.max_in_flight.entry(target).or_insert(0);
            *max = (*max).max(current);
        }
        self.delay().await;

        let mut state = self.state.lock();
        if let Some(in_flight) = state.in_flight.get_mut(&target) {
            *in_flight -= 1;
        }
        if state.failing_find_node.contains(&id) {
            return Err(TransportError::Timeout);
        }
        let Some(neighbors) = state.peers.get(&id) else {
            return Err(TransportError::Unreachable(addr.to_string()));
        };

        let matching: Vec<&Node> = neighbors.iter().filter(|n| n.role == role).collect();
        Ok(closest_to(matching, &target.key(), MAX_NEIGHBORS).into_entries())
    }

    fn close(&self) {
        self.state.lock().closed = true;
    }
}

// ============================================================================
// Node builders
// ============================================================================

/// Creates a NodeId with the first two bytes set from `val`, rest zeroed.
pub fn make_node_id(val: u16) -> NodeId {
    let mut bytes = [0u8; NODE_ID_LEN];
    bytes[..2].copy_from_slice(&val.to_be_bytes());
    NodeId::new(bytes)
}

/// Creates a node with a unique id and a 10.x.y.z (LAN) address.
pub fn make_node(val: u16, role: NodeRole) -> Node {
    let [hi, lo] = val.to_be_bytes();
    Node::new(
        make_node_id(val),
        IpAddr::V4(Ipv4Addr::new(10, hi, lo, 1)),
        30303,
        30303,
        role,
        Timestamp::new(1000),
    )
}

/// Same as [`make_node`] but with a public address in `subnet` (a /24).
pub fn make_public_node(val: u16, subnet: [u8; 3], host: u8, role: NodeRole) -> Node {
    Node::new(
        make_node_id(val),
        IpAddr::V4(Ipv4Addr::new(subnet[0], subnet[1], subnet[2], host)),
        30303,
        30303,
        role,
        Timestamp::new(1000),
    )
}
