//! Bonding: the ping/pong handshake that admits a node into the table.
//!
//! A node is only inserted after it has answered a ping from its claimed
//! endpoint, which keeps spoofed findnode replies out of the routing sets.
//! Concurrent bonds with the same node share one handshake.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::OnceCell;
use tracing::{debug, trace, warn};

use super::core::TableCore;
use crate::domain::{Node, NodeId, NodeRole, TableError, TableResult, TransportError};

/// One handshake in flight. Later callers for the same node wait on the
/// cell and observe the first caller's outcome.
#[derive(Default)]
pub(crate) struct BondingProcess {
    outcome: OnceCell<Result<Node, TransportError>>,
}

/// Removes the process entry when the owning bond finishes or is cancelled.
struct BondingGuard<'a> {
    core: &'a TableCore,
    id: NodeId,
    process: Arc<BondingProcess>,
}

impl Drop for BondingGuard<'_> {
    fn drop(&mut self) {
        let mut bonding = self.core.bonding.lock();
        if bonding
            .get(&self.id)
            .is_some_and(|p| Arc::ptr_eq(p, &self.process))
        {
            bonding.remove(&self.id);
        }
    }
}

impl TableCore {
    /// Make sure `id` is a live, verified node and insert it into the table.
    ///
    /// The handshake is skipped for nodes that bonded recently and have no
    /// findnode failures. Bootnodes unknown to the node store always
    /// handshake.
    ///
    /// # Errors
    ///
    /// - `IsSelf` for the local node id
    /// - `StillInitializing` for remote-initiated bonds before the first
    ///   refresh completed
    /// - `Bonding` when the handshake failed; the node is not inserted
    /// - `Closed` once the table has shut down
    pub(crate) async fn bond(
        &self,
        pinged: bool,
        id: NodeId,
        addr: SocketAddr,
        tcp: u16,
        role: NodeRole,
    ) -> TableResult<Node> {
        if self.is_closed() {
            return Err(TableError::Closed);
        }
        if id == self.self_node.id {
            return Err(TableError::IsSelf);
        }
        if pinged && !self.is_init_done() {
            return Err(TableError::StillInitializing);
        }

        let now = self.now();
        let cached = self.store.node(&id);
        let fails = self.store.find_fails(&id);
        let expired = self
            .store
            .last_bond(&id)
            .map_or(true, |at| now.secs_since(at) > self.config.bond_expiration_secs);
        let unknown_bootnode = role == NodeRole::Bootnode && cached.is_none();

        let node = if fails > 0 || expired || unknown_bootnode {
            trace!(node = ?id, fails, expired, unknown_bootnode, "starting handshake");
            self.join_or_start_bond(pinged, id, addr, tcp, role).await?
        } else {
            cached.unwrap_or_else(|| Node::new(id, addr.ip(), addr.port(), tcp, role, now))
        };

        self.add(node.clone());
        Ok(node)
    }

    /// Bond with all `nodes` concurrently, returning those that succeeded.
    pub(crate) async fn bond_all(&self, nodes: Vec<Node>) -> Vec<Node> {
        let bonds = nodes
            .iter()
            .map(|n| self.bond(false, n.id, n.udp_addr(), n.tcp, n.role));

        join_all(bonds)
            .await
            .into_iter()
            .zip(&nodes)
            .filter_map(|(result, requested)| match result {
                Ok(node) => Some(node),
                Err(e) => {
                    trace!(node = %requested, error = %e, "bond failed");
                    None
                }
            })
            .collect()
    }

    pub(super) async fn join_or_start_bond(
        &self,
        pinged: bool,
        id: NodeId,
        addr: SocketAddr,
        tcp: u16,
        role: NodeRole,
    ) -> TableResult<Node> {
        let (process, owner) = {
            let mut bonding = self.bonding.lock();
            match bonding.get(&id) {
                Some(process) => (Arc::clone(process), false),
                None => {
                    let process = Arc::new(BondingProcess::default());
                    bonding.insert(id, Arc::clone(&process));
                    (process, true)
                }
            }
        };

        let _guard = owner.then(|| BondingGuard {
            core: self,
            id,
            process: Arc::clone(&process),
        });

        let outcome = process
            .outcome
            .get_or_init(|| self.ping_pong(pinged, id, addr, tcp, role))
            .await;

        outcome.clone().map_err(TableError::from)
    }

    async fn ping_pong(
        &self,
        pinged: bool,
        id: NodeId,
        addr: SocketAddr,
        tcp: u16,
        role: NodeRole,
    ) -> Result<Node, TransportError> {
        let _slot = self
            .bond_slots
            .acquire()
            .await
            .map_err(|_| TransportError::Closed)?;

        if let Err(e) = self.ping(id, addr).await {
            debug!(node = ?id, %addr, error = %e, "ping failed during bonding");
            return Err(e);
        }

        if !pinged {
            // Give the remote a chance to ping back and record our bond
            // before we send it findnode requests.
            if let Err(e) = self.transport.wait_ping(id).await {
                trace!(node = ?id, error = %e, "no ping back from bonded node");
            }
        }

        let node = Node::new(id, addr.ip(), addr.port(), tcp, role, self.now());
        if let Err(e) = self.store.update_node(&node) {
            warn!(node = %node, error = %e, "failed to persist bonded node");
        }
        // Reset before the process is unregistered.
        if let Err(e) = self.store.update_find_fails(&id, 0) {
            warn!(node = %node, error = %e, "failed to reset findnode failures");
        }
        Ok(node)
    }
}
