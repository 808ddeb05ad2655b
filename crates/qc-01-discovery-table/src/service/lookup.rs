//! Iterative node lookup shared by all routing sets.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::core::TableCore;
use crate::domain::{LookupMode, Node, NodeId, NodeRole, NodesByDistance};
use crate::metrics;

impl TableCore {
    /// Query nodes closer and closer to `target`, starting from `seeds`.
    ///
    /// At most `alpha` findnode requests are in flight at any time. Every
    /// reply is bonded before it may join the result, and only nodes of
    /// `role` (or bootnodes, which route but are never returned) are kept.
    ///
    /// In [`LookupMode::SingleRound`] only the seeds are queried.
    pub(crate) async fn find_new_nodes(
        self: &Arc<Self>,
        seeds: NodesByDistance,
        target: NodeId,
        role: NodeRole,
        mode: LookupMode,
    ) -> Vec<Node> {
        let alpha = self.config.alpha;
        let mut result = seeds;

        let initial: HashSet<NodeId> = result.entries().iter().map(|n| n.id).collect();
        let mut seen = initial.clone();
        let mut asked = HashSet::new();
        asked.insert(self.self_node.id);

        let (reply_tx, mut reply_rx) = mpsc::channel::<Vec<Node>>(alpha);
        let mut pending = 0usize;

        loop {
            let candidates: Vec<Node> = result
                .entries()
                .iter()
                .filter(|n| !asked.contains(&n.id))
                .filter(|n| mode == LookupMode::Recursive || initial.contains(&n.id))
                .take(alpha - pending)
                .cloned()
                .collect();

            for node in candidates {
                asked.insert(node.id);
                pending += 1;

                let core = Arc::clone(self);
                let reply_tx = reply_tx.clone();
                tokio::spawn(async move {
                    let found = core.find_node_and_bond(&node, target, role).await;
                    let _ = reply_tx.send(found).await;
                });
            }

            if pending == 0 {
                break;
            }

            let Some(found) = reply_rx.recv().await else {
                break;
            };
            pending -= 1;

            for node in found {
                if node.id == self.self_node.id {
                    continue;
                }
                if node.role != role && node.role != NodeRole::Bootnode {
                    continue;
                }
                if seen.insert(node.id) {
                    result.push(node);
                }
            }
        }

        let closest: Vec<Node> = result
            .into_entries()
            .into_iter()
            .filter(|n| n.role != NodeRole::Bootnode)
            .collect();
        debug!(%role, ?target, ?mode, asked = asked.len() - 1, found = closest.len(), "lookup done");
        closest
    }

    /// Send one findnode request and bond with everything it returns.
    ///
    /// A failed request bumps the node's failure counter; past
    /// `max_findnode_failures` the node is evicted from its routing set(s).
    async fn find_node_and_bond(&self, node: &Node, target: NodeId, role: NodeRole) -> Vec<Node> {
        match self
            .transport
            .find_node(node.id, node.udp_addr(), target, role)
            .await
        {
            Ok(found) => {
                trace!(from = %node, count = found.len(), "findnode reply");
                self.bond_all(found).await
            }
            Err(e) => {
                let fails = self.store.find_fails(&node.id).saturating_add(1);
                if let Err(e) = self.store.update_find_fails(&node.id, fails) {
                    warn!(node = %node, error = %e, "failed to record findnode failure");
                }
                trace!(node = %node, fails, error = %e, "findnode failed");

                if fails > self.config.max_findnode_failures {
                    debug!(node = %node, fails, "too many findnode failures, evicting");
                    self.delete(node);
                    metrics::record_findnode_eviction(node.role);
                }
                Vec::new()
            }
        }
    }
}
