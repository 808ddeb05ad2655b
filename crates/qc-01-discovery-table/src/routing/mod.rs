//! # Routing Sets
//!
//! One routing set per remote role, each backed by a storage strategy:
//!
//! - [`FlatStorage`]: ordered list, most recently validated first. Used for
//!   the small consensus/proxy/bootnode populations.
//! - [`BucketedStorage`]: Kademlia k-buckets with replacement lists and IP
//!   limits. Used for the open endpoint population.
//!
//! Both strategies share the lookup primitive in `service::lookup`; they
//! differ only in which [`LookupMode`] they ask for and in how they refresh
//! and revalidate.

mod bucketed;
mod flat;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{LookupMode, Node, NodeId, NodeKey, NodeRole, NodesByDistance, StorageKind};
use crate::service::TableCore;

pub(crate) use bucketed::{BucketedStorage, BUCKET_MIN_DISTANCE, N_BUCKETS};
pub(crate) use flat::FlatStorage;

/// Routing-set contract shared by both strategies.
///
/// Synchronous methods touch only in-memory state under the storage's own
/// lock and never await. Methods that talk to the network receive the
/// table core and must not hold the lock across an await point.
#[async_trait]
pub(crate) trait Storage: Send + Sync {
    /// Role this routing set holds (bootnodes are admitted in every set).
    fn role(&self) -> NodeRole;

    fn kind(&self) -> StorageKind;

    /// Iteration mode used when this set drives a lookup.
    fn lookup_mode(&self) -> LookupMode;

    /// Insert or bump `node`. Returns false if it was not admitted.
    fn add(&self, node: Node) -> bool;

    /// Remove `node` from the routing set. Returns true if it was present.
    fn delete(&self, node: &Node) -> bool;

    fn contains(&self, id: &NodeId) -> bool;

    /// Number of routing-set members.
    fn len(&self) -> usize;

    /// Number of nodes waiting in replacement lists.
    fn replacement_len(&self) -> usize;

    /// Snapshot of all members.
    fn node_all(&self) -> Vec<Node>;

    /// Up to `count` members closest to `target`.
    fn closest(&self, target: &NodeKey, count: usize) -> NodesByDistance;

    /// Add nodes at the back of the set, only where there is room.
    fn stuff(&self, nodes: &[Node]);

    /// Up to `count` members in random order.
    fn read_random_nodes(&self, count: usize) -> Vec<Node>;

    /// Members grouped per bucket. Flat storages report a single bucket.
    fn bucket_entries(&self) -> Vec<Vec<Node>>;

    /// Replacement lists grouped per bucket.
    fn replacements(&self) -> Vec<Vec<Node>>;

    /// Refresh this routing set from seeds and self/random lookups.
    async fn do_refresh(&self, core: &Arc<TableCore>);

    /// Check the liveness of one member.
    async fn do_revalidate(&self, core: &Arc<TableCore>);

    /// Find the nodes of this set's role closest to `target`.
    ///
    /// With `refresh_if_empty`, an empty set first waits for a table refresh
    /// so the lookup has something to start from.
    async fn lookup(
        &self,
        core: &Arc<TableCore>,
        target: NodeId,
        refresh_if_empty: bool,
    ) -> Vec<Node> {
        let key = target.key();
        let mut refresh_if_empty = refresh_if_empty;
        let seeds = loop {
            let seeds = self.closest(&key, core.config.bucket_size);
            if !seeds.is_empty() || !refresh_if_empty {
                break seeds;
            }
            core.refresh().await;
            refresh_if_empty = false;
        };

        core.find_new_nodes(seeds, target, self.role(), self.lookup_mode())
            .await
    }

    /// Persist members that have stayed in the set long enough to be
    /// useful as future seeds.
    fn copy_bonded_nodes(&self, core: &TableCore) {
        let now = core.now();
        let min_age = core.config.seed_min_table_time_secs;
        for node in self.node_all() {
            if now.secs_since(node.added_at) < min_age {
                continue;
            }
            if let Err(e) = core.store.update_node(&node) {
                tracing::warn!(node = %node, error = %e, "failed to persist routing-set member");
            }
        }
    }
}
