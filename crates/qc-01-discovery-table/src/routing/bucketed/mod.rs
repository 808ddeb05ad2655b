//! Bucketed routing set: Kademlia k-buckets over the distance key.
//!
//! Only the 17 buckets closest to the local key are kept distinct; every
//! node at log distance `BUCKET_MIN_DISTANCE` or less shares bucket 0.
//! Random identifiers land almost exclusively in the outer buckets, so
//! finer partitioning near the local key would stay empty.

mod bucket;

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, trace};

use super::Storage;
use crate::domain::{
    closest_to, is_lan, log_dist, LookupMode, Node, NodeId, NodeKey, NodeRole, NodesByDistance,
    StorageKind, TableConfig, KEY_BITS,
};
use crate::service::TableCore;

pub(crate) use bucket::KBucket;

/// Number of distinct buckets.
pub(crate) const N_BUCKETS: usize = KEY_BITS / 15;

/// Log distance at or below which nodes share the innermost bucket.
pub(crate) const BUCKET_MIN_DISTANCE: usize = KEY_BITS - N_BUCKETS;

/// Map a log distance to its bucket index.
pub(crate) fn bucket_index(distance: usize) -> usize {
    if distance <= BUCKET_MIN_DISTANCE {
        0
    } else {
        distance - BUCKET_MIN_DISTANCE - 1
    }
}

/// K-bucket routing set with replacement lists and per-subnet limits.
pub(crate) struct BucketedStorage {
    role: NodeRole,
    self_id: NodeId,
    self_key: NodeKey,
    bucket_size: usize,
    max_replacements: usize,
    bucket_ip_limit: usize,
    table_ip_limit: usize,
    random_lookups: usize,
    buckets: Mutex<Vec<KBucket>>,
}

impl BucketedStorage {
    pub(crate) fn new(role: NodeRole, self_id: NodeId, config: &TableConfig) -> Self {
        Self {
            role,
            self_id,
            self_key: self_id.key(),
            bucket_size: config.bucket_size,
            max_replacements: config.max_replacements,
            bucket_ip_limit: config.bucket_ip_limit,
            table_ip_limit: config.table_ip_limit,
            random_lookups: config.random_lookups,
            buckets: Mutex::new((0..N_BUCKETS).map(|_| KBucket::new()).collect()),
        }
    }

    fn bucket_of(&self, key: &NodeKey) -> usize {
        bucket_index(log_dist(&self.self_key, key))
    }

    /// Whether `ip` may take one more slot in bucket `ix`.
    ///
    /// LAN addresses are exempt from both limits.
    fn ip_allowed(&self, buckets: &[KBucket], ix: usize, ip: &IpAddr) -> bool {
        if is_lan(ip) {
            return true;
        }
        if buckets[ix].subnet_count(ip) >= self.bucket_ip_limit {
            trace!(role = %self.role, %ip, bucket = ix, "bucket IP limit reached");
            return false;
        }
        let table_count: usize = buckets.iter().map(|b| b.subnet_count(ip)).sum();
        if table_count >= self.table_ip_limit {
            trace!(role = %self.role, %ip, "table IP limit reached");
            return false;
        }
        true
    }

    /// Promote a random replacement into the slot of `dead`, or drop `dead`
    /// if the bucket has no replacements.
    ///
    /// Does nothing if `dead` is no longer the last entry.
    fn replace(&self, ix: usize, dead: &Node) -> Option<Node> {
        let mut buckets = self.buckets.lock();
        let bucket = &mut buckets[ix];
        if bucket.entries.last().map(|n| n.id) != Some(dead.id) {
            return None;
        }

        if bucket.replacements.is_empty() {
            bucket.entries.pop();
            return None;
        }

        let pick = rand::thread_rng().gen_range(0..bucket.replacements.len());
        let promoted = bucket.take_replacement(pick)?;
        if let Some(last) = bucket.entries.last_mut() {
            *last = promoted.clone();
        }
        Some(promoted)
    }
}

#[async_trait]
impl Storage for BucketedStorage {
    fn role(&self) -> NodeRole {
        self.role
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Bucketed
    }

    fn lookup_mode(&self) -> LookupMode {
        LookupMode::Recursive
    }

    fn add(&self, node: Node) -> bool {
        if node.id == self.self_id {
            return false;
        }

        let ix = self.bucket_of(node.key());
        let mut buckets = self.buckets.lock();

        if let Some(pos) = buckets[ix].position(&node.id) {
            buckets[ix].update_at(pos, node);
            return true;
        }

        if buckets[ix].is_full(self.bucket_size) {
            buckets[ix].add_replacement(node, self.max_replacements);
            return false;
        }

        if !self.ip_allowed(&buckets, ix, &node.ip) {
            return false;
        }
        buckets[ix].push_front(node);
        true
    }

    fn delete(&self, node: &Node) -> bool {
        let ix = self.bucket_of(node.key());
        self.buckets.lock()[ix].remove(&node.id).is_some()
    }

    fn contains(&self, id: &NodeId) -> bool {
        let ix = self.bucket_of(&id.key());
        self.buckets.lock()[ix].contains(id)
    }

    fn len(&self) -> usize {
        self.buckets.lock().iter().map(KBucket::len).sum()
    }

    fn replacement_len(&self) -> usize {
        self.buckets.lock().iter().map(|b| b.replacements.len()).sum()
    }

    fn node_all(&self) -> Vec<Node> {
        self.buckets
            .lock()
            .iter()
            .flat_map(|b| b.entries.iter().cloned())
            .collect()
    }

    fn closest(&self, target: &NodeKey, count: usize) -> NodesByDistance {
        let buckets = self.buckets.lock();
        closest_to(buckets.iter().flat_map(|b| b.entries.iter()), target, count)
    }

    fn stuff(&self, nodes: &[Node]) {
        let mut buckets = self.buckets.lock();
        for node in nodes {
            if node.id == self.self_id {
                continue;
            }
            let ix = self.bucket_of(node.key());
            if buckets[ix].contains(&node.id) || buckets[ix].is_full(self.bucket_size) {
                continue;
            }
            if self.ip_allowed(&buckets, ix, &node.ip) {
                buckets[ix].entries.push(node.clone());
            }
        }
    }

    /// Interleaves bucket heads in random bucket order, so the result is
    /// spread across distances instead of drawn from the fullest bucket.
    fn read_random_nodes(&self, count: usize) -> Vec<Node> {
        let mut lists: Vec<Vec<Node>> = self
            .buckets
            .lock()
            .iter()
            .filter(|b| !b.is_empty())
            .map(|b| b.entries.clone())
            .collect();
        lists.shuffle(&mut rand::thread_rng());

        let mut result = Vec::with_capacity(count);
        let mut depth = 0;
        while result.len() < count {
            let mut took = false;
            for list in &lists {
                if let Some(node) = list.get(depth) {
                    result.push(node.clone());
                    took = true;
                    if result.len() == count {
                        break;
                    }
                }
            }
            if !took {
                break;
            }
            depth += 1;
        }
        result
    }

    fn bucket_entries(&self) -> Vec<Vec<Node>> {
        self.buckets.lock().iter().map(|b| b.entries.clone()).collect()
    }

    fn replacements(&self) -> Vec<Vec<Node>> {
        self.buckets
            .lock()
            .iter()
            .map(|b| b.replacements.clone())
            .collect()
    }

    async fn do_refresh(&self, core: &Arc<TableCore>) {
        let seeds = core.load_seed_nodes(self.role).await;
        self.stuff(&seeds);

        // Self lookup fills the buckets near the local key, random targets
        // fill the rest.
        self.lookup(core, self.self_id, false).await;
        for _ in 0..self.random_lookups {
            self.lookup(core, NodeId::random(), false).await;
        }
        debug!(
            role = %self.role,
            size = self.len(),
            replacements = self.replacement_len(),
            "bucketed refresh done"
        );
    }

    async fn do_revalidate(&self, core: &Arc<TableCore>) {
        let candidate = {
            let buckets = self.buckets.lock();
            let mut order: Vec<usize> = (0..buckets.len()).collect();
            order.shuffle(&mut rand::thread_rng());
            order
                .into_iter()
                .find_map(|ix| buckets[ix].entries.last().cloned().map(|n| (ix, n)))
        };
        let Some((ix, last)) = candidate else {
            return;
        };

        match core.ping(last.id, last.udp_addr()).await {
            Ok(()) => {
                trace!(role = %self.role, node = %last, bucket = ix, "revalidated, moving to head");
                let mut buckets = self.buckets.lock();
                if let Some(pos) = buckets[ix].position(&last.id) {
                    buckets[ix].bump_at(pos);
                }
            }
            Err(e) => match self.replace(ix, &last) {
                Some(promoted) => {
                    debug!(role = %self.role, dead = %last, replacement = %promoted, error = %e, "replaced unresponsive node");
                }
                None => {
                    debug!(role = %self.role, dead = %last, error = %e, "removed unresponsive node");
                }
            },
        }
        core.record_occupancy(self);
    }
}
