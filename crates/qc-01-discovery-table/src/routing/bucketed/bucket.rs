//! K-Bucket for the bucketed routing set.

use std::net::IpAddr;

use crate::domain::{is_same_subnet, subnet_mask_for, Node, NodeId};

/// A k-bucket: live entries ordered by recency (head = most recent) plus a
/// bounded list of candidates waiting for a slot.
///
/// # Security (Eclipse Attack Defense)
///
/// A full bucket never evicts a live entry to make room. Newcomers wait in
/// the replacement list and are only promoted when revalidation finds a
/// dead entry, so a flood of fresh identities cannot flush stable peers.
#[derive(Debug, Clone, Default)]
pub(crate) struct KBucket {
    pub(crate) entries: Vec<Node>,
    pub(crate) replacements: Vec<Node>,
}

impl KBucket {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn is_full(&self, k: usize) -> bool {
        self.entries.len() >= k
    }

    pub(crate) fn position(&self, id: &NodeId) -> Option<usize> {
        self.entries.iter().position(|n| n.id == *id)
    }

    pub(crate) fn contains(&self, id: &NodeId) -> bool {
        self.position(id).is_some()
    }

    /// Move the entry at `pos` to the head.
    pub(crate) fn bump_at(&mut self, pos: usize) {
        let node = self.entries.remove(pos);
        self.entries.insert(0, node);
    }

    /// Replace the entry at `pos` with `node` and move it to the head.
    /// The existing record's `added_at` is kept.
    pub(crate) fn update_at(&mut self, pos: usize, mut node: Node) {
        let existing = self.entries.remove(pos);
        node.added_at = existing.added_at;
        self.entries.insert(0, node);
    }

    /// Insert at the head and drop it from the replacement list.
    pub(crate) fn push_front(&mut self, node: Node) {
        self.replacements.retain(|n| n.id != node.id);
        self.entries.insert(0, node);
    }

    pub(crate) fn remove(&mut self, id: &NodeId) -> Option<Node> {
        self.position(id).map(|pos| self.entries.remove(pos))
    }

    /// Queue `node` as a replacement candidate, most recent first.
    pub(crate) fn add_replacement(&mut self, node: Node, max: usize) {
        if max == 0 || self.replacements.iter().any(|n| n.id == node.id) {
            return;
        }
        self.replacements.insert(0, node);
        self.replacements.truncate(max);
    }

    /// Take the replacement at `ix` out of the list.
    pub(crate) fn take_replacement(&mut self, ix: usize) -> Option<Node> {
        (ix < self.replacements.len()).then(|| self.replacements.remove(ix))
    }

    /// Entries sharing a subnet with `ip`.
    pub(crate) fn subnet_count(&self, ip: &IpAddr) -> usize {
        let mask = subnet_mask_for(ip);
        self.entries
            .iter()
            .filter(|n| is_same_subnet(&n.ip, ip, &mask))
            .count()
    }
}
