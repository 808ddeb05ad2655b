//! Candidate ranking by distance to a lookup target.

use std::cmp::Ordering;

use super::distance::dist_cmp;
use crate::domain::{Node, NodeKey};

/// Bounded list of nodes ordered by ascending distance to `target`.
///
/// Insertion finds the position with a binary search and shifts the tail,
/// which is O(max) per push. `max` is a bucket size, so this stays cheap.
#[derive(Debug, Clone)]
pub struct NodesByDistance {
    entries: Vec<Node>,
    target: NodeKey,
    max: usize,
}

impl NodesByDistance {
    /// Create an empty candidate list holding at most `max` nodes.
    pub fn new(target: NodeKey, max: usize) -> Self {
        Self {
            entries: Vec::with_capacity(max),
            target,
            max,
        }
    }

    /// Insert `node` at its distance rank.
    ///
    /// When the list is full, a node farther than every entry is dropped,
    /// otherwise the farthest entry falls off the end.
    pub fn push(&mut self, node: Node) {
        if self.max == 0 {
            return;
        }

        let ix = self
            .entries
            .partition_point(|e| dist_cmp(&self.target, e.key(), node.key()) != Ordering::Greater);

        if self.entries.len() < self.max {
            self.entries.insert(ix, node);
        } else if ix < self.entries.len() {
            self.entries.insert(ix, node);
            self.entries.truncate(self.max);
        }
    }

    /// The lookup target this list is ranked against.
    pub fn target(&self) -> &NodeKey {
        &self.target
    }

    pub fn entries(&self) -> &[Node] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Node> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rank `nodes` against `target`, keeping the `max` closest.
pub fn closest_to<'a, I>(nodes: I, target: &NodeKey, max: usize) -> NodesByDistance
where
    I: IntoIterator<Item = &'a Node>,
{
    let mut result = NodesByDistance::new(*target, max);
    for node in nodes {
        result.push(node.clone());
    }
    result
}
