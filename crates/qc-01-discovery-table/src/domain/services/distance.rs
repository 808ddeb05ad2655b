//! Kademlia distance calculations over distance keys.

use std::cmp::Ordering;

use crate::domain::{NodeKey, NODE_KEY_LEN};

/// Number of bits in a distance key.
pub const KEY_BITS: usize = NODE_KEY_LEN * 8;

/// Logarithmic XOR distance between two keys.
///
/// Returns the number of bits after the longest common prefix: 0 for equal
/// keys, 256 when the very first bit differs.
pub fn log_dist(a: &NodeKey, b: &NodeKey) -> usize {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    for i in 0..NODE_KEY_LEN {
        let xor = a_bytes[i] ^ b_bytes[i];
        if xor != 0 {
            return KEY_BITS - (i * 8 + xor.leading_zeros() as usize);
        }
    }

    0
}

/// Compare the distances `a ^ target` and `b ^ target`.
///
/// `Ordering::Less` means `a` is closer to `target` than `b`.
pub fn dist_cmp(target: &NodeKey, a: &NodeKey, b: &NodeKey) -> Ordering {
    let t = target.as_bytes();
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    for i in 0..NODE_KEY_LEN {
        let da = a_bytes[i] ^ t[i];
        let db = b_bytes[i] ^ t[i];
        match da.cmp(&db) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    Ordering::Equal
}
