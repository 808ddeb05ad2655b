//! Domain Services - Pure functions for Kademlia operations
//!
//! All functions in this module are pure (no I/O, no state mutation)
//! and deterministic (same inputs → same outputs).

// Semantic submodules
mod distance;
mod security;
mod sorting;

// Re-export public API
pub use distance::{dist_cmp, log_dist, KEY_BITS};
pub use security::{is_lan, is_same_subnet, subnet_mask_for};
pub use sorting::{closest_to, NodesByDistance};

#[cfg(test)]
mod tests;
