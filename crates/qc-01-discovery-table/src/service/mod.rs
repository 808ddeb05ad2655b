//! # Discovery Table Service
//!
//! The [`Table`] handle and the machinery behind it:
//!
//! - `core`: shared state, role routing, seed loading
//! - `bonding`: ping/pong handshake with per-node deduplication
//! - `lookup`: the alpha-bounded iterative lookup
//! - `maintenance`: the background refresh/revalidate loop
//! - `topology`: which routing sets exist for each local role

mod api;
mod bonding;
mod core;
mod lookup;
mod maintenance;
mod topology;

pub use self::core::Table;
pub(crate) use self::core::TableCore;
