//! # Adapters
//!
//! Implementations of the driven ports that ship with the crate:
//!
//! - `MemoryNodeStore`: in-process node store
//! - `SystemTimeSource`: wall-clock time
//! - `StaticConfigProvider` / `TomlConfigProvider`: configuration sources
//!
//! The UDP transport lives with the wire protocol, outside this crate.

mod config;
mod node_store;
mod time;

pub use config::{parse_seed, ConfigError, StaticConfigProvider, TomlConfigProvider};
pub use node_store::MemoryNodeStore;
pub use time::SystemTimeSource;
