//! # Discovery Table
//!
//! Role-aware node discovery table for a permissioned P2P network.
//!
//! Nodes are identified by 512-bit public keys and ordered by the XOR
//! distance of their Keccak-256 hashes. Each node keeps one routing set per
//! remote role it cares about (consensus, proxy, endpoint, bootnode), chosen
//! by its own role. Small populations live in flat, recency-ordered lists;
//! the open endpoint population lives in Kademlia k-buckets.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture with:
//! - **Domain Layer:** Node identity, distance metric, candidate ranking
//! - **Ports Layer:** `DiscoveryApi` (driving) and `Transport`, `NodeStore`,
//!   `TimeSource`, `ConfigProvider` (driven)
//! - **Routing Layer:** Flat and bucketed storage strategies
//! - **Service Layer:** Bonding, lookups and the maintenance loop
//! - **Adapters Layer:** In-memory node store, system clock, TOML config
//!
//! ## Features
//!
//! - `metrics` - Prometheus gauges/counters for routing-set occupancy
//! - `test-utils` - `MockTransport`, `ControllableTimeSource`, node builders
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use qc_01_discovery_table::{
//!     DiscoveryApi, MemoryNodeStore, NodeRole, SystemTimeSource, Table, TomlConfigProvider,
//! };
//!
//! let provider = TomlConfigProvider::load("discovery.toml")?;
//! let table = Table::from_provider(
//!     self_node,
//!     &provider,
//!     Arc::new(udp_transport),
//!     Arc::new(MemoryNodeStore::new()),
//!     Arc::new(SystemTimeSource::new()),
//! )?;
//!
//! let peers = table.lookup(target, NodeRole::Endpoint).await;
//! table.close().await;
//! ```

pub mod adapters;
pub mod domain;
pub mod metrics;
pub mod ports;
mod routing;
pub mod service;

/// Test utilities (MockTransport, ControllableTimeSource, ...)
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Domain
pub use domain::{
    LookupMode, Node, NodeId, NodeKey, NodeRole, StorageKind, StoreError, TableConfig,
    TableError, TableResult, Timestamp, TransportError,
};

// Ports
pub use ports::{ConfigProvider, DiscoveryApi, NodeStore, TimeSource, Transport};

// Service
pub use service::Table;

// Adapters
pub use adapters::{
    parse_seed, ConfigError, MemoryNodeStore, StaticConfigProvider, SystemTimeSource,
    TomlConfigProvider,
};
