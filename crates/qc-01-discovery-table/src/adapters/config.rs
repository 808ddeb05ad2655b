use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::{Node, NodeId, NodeRole, TableConfig, Timestamp, NODE_ID_LEN};
use crate::ports::ConfigProvider;

// ============================================================================
// StaticConfigProvider - Hardcoded config for testing/development
// ============================================================================

/// Static configuration provider with hardcoded values.
///
/// Useful for testing and development. For production, use `TomlConfigProvider`.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    bootstrap_nodes: Vec<Node>,
    config: TableConfig,
}

impl StaticConfigProvider {
    /// Create with default config and no bootstrap nodes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_bootstrap_nodes(mut self, nodes: Vec<Node>) -> Self {
        self.bootstrap_nodes = nodes;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: TableConfig) -> Self {
        self.config = config;
        self
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn get_bootstrap_nodes(&self) -> Vec<Node> {
        self.bootstrap_nodes.clone()
    }

    fn get_table_config(&self) -> TableConfig {
        self.config.clone()
    }
}

// ============================================================================
// TomlConfigProvider - Production Config Loading
// ============================================================================

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    bootstrap: BootstrapConfig,
    #[serde(default)]
    table: TableConfig,
}

#[derive(Debug, Deserialize, Default)]
struct BootstrapConfig {
    #[serde(default)]
    nodes: Vec<String>,
}

/// TOML-based configuration provider.
///
/// # Config File Format
///
/// ```toml
/// [bootstrap]
/// nodes = [
///     "<128 hex chars>@203.0.113.7:30303",
///     "<128 hex chars>@[2001:db8::1]:30303?tcp=30304",
/// ]
///
/// [table]
/// bucket_size = 16
/// alpha = 3
/// refresh_interval_secs = 1800
/// ```
///
/// Every `[table]` key is optional and falls back to its default. A
/// malformed bootstrap entry fails the whole load.
#[derive(Debug, Clone)]
pub struct TomlConfigProvider {
    bootstrap_nodes: Vec<Node>,
    config: TableConfig,
}

impl TomlConfigProvider {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let bootstrap_nodes = file
            .bootstrap
            .nodes
            .iter()
            .map(|s| parse_seed(s))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            bootstrap_nodes,
            config: file.table,
        })
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn get_bootstrap_nodes(&self) -> Vec<Node> {
        self.bootstrap_nodes.clone()
    }

    fn get_table_config(&self) -> TableConfig {
        self.config.clone()
    }
}

/// Parse a bootstrap entry of the form `<hex id>@<ip>:<udp>[?tcp=<port>]`.
///
/// The TCP port defaults to the UDP port. The result has role `Bootnode`.
pub fn parse_seed(seed: &str) -> Result<Node, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidSeed {
        seed: seed.to_string(),
        reason: reason.to_string(),
    };

    let (id_hex, endpoint) = seed.split_once('@').ok_or_else(|| invalid("missing '@'"))?;

    let bytes = hex::decode(id_hex).map_err(|_| invalid("node id is not hex"))?;
    let id_bytes: [u8; NODE_ID_LEN] = bytes
        .try_into()
        .map_err(|_| invalid("node id must be 64 bytes"))?;

    let (addr, query) = match endpoint.split_once('?') {
        Some((addr, query)) => (addr, Some(query)),
        None => (endpoint, None),
    };
    let addr: SocketAddr = addr.parse().map_err(|_| invalid("bad address"))?;

    let tcp = match query {
        None => addr.port(),
        Some(query) => query
            .strip_prefix("tcp=")
            .and_then(|port| port.parse::<u16>().ok())
            .ok_or_else(|| invalid("bad tcp port"))?,
    };

    let node = Node::new(
        NodeId::new(id_bytes),
        addr.ip(),
        addr.port(),
        tcp,
        NodeRole::Bootnode,
        Timestamp::default(),
    );
    node.validate_complete().map_err(invalid)?;
    Ok(node)
}

/// Errors that can occur during config loading.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {error}")]
    Io { path: String, error: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid bootstrap node {seed}: {reason}")]
    InvalidSeed { seed: String, reason: String },
}
