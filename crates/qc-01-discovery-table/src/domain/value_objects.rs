//! Value Objects for the Discovery Table

use serde::Deserialize;

use super::errors::TableError;

/// Iteration mode of the shared lookup primitive.
///
/// Selected explicitly by each storage strategy instead of being inferred
/// from the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    /// Keep querying newly learned closer nodes until none are left unasked.
    Recursive,
    /// Query only the initial candidate set, merge the replies, stop.
    SingleRound,
}

/// Concrete routing-set strategy, for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Ordered list, most recently validated first.
    Flat,
    /// Distance-partitioned k-buckets with replacement lists.
    Bucketed,
}

/// Tuning parameters for the discovery table
///
/// Durations are in seconds to match the `Timestamp` clock.
///
/// # Security Notes
///
/// - `max_bonding` caps concurrent ping/pong handshakes regardless of how
///   many lookups are in flight.
/// - `max_findnode_failures`: a node whose persistent failure counter
///   exceeds this value is evicted.
/// - `bucket_ip_limit` / `table_ip_limit` bound how much of the bucketed
///   table one subnet can occupy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Kademlia bucket size, also the lookup result size (default: 16)
    pub bucket_size: usize,
    /// Lookup concurrency per round (default: 3)
    pub alpha: usize,
    /// Concurrent bonding handshakes (default: 16)
    pub max_bonding: usize,
    /// Failure count above which a node is evicted (default: 5)
    pub max_findnode_failures: u32,
    /// Replacement list length per bucket (default: 10)
    pub max_replacements: usize,
    /// Membership cap of a flat storage (default: 64)
    pub flat_max_size: usize,
    /// Entries per subnet in one bucket (default: 2)
    pub bucket_ip_limit: usize,
    /// Entries per subnet in one bucketed table (default: 10)
    pub table_ip_limit: usize,
    /// Periodic refresh (default: 30 minutes)
    pub refresh_interval_secs: u64,
    /// Upper bound of the randomized revalidation delay (default: 10s)
    pub revalidate_interval_secs: u64,
    /// Persistence of long-lived members (default: 30s)
    pub copy_nodes_interval_secs: u64,
    /// A bond older than this is redone (default: 24h)
    pub bond_expiration_secs: u64,
    /// Seeds loaded from the node store per refresh (default: 30)
    pub seed_count: usize,
    /// Maximum age of a stored seed (default: 5 days)
    pub seed_max_age_secs: u64,
    /// Minimum table residency before a node is persisted (default: 5 min)
    pub seed_min_table_time_secs: u64,
    /// Node store expiry cycle (default: 1h)
    pub expire_interval_secs: u64,
    /// Random-target lookups per bucketed refresh (default: 3)
    pub random_lookups: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            bucket_size: 16,
            alpha: 3,
            max_bonding: 16,
            max_findnode_failures: 5,
            max_replacements: 10,
            flat_max_size: 64,
            bucket_ip_limit: 2,
            table_ip_limit: 10,
            refresh_interval_secs: 30 * 60,
            revalidate_interval_secs: 10,
            copy_nodes_interval_secs: 30,
            bond_expiration_secs: 24 * 60 * 60,
            seed_count: 30,
            seed_max_age_secs: 5 * 24 * 60 * 60,
            seed_min_table_time_secs: 5 * 60,
            expire_interval_secs: 60 * 60,
            random_lookups: 3,
        }
    }
}

impl TableConfig {
    /// Create a config suitable for testing (smaller values)
    pub fn for_testing() -> Self {
        Self {
            bucket_size: 4,
            alpha: 2,
            max_bonding: 4,
            max_replacements: 2,
            flat_max_size: 4,
            random_lookups: 1,
            ..Self::default()
        }
    }

    /// Reject values that would stall the table or its loop.
    pub fn validate(&self) -> Result<(), TableError> {
        let sizes = [
            ("bucket_size", self.bucket_size),
            ("alpha", self.alpha),
            ("max_bonding", self.max_bonding),
            ("flat_max_size", self.flat_max_size),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(TableError::InvalidConfig(format!("{name} must be non-zero")));
            }
        }

        let intervals = [
            ("refresh_interval_secs", self.refresh_interval_secs),
            ("revalidate_interval_secs", self.revalidate_interval_secs),
            ("copy_nodes_interval_secs", self.copy_nodes_interval_secs),
            ("expire_interval_secs", self.expire_interval_secs),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(TableError::InvalidConfig(format!("{name} must be non-zero")));
            }
        }

        Ok(())
    }
}

/// Subnet mask for IP diversity checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetMask {
    /// Prefix length in bits (e.g., 24 for /24)
    pub prefix_length: u8,
}

impl SubnetMask {
    pub fn new(prefix_length: u8) -> Self {
        Self { prefix_length }
    }

    /// Default /24 subnet mask for IPv4
    pub fn ipv4_default() -> Self {
        Self { prefix_length: 24 }
    }

    /// Default /48 subnet mask for IPv6
    pub fn ipv6_default() -> Self {
        Self { prefix_length: 48 }
    }
}

impl Default for SubnetMask {
    fn default() -> Self {
        Self::ipv4_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_config_defaults() {
        let config = TableConfig::default();
        assert_eq!(config.bucket_size, 16);
        assert_eq!(config.alpha, 3);
        assert_eq!(config.max_bonding, 16);
        assert_eq!(config.max_findnode_failures, 5);
        assert_eq!(config.refresh_interval_secs, 1800);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = TableConfig {
            alpha: 0,
            ..TableConfig::default()
        };
        assert!(matches!(config.validate(), Err(TableError::InvalidConfig(_))));

        let config = TableConfig {
            revalidate_interval_secs: 0,
            ..TableConfig::default()
        };
        assert!(matches!(config.validate(), Err(TableError::InvalidConfig(_))));
    }

    #[test]
    fn test_subnet_mask_defaults() {
        assert_eq!(SubnetMask::ipv4_default().prefix_length, 24);
        assert_eq!(SubnetMask::ipv6_default().prefix_length, 48);
    }
}
