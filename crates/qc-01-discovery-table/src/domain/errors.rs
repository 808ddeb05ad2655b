//! Domain Errors for the Discovery Table

use thiserror::Error;

/// Errors surfaced by the table to its callers.
///
/// Transient per-peer network failures during lookups are never returned
/// here; they feed the failure counter instead. Only `bond` reports the
/// handshake error it observed.
#[derive(Debug, Clone, Error)]
pub enum TableError {
    /// Attempted to bond with the local node.
    #[error("is self")]
    IsSelf,

    /// A remote-initiated bond arrived before the startup refresh completed.
    #[error("still initializing")]
    StillInitializing,

    /// The ping/pong handshake failed.
    #[error("bonding failed: {0}")]
    Bonding(#[from] TransportError),

    /// A seed node is unusable.
    #[error("invalid seed node {node}: {reason}")]
    InvalidSeed { node: String, reason: String },

    /// Configuration values are out of range.
    #[error("invalid table config: {0}")]
    InvalidConfig(String),

    /// The table has been closed.
    #[error("table closed")]
    Closed,
}

/// Result type for table operations
pub type TableResult<T> = Result<T, TableError>;

/// Errors reported by the discovery transport.
///
/// The core does not interpret the variants: any error means "peer
/// unreachable". The type is `Clone` because every caller joined on one
/// bonding process observes the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No reply within the transport's deadline.
    #[error("network operation timed out")]
    Timeout,

    /// The remote could not be reached.
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    /// The transport has been shut down.
    #[error("transport closed")]
    Closed,
}

/// Errors reported by the node store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store has been closed.
    #[error("node store closed")]
    Closed,

    /// Backend failure.
    #[error("node store backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_error_messages() {
        assert_eq!(TableError::IsSelf.to_string(), "is self");
        assert_eq!(
            TableError::StillInitializing.to_string(),
            "still initializing"
        );
    }

    #[test]
    fn test_bonding_error_wraps_transport_error() {
        let err: TableError = TransportError::Timeout.into();
        assert_eq!(err.to_string(), "bonding failed: network operation timed out");
    }
}
