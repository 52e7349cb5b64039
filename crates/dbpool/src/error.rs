//! Pool error types.

use std::fmt;
use std::time::Duration;

use dbpool_core::{ConnectionError, ConnectionId, EngineError};
use thiserror::Error;

/// Result type for pool operations
pub type PoolResult<T> = std::result::Result<T, PoolError>;

/// Errors that can occur in pool operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Opening a new session failed
    #[error("Failed to open connection to {target}: {source}")]
    Open {
        /// Target the pool was connecting to
        target: String,
        /// Engine failure
        source: EngineError,
    },

    /// A freshly opened session failed its liveness check
    #[error("Connection to {target} failed liveness check: {source}")]
    Liveness {
        /// Target the pool was connecting to
        target: String,
        /// Engine failure
        source: EngineError,
    },

    /// Every connection is checked out and the pool is at capacity
    #[error("Pool exhausted: all {max} connections are in use")]
    Exhausted {
        /// Pool capacity
        max: usize,
    },

    /// No connection became free before the deadline
    #[error("Timed out after {0:?} waiting for a free connection")]
    Timeout(Duration),

    /// `init_pool` has not been called yet
    #[error("Pool has not been initialized")]
    NotInitialized,

    /// `init_pool` was already called on this pool
    #[error("Pool is already initialized")]
    AlreadyInitialized,

    /// The pool was torn down
    #[error("Pool has been destroyed")]
    Destroyed,

    /// No engine is registered for the requested target
    #[error("No engine registered for target {0:?}")]
    UnknownTarget(String),

    /// Invalid pool configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A connection handle rejected an operation
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Some connections failed to close during teardown
    #[error("Failed to close {} connection(s) during teardown", .0.len())]
    Teardown(Vec<CloseFailure>),
}

impl PoolError {
    /// Whether the error came from opening or verifying a new session
    #[must_use]
    pub const fn is_creation_failure(&self) -> bool {
        matches!(self, Self::Open { .. } | Self::Liveness { .. })
    }

    /// Whether the pool had no free connection to hand out
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Exhausted { .. } | Self::Timeout(_))
    }
}

/// A connection that could not be closed during teardown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFailure {
    /// Identity of the connection
    pub id: ConnectionId,
    /// Why closing failed
    pub error: ConnectionError,
}

impl fmt::Display for CloseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection {}: {}", self.id, self.error)
    }
}
