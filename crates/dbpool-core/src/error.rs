//! Error types for engines and connection handles.

use thiserror::Error;

use crate::connection::ConnectionId;

/// Result type for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Result type for connection handle operations
pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;

/// Errors reported by an underlying database engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Opening a session failed (bad connection spec, unreachable engine)
    #[error("Open failed: {0}")]
    Open(String),

    /// Liveness check on an open session failed
    #[error("Ping failed: {0}")]
    Ping(String),

    /// Query execution failed
    #[error("Execute failed: {0}")]
    Execute(String),

    /// Closing a session failed
    #[error("Close failed: {0}")]
    Close(String),

    /// The engine does not support the requested operation
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Errors reported by a connection handle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The handle was closed; its session is gone
    #[error("Connection {0} is closed")]
    Closed(ConnectionId),

    /// An identity was already assigned to this handle
    #[error("Connection already has id {current}, refusing to assign {attempted}")]
    IdAlreadyAssigned {
        /// Identity the handle already carries
        current: ConnectionId,
        /// Identity the caller tried to assign
        attempted: ConnectionId,
    },

    /// The underlying engine failed
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ConnectionError {
    /// Returns the engine error behind this failure, if any
    #[must_use]
    pub const fn engine_error(&self) -> Option<&EngineError> {
        match self {
            Self::Engine(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        assert_eq!(
            EngineError::Open("no such host".to_string()).to_string(),
            "Open failed: no such host"
        );
        assert_eq!(
            EngineError::Ping("timeout".to_string()).to_string(),
            "Ping failed: timeout"
        );
    }

    #[test]
    fn test_connection_error_wraps_engine_error() {
        let err: ConnectionError = EngineError::Execute("syntax error".to_string()).into();
        assert_eq!(err.to_string(), "Execute failed: syntax error");
        assert_eq!(
            err.engine_error(),
            Some(&EngineError::Execute("syntax error".to_string()))
        );
        assert!(ConnectionError::Closed(ConnectionId::new(3)).engine_error().is_none());
    }

    #[test]
    fn test_id_already_assigned_display() {
        let err = ConnectionError::IdAlreadyAssigned {
            current: ConnectionId::new(1),
            attempted: ConnectionId::new(2),
        };
        assert_eq!(
            err.to_string(),
            "Connection already has id #1, refusing to assign #2"
        );
    }
}
