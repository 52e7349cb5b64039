//! Pool lifecycle states

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pool states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    /// Created, `init_pool` not called yet
    #[default]
    Uninitialized,
    /// Configured and handing out connections
    Ready,
    /// Torn down; connections are closed
    Destroyed,
}

impl PoolState {
    /// Whether the pool hands out connections
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Whether the pool has been torn down
    #[must_use]
    pub const fn is_destroyed(self) -> bool {
        matches!(self, Self::Destroyed)
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Ready => write!(f, "ready"),
            Self::Destroyed => write!(f, "destroyed"),
        }
    }
}
