//! # dbpool
//!
//! A bounded pool of reusable database session handles shared by concurrent
//! callers. The pool opens sessions through a registered [`Engine`], verifies
//! each one once, and hands the handles out first-fit until its capacity is
//! reached.
//!
//! ## Features
//!
//! - **Bounded** - never more than [`MAX_CONNECTIONS`] handles by default
//! - **Non-blocking acquire** - exhaustion is reported immediately as
//!   [`PoolError::Exhausted`], distinct from creation failures
//! - **Timed acquire** - [`DefaultDbPool::get_connection_timeout`] waits for a release
//! - **Explicit teardown** - [`DbPool::destroy_pool`] reports every close failure
//!
//! ## Example
//!
//! ```
//! use dbpool::{Connection, DbPool, DefaultDbPool};
//!
//! let pool = DefaultDbPool::new();
//! pool.init_pool("memory", "mem://example", 0).unwrap();
//! assert_eq!(pool.size(), 5);
//!
//! let conn = pool.get_connection().unwrap();
//! let rows = conn.read("SELECT 1").unwrap();
//! assert_eq!(rows.len(), 1);
//! assert!(pool.release_connection(Some(&conn)));
//!
//! pool.destroy_pool().unwrap();
//! assert!(pool.get_connection().is_err());
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod pool;

pub use config::{PoolConfig, PoolConfigBuilder};
pub use error::{CloseFailure, PoolError, PoolResult};
pub use lifecycle::PoolState;
pub use pool::{DbPool, DefaultDbPool, PoolStats, PooledConnection};

pub use dbpool_core::engine::memory::MEMORY_ENGINE;
#[cfg(feature = "sqlite")]
pub use dbpool_core::engine::sqlite::SQLITE_ENGINE;
pub use dbpool_core::{
    Connection, ConnectionError, ConnectionId, DbConnection, Engine, EngineError, EngineRegistry,
    MemoryEngine, Rows, Session,
};
#[cfg(feature = "sqlite")]
pub use dbpool_core::SqliteEngine;

/// Maximum number of connections a pool creates by default
pub const MAX_CONNECTIONS: usize = 100;

/// Eager pool size used when `init_pool` is given a non-positive count
pub const DEFAULT_INITIAL_CONNECTIONS: usize = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_constants() {
        const _: () = assert!(
            DEFAULT_INITIAL_CONNECTIONS <= MAX_CONNECTIONS,
            "default eager size must fit in the pool"
        );
        const _: () = assert!(MAX_CONNECTIONS == 100, "MAX_CONNECTIONS must be 100");
    }
}
