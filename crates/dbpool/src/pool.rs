//! Bounded pool of reusable connection handles.
//!
//! Every structural operation (init, acquire, release, destroy) runs under one
//! exclusive lock. Handles are kept in creation order and never removed; the
//! indices of free handles sit in an ordered set, so an acquire always hands out
//! the lowest-ordered free handle. A handle with id `n` lives at index `n - 1`.
//!
//! The per-handle `used` flag mirrors the free set and is only written while the
//! pool lock is held. The free set is what the pool trusts.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dbpool_core::{Connection, ConnectionId, DbConnection, Engine, EngineRegistry};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::config::PoolConfig;
use crate::error::{CloseFailure, PoolError, PoolResult};
use crate::lifecycle::PoolState;

/// A handle checked out of the pool. The pool keeps its own clone.
pub type PooledConnection = Arc<DbConnection>;

/// Operations every connection pool provides
pub trait DbPool: Send + Sync + fmt::Debug {
    /// Store the target and connection spec, then eagerly create
    /// `initial_count` connections (a default when non-positive).
    ///
    /// Stops at the first creation failure. Connections created before the
    /// failure stay in the pool.
    fn init_pool(
        &self,
        target: &str,
        connection_spec: &str,
        initial_count: i64,
    ) -> PoolResult<()>;

    /// Hand out the first free connection, creating one if the pool is below
    /// capacity. Never waits.
    fn get_connection(&self) -> PoolResult<PooledConnection>;

    /// Return a connection to the pool. Returns `false` when the handle is
    /// absent or does not belong to this pool.
    fn release_connection(&self, connection: Option<&PooledConnection>) -> bool;

    /// Close every tracked connection and refuse further acquires.
    ///
    /// Calling it again retries the connections whose close failed.
    fn destroy_pool(&self) -> PoolResult<()>;
}

/// Pool statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Total connections created
    pub connections_created: u64,

    /// Connections closed during teardown
    pub connections_closed: u64,

    /// Failed attempts to open or verify a new connection
    pub creation_failures: u64,

    /// Successful acquires
    pub total_acquires: u64,

    /// Acquires served by an existing free connection
    pub reused_acquires: u64,

    /// Acquires refused because the pool was at capacity
    pub exhausted_acquires: u64,

    /// Timed acquires that gave up
    pub timed_out_acquires: u64,

    /// Successful releases
    pub total_releases: u64,

    /// Releases of absent or unknown handles
    pub rejected_releases: u64,

    /// Connections that failed to close during teardown
    pub close_failures: u64,

    /// Connections currently checked out
    pub in_use: u64,

    /// Connections currently free
    pub idle: u64,

    /// Highest number of connections checked out at once
    pub peak_in_use: u64,
}

#[derive(Debug)]
struct Target {
    name: String,
    connection_spec: String,
    engine: Arc<dyn Engine>,
}

#[derive(Debug, Default)]
struct PoolInner {
    state: PoolState,
    target: Option<Arc<Target>>,
    /// Every connection ever created, in creation order
    tracked: Vec<PooledConnection>,
    /// Indices into `tracked` of free connections
    free: BTreeSet<usize>,
    next_id: u64,
    stats: PoolStats,
}

impl PoolInner {
    fn in_use(&self) -> usize {
        if self.state.is_destroyed() {
            return 0;
        }
        self.tracked.len() - self.free.len()
    }

    /// Index of a tracked handle, matched by identity and by pointer so a
    /// handle from another pool with the same id is not accepted
    fn index_of(&self, connection: &PooledConnection) -> Option<usize> {
        let index = usize::try_from(connection.id().get()).ok()?.checked_sub(1)?;
        self.tracked
            .get(index)
            .filter(|tracked| Arc::ptr_eq(tracked, connection))
            .map(|_| index)
    }
}

/// Default pool implementation
#[derive(Debug)]
pub struct DefaultDbPool {
    /// Instance id recorded in log events
    id: Uuid,

    /// Pool configuration
    config: PoolConfig,

    /// Engines available as targets
    registry: EngineRegistry,

    /// All mutable pool state, behind the pool lock
    inner: Mutex<PoolInner>,

    /// Signalled when a connection is released or the pool is destroyed
    available: Condvar,
}

impl DefaultDbPool {
    /// Create a pool with the default configuration and bundled engines
    #[must_use]
    pub fn new() -> Self {
        Self::build(EngineRegistry::with_defaults(), PoolConfig::default())
    }

    /// Create a pool with the default configuration and a custom registry
    #[must_use]
    pub fn with_registry(registry: EngineRegistry) -> Self {
        Self::build(registry, PoolConfig::default())
    }

    /// Create a pool with an explicit configuration
    pub fn with_config(registry: EngineRegistry, config: PoolConfig) -> PoolResult<Self> {
        config.validate()?;
        Ok(Self::build(registry, config))
    }

    fn build(registry: EngineRegistry, config: PoolConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            registry,
            inner: Mutex::new(PoolInner::default()),
            available: Condvar::new(),
        }
    }

    /// Like [`DbPool::get_connection`], but waits up to `timeout` for a
    /// connection to be released when the pool is at capacity.
    ///
    /// A timeout too large to form a deadline (such as [`Duration::MAX`])
    /// waits without one.
    pub fn get_connection_timeout(&self, timeout: Duration) -> PoolResult<PooledConnection> {
        let deadline = Instant::now().checked_add(timeout);
        let mut inner = self.inner.lock();

        loop {
            if let Some(connection) = self.try_acquire(&mut inner)? {
                return Ok(connection);
            }
            let Some(deadline) = deadline else {
                self.available.wait(&mut inner);
                continue;
            };
            if self.available.wait_until(&mut inner, deadline).timed_out() {
                return match self.try_acquire(&mut inner)? {
                    Some(connection) => Ok(connection),
                    None => {
                        inner.stats.timed_out_acquires += 1;
                        debug!(pool = %self.id, ?timeout, "Timed out waiting for a connection");
                        Err(PoolError::Timeout(timeout))
                    }
                };
            }
        }
    }

    /// Release a checked-out connection
    pub fn release(&self, connection: &PooledConnection) -> bool {
        self.release_connection(Some(connection))
    }

    /// Pool instance id
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Pool configuration
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Target name stored by `init_pool`
    #[must_use]
    pub fn target(&self) -> Option<String> {
        self.inner.lock().target.as_ref().map(|t| t.name.clone())
    }

    /// Connection spec stored by `init_pool`
    #[must_use]
    pub fn connection_spec(&self) -> Option<String> {
        self.inner
            .lock()
            .target
            .as_ref()
            .map(|t| t.connection_spec.clone())
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> PoolState {
        self.inner.lock().state
    }

    /// Number of connections created so far
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.lock().tracked.len()
    }

    /// Check if the pool has created no connections
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().tracked.is_empty()
    }

    /// Number of free connections
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.inner.lock().free.len()
    }

    /// Number of checked-out connections
    #[must_use]
    pub fn in_use_count(&self) -> usize {
        self.inner.lock().in_use()
    }

    /// Snapshot of every tracked connection in creation order
    #[must_use]
    pub fn connections(&self) -> Vec<PooledConnection> {
        self.inner.lock().tracked.clone()
    }

    /// Get pool statistics
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock();
        let mut stats = inner.stats.clone();
        stats.in_use = inner.in_use() as u64;
        stats.idle = inner.free.len() as u64;
        stats
    }

    /// Take a free connection or create one. `Ok(None)` means the pool is at
    /// capacity with every connection checked out.
    fn try_acquire(&self, inner: &mut PoolInner) -> PoolResult<Option<PooledConnection>> {
        match inner.state {
            PoolState::Uninitialized => return Err(PoolError::NotInitialized),
            PoolState::Destroyed => return Err(PoolError::Destroyed),
            PoolState::Ready => {}
        }

        let picked = if let Some(index) = inner.free.pop_first() {
            Some((index, true))
        } else if inner.tracked.len() < self.config.max_connections {
            let index = self.create_connection(inner)?;
            inner.free.remove(&index);
            Some((index, false))
        } else {
            None
        };

        let Some((index, reused)) = picked else {
            return Ok(None);
        };

        let connection = inner.tracked[index].clone();
        connection.set_used(true);

        inner.stats.total_acquires += 1;
        if reused {
            inner.stats.reused_acquires += 1;
            trace!(pool = %self.id, connection = %connection.id(), "Reusing connection");
        }
        let in_use = inner.in_use() as u64;
        inner.stats.peak_in_use = inner.stats.peak_in_use.max(in_use);

        Ok(Some(connection))
    }

    /// Open, verify and track a new free connection. Returns its index.
    fn create_connection(&self, inner: &mut PoolInner) -> PoolResult<usize> {
        let target = inner.target.clone().ok_or(PoolError::NotInitialized)?;
        if inner.tracked.len() >= self.config.max_connections {
            return Err(PoolError::Exhausted {
                max: self.config.max_connections,
            });
        }

        let mut session = match target.engine.open(&target.connection_spec) {
            Ok(session) => session,
            Err(source) => {
                inner.stats.creation_failures += 1;
                warn!(pool = %self.id, engine = %target.name, "Failed to open connection: {}", source);
                return Err(PoolError::Open {
                    target: target.name.clone(),
                    source,
                });
            }
        };

        if let Err(source) = session.ping() {
            inner.stats.creation_failures += 1;
            warn!(pool = %self.id, engine = %target.name, "Connection failed liveness check: {}", source);
            if let Err(e) = session.close() {
                warn!(pool = %self.id, "Error closing dead session: {}", e);
            }
            return Err(PoolError::Liveness {
                target: target.name.clone(),
                source,
            });
        }

        let id = ConnectionId::new(inner.next_id + 1);
        let connection = Arc::new(DbConnection::new(session));
        connection.set_id(id)?;
        connection.set_used(false);
        inner.next_id += 1;

        let index = inner.tracked.len();
        inner.tracked.push(connection);
        inner.free.insert(index);
        inner.stats.connections_created += 1;

        debug!(pool = %self.id, connection = %id, engine = %target.name, "Created connection");
        Ok(index)
    }
}

impl Default for DefaultDbPool {
    fn default() -> Self {
        Self::new()
    }
}

impl DbPool for DefaultDbPool {
    fn init_pool(
        &self,
        target: &str,
        connection_spec: &str,
        initial_count: i64,
    ) -> PoolResult<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            PoolState::Ready => return Err(PoolError::AlreadyInitialized),
            PoolState::Destroyed => return Err(PoolError::Destroyed),
            PoolState::Uninitialized => {}
        }

        let engine = self
            .registry
            .get(target)
            .ok_or_else(|| PoolError::UnknownTarget(target.to_string()))?;

        inner.target = Some(Arc::new(Target {
            name: target.to_string(),
            connection_spec: connection_spec.to_string(),
            engine,
        }));
        inner.state = PoolState::Ready;

        let count = self.config.resolve_initial_count(initial_count);
        for _ in 0..count {
            self.create_connection(&mut inner)?;
        }

        debug!(pool = %self.id, engine = %target, count, "Initialized pool");
        Ok(())
    }

    fn get_connection(&self) -> PoolResult<PooledConnection> {
        let mut inner = self.inner.lock();
        match self.try_acquire(&mut inner)? {
            Some(connection) => Ok(connection),
            None => {
                inner.stats.exhausted_acquires += 1;
                debug!(pool = %self.id, "Pool exhausted");
                Err(PoolError::Exhausted {
                    max: self.config.max_connections,
                })
            }
        }
    }

    fn release_connection(&self, connection: Option<&PooledConnection>) -> bool {
        let Some(connection) = connection else {
            self.inner.lock().stats.rejected_releases += 1;
            return false;
        };

        let mut inner = self.inner.lock();
        let index = if inner.state.is_ready() {
            inner.index_of(connection)
        } else {
            None
        };
        let Some(index) = index else {
            inner.stats.rejected_releases += 1;
            debug!(pool = %self.id, connection = %connection.id(), "Rejected release of unknown connection");
            return false;
        };

        connection.set_used(false);
        inner.free.insert(index);
        inner.stats.total_releases += 1;
        trace!(pool = %self.id, connection = %connection.id(), "Released connection");
        drop(inner);

        self.available.notify_one();
        true
    }

    fn destroy_pool(&self) -> PoolResult<()> {
        let mut inner = self.inner.lock();
        if !inner.state.is_destroyed() {
            inner.state = PoolState::Destroyed;
            inner.free.clear();
            for connection in &inner.tracked {
                connection.retire();
            }
        }

        let mut closed = 0u64;
        let mut failures = Vec::new();
        for connection in inner.tracked.iter().filter(|c| !c.is_closed()) {
            match connection.close() {
                Ok(()) => closed += 1,
                Err(error) => {
                    warn!(pool = %self.id, connection = %connection.id(), "Error closing connection: {}", error);
                    failures.push(CloseFailure {
                        id: connection.id(),
                        error,
                    });
                }
            }
        }

        inner.stats.connections_closed += closed;
        inner.stats.close_failures += failures.len() as u64;
        drop(inner);

        self.available.notify_all();
        debug!(pool = %self.id, closed, failed = failures.len(), "Destroyed pool");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PoolError::Teardown(failures))
        }
    }
}
