//! Connection handles wrapping one engine session.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::engine::{Rows, Session};
use crate::error::{ConnectionError, ConnectionResult};

/// Identity of a connection handle, unique for the lifetime of its pool
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Identity reported by a handle that has not been assigned one yet
    pub const UNASSIGNED: Self = Self(0);

    /// Wrap a raw identity
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw identity value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Whether this is a real (positive) identity
    #[must_use]
    pub const fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Capability set of a pooled database connection
pub trait Connection: Send + Sync + fmt::Debug {
    /// Identity of this connection
    fn id(&self) -> ConnectionId;

    /// Assign the identity; only the first assignment succeeds
    fn set_id(&self, id: ConnectionId) -> ConnectionResult<()>;

    /// Whether the connection is checked out
    fn is_used(&self) -> bool;

    /// Set the checked-out flag
    fn set_used(&self, used: bool);

    /// Close the underlying session
    fn close(&self) -> ConnectionResult<()>;

    /// Whether the session has been closed
    fn is_closed(&self) -> bool;

    /// Run a statement, discarding any rows
    fn create(&self, query: &str) -> ConnectionResult<()>;

    /// Run a query and return its rows
    fn read(&self, query: &str) -> ConnectionResult<Rows>;

    /// Run a statement, discarding any rows
    fn update(&self, query: &str) -> ConnectionResult<()>;

    /// Run a statement, discarding any rows
    fn delete(&self, query: &str) -> ConnectionResult<()>;
}

/// Connection handle owning one engine session
pub struct DbConnection {
    id: OnceCell<ConnectionId>,
    session: Mutex<Box<dyn Session>>,
    used: AtomicBool,
    closed: AtomicBool,
    retired: AtomicBool,
    created_at: Instant,
}

impl DbConnection {
    /// Wrap a freshly opened session. The handle starts free and unassigned.
    #[must_use]
    pub fn new(session: Box<dyn Session>) -> Self {
        Self {
            id: OnceCell::new(),
            session: Mutex::new(session),
            used: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            retired: AtomicBool::new(false),
            created_at: Instant::now(),
        }
    }

    /// When the handle was created
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time since the handle was created
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Refuse every further passthrough, whether or not the session closes.
    ///
    /// Set by pool teardown before it closes the session, so a handle whose
    /// close fails still stops reaching the engine.
    pub fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    /// Whether the handle refuses passthroughs
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    fn execute(&self, query: &str) -> ConnectionResult<Rows> {
        // Checked under the session lock so a concurrent close is observed
        let mut session = self.session.lock();
        if self.is_closed() || self.is_retired() {
            return Err(ConnectionError::Closed(self.id()));
        }
        let rows = session.execute(query)?;
        Ok(rows)
    }
}

impl Connection for DbConnection {
    fn id(&self) -> ConnectionId {
        self.id.get().copied().unwrap_or(ConnectionId::UNASSIGNED)
    }

    fn set_id(&self, id: ConnectionId) -> ConnectionResult<()> {
        self.id
            .set(id)
            .map_err(|attempted| ConnectionError::IdAlreadyAssigned {
                current: self.id(),
                attempted,
            })
    }

    fn is_used(&self) -> bool {
        self.used.load(Ordering::Acquire)
    }

    fn set_used(&self, used: bool) {
        self.used.store(used, Ordering::Release);
    }

    fn close(&self) -> ConnectionResult<()> {
        let mut session = self.session.lock();
        session.close()?;
        self.closed.store(true, Ordering::Release);
        trace!("Closed connection {}", self.id());
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn create(&self, query: &str) -> ConnectionResult<()> {
        self.execute(query).map(drop)
    }

    fn read(&self, query: &str) -> ConnectionResult<Rows> {
        self.execute(query)
    }

    fn update(&self, query: &str) -> ConnectionResult<()> {
        self.execute(query).map(drop)
    }

    fn delete(&self, query: &str) -> ConnectionResult<()> {
        self.execute(query).map(drop)
    }
}

impl fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConnection")
            .field("id", &self.id())
            .field("used", &self.is_used())
            .field("closed", &self.is_closed())
            .field("retired", &self.is_retired())
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
