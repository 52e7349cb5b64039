//! In-process engine with fault injection.
//!
//! Sessions never touch a real database: every query returns a single row echoing
//! the session number and the query text. Clones of a [`MemoryEngine`] share
//! their state, so a caller can keep one clone to flip failure switches and read
//! counters while another clone sits in an [`EngineRegistry`](super::EngineRegistry).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde_json::json;

use super::{Engine, Rows, Session};
use crate::error::{EngineError, EngineResult};

/// Name the memory engine registers under by default
pub const MEMORY_ENGINE: &str = "memory";

#[derive(Debug)]
struct MemoryState {
    fail_open: AtomicBool,
    fail_ping: AtomicBool,
    fail_execute: AtomicBool,
    fail_close: AtomicBool,
    /// Total opens allowed before `open` starts failing
    open_limit: AtomicUsize,
    opened: AtomicUsize,
    pinged: AtomicUsize,
    closed: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            fail_open: AtomicBool::new(false),
            fail_ping: AtomicBool::new(false),
            fail_execute: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            open_limit: AtomicUsize::new(usize::MAX),
            opened: AtomicUsize::new(0),
            pinged: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
        }
    }
}

/// Engine keeping everything in memory
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    name: String,
    state: Arc<MemoryState>,
}

impl MemoryEngine {
    /// Create an engine registered as `"memory"`
    #[must_use]
    pub fn new() -> Self {
        Self::with_name(MEMORY_ENGINE)
    }

    /// Create an engine registered under a custom name
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(MemoryState::default()),
        }
    }

    /// Make every subsequent `open` fail
    pub fn fail_open(&self, fail: bool) {
        self.state.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `ping` fail
    pub fn fail_ping(&self, fail: bool) {
        self.state.fail_ping.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `execute` fail
    pub fn fail_execute(&self, fail: bool) {
        self.state.fail_execute.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `close` fail
    pub fn fail_close(&self, fail: bool) {
        self.state.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Allow at most `limit` successful opens over the engine's lifetime
    pub fn limit_opens(&self, limit: usize) {
        self.state.open_limit.store(limit, Ordering::SeqCst);
    }

    /// Number of sessions opened successfully
    #[must_use]
    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    /// Number of successful pings
    #[must_use]
    pub fn pinged(&self) -> usize {
        self.state.pinged.load(Ordering::SeqCst)
    }

    /// Number of sessions closed successfully
    #[must_use]
    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Sessions opened and not yet closed
    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.opened().saturating_sub(self.closed())
    }

    /// Every query executed so far, in order
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.state.executed.lock().clone()
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for MemoryEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, spec: &str) -> EngineResult<Box<dyn Session>> {
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(EngineError::Open(format!("memory engine refused {spec:?}")));
        }

        let limit = self.state.open_limit.load(Ordering::SeqCst);
        let number = self
            .state
            .opened
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |opened| {
                (opened < limit).then_some(opened + 1)
            })
            .map_err(|_| EngineError::Open(format!("open limit of {limit} reached")))?
            + 1;

        Ok(Box::new(MemorySession {
            number,
            state: self.state.clone(),
            closed: false,
        }))
    }
}

#[derive(Debug)]
struct MemorySession {
    number: usize,
    state: Arc<MemoryState>,
    closed: bool,
}

impl Session for MemorySession {
    fn ping(&mut self) -> EngineResult<()> {
        if self.closed {
            return Err(EngineError::Ping("session closed".to_string()));
        }
        if self.state.fail_ping.load(Ordering::SeqCst) {
            return Err(EngineError::Ping(format!(
                "session {} did not answer",
                self.number
            )));
        }
        self.state.pinged.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn execute(&mut self, query: &str) -> EngineResult<Rows> {
        if self.closed {
            return Err(EngineError::Execute("session closed".to_string()));
        }
        if self.state.fail_execute.load(Ordering::SeqCst) {
            return Err(EngineError::Execute(format!("rejected {query:?}")));
        }
        self.state.executed.lock().push(query.to_string());
        Ok(Rows::new(
            vec!["session".to_string(), "query".to_string()],
            vec![vec![json!(self.number), json!(query)]],
        ))
    }

    fn close(&mut self) -> EngineResult<()> {
        if self.closed {
            return Ok(());
        }
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(EngineError::Close(format!(
                "session {} refused to close",
                self.number
            )));
        }
        self.closed = true;
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_execute() {
        let engine = MemoryEngine::new();
        let mut session = engine.open("mem://test").unwrap();

        assert!(session.ping().is_ok());
        let rows = session.execute("SELECT 1").unwrap();
        assert_eq!(rows.get(0, "session"), Some(&json!(1)));
        assert_eq!(rows.get(0, "query"), Some(&json!("SELECT 1")));
        assert_eq!(engine.executed(), vec!["SELECT 1".to_string()]);
        assert_eq!(engine.opened(), 1);
        assert_eq!(engine.pinged(), 1);
    }

    #[test]
    fn test_fault_injection() {
        let engine = MemoryEngine::new();
        engine.fail_open(true);
        assert!(matches!(engine.open(""), Err(EngineError::Open(_))));
        engine.fail_open(false);

        let mut session = engine.open("").unwrap();
        engine.fail_ping(true);
        assert!(matches!(session.ping(), Err(EngineError::Ping(_))));

        engine.fail_execute(true);
        assert!(matches!(session.execute("x"), Err(EngineError::Execute(_))));

        engine.fail_close(true);
        assert!(matches!(session.close(), Err(EngineError::Close(_))));
        assert_eq!(engine.live_sessions(), 1);
    }

    #[test]
    fn test_open_limit() {
        let engine = MemoryEngine::new();
        engine.limit_opens(2);

        assert!(engine.open("").is_ok());
        assert!(engine.open("").is_ok());
        assert!(matches!(engine.open(""), Err(EngineError::Open(_))));
        assert_eq!(engine.opened(), 2);
    }

    #[test]
    fn test_close_is_idempotent() {
        let engine = MemoryEngine::new();
        let mut session = engine.open("").unwrap();

        assert!(session.close().is_ok());
        assert!(session.close().is_ok());
        assert_eq!(engine.closed(), 1);
        assert_eq!(engine.live_sessions(), 0);
        assert!(session.execute("SELECT 1").is_err());
    }

    #[test]
    fn test_clones_share_state() {
        let engine = MemoryEngine::with_name("shared");
        let observer = engine.clone();

        let _session = engine.open("").unwrap();
        assert_eq!(observer.opened(), 1);
        assert_eq!(observer.name(), "shared");
    }
}
