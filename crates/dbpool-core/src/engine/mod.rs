//! Engine abstractions consumed by connection handles.
//!
//! An [`Engine`] knows how to open sessions from an opaque connection spec. A
//! [`Session`] is one live handle to the engine and supports the narrow capability
//! set the pool needs: a liveness check, query execution and close. Query text
//! and result rows pass through untouched.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineResult;

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryEngine;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteEngine;

/// Database engine that opens sessions
pub trait Engine: Send + Sync + fmt::Debug {
    /// Name the engine is registered under
    fn name(&self) -> &str;

    /// Open a new session using the given connection spec
    fn open(&self, spec: &str) -> EngineResult<Box<dyn Session>>;
}

/// One live session against an engine
pub trait Session: Send + fmt::Debug {
    /// Verify the session is alive
    fn ping(&mut self) -> EngineResult<()>;

    /// Execute a query and collect its result rows
    fn execute(&mut self, query: &str) -> EngineResult<Rows>;

    /// Release the session
    fn close(&mut self) -> EngineResult<()>;
}

/// Result set returned by a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rows {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Rows {
    /// Create a result set from column names and row values
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// An empty result set with no columns
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Column names in result order
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows
    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the result set has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up a cell by row index and column name
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(index)
    }

    /// Iterate over rows
    pub fn iter(&self) -> std::slice::Iter<'_, Vec<Value>> {
        self.rows.iter()
    }
}

impl IntoIterator for Rows {
    type Item = Vec<Value>;
    type IntoIter = std::vec::IntoIter<Vec<Value>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// Registry mapping target names to engines
#[derive(Debug, Clone, Default)]
pub struct EngineRegistry {
    engines: HashMap<String, Arc<dyn Engine>>,
}

impl EngineRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            engines: HashMap::new(),
        }
    }

    /// Create a registry holding the engines bundled with this crate
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MemoryEngine::new()));
        #[cfg(feature = "sqlite")]
        registry.register(Arc::new(SqliteEngine::new()));
        registry
    }

    /// Register an engine under its own name, replacing any previous one
    pub fn register(&mut self, engine: Arc<dyn Engine>) {
        self.engines.insert(engine.name().to_string(), engine);
    }

    /// Get the engine registered for a target
    #[must_use]
    pub fn get(&self, target: &str) -> Option<Arc<dyn Engine>> {
        self.engines.get(target).cloned()
    }

    /// Check whether a target has an engine
    #[must_use]
    pub fn contains(&self, target: &str) -> bool {
        self.engines.contains_key(target)
    }

    /// Registered target names, sorted
    #[must_use]
    pub fn targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.engines.keys().cloned().collect();
        targets.sort();
        targets
    }
}
