//! Custom engines plugged into connection handles

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dbpool_core::*;
use pretty_assertions::assert_eq;
use serde_json::json;

/// Engine answering every query with a fixed row count
#[derive(Debug, Default)]
struct CountingEngine {
    queries: Arc<AtomicUsize>,
}

#[derive(Debug)]
struct CountingSession {
    queries: Arc<AtomicUsize>,
}

impl Engine for CountingEngine {
    fn name(&self) -> &str {
        "counting"
    }

    fn open(&self, spec: &str) -> EngineResult<Box<dyn Session>> {
        if spec.starts_with("bad:") {
            return Err(EngineError::Open(spec.to_string()));
        }
        Ok(Box::new(CountingSession {
            queries: self.queries.clone(),
        }))
    }
}

impl Session for CountingSession {
    fn ping(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn execute(&mut self, query: &str) -> EngineResult<Rows> {
        let n = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Rows::new(
            vec!["n".to_string(), "len".to_string()],
            vec![vec![json!(n), json!(query.len())]],
        ))
    }

    fn close(&mut self) -> EngineResult<()> {
        Err(EngineError::Unsupported("counting sessions stay open".to_string()))
    }
}

#[test]
fn test_custom_engine_in_registry() {
    let mut registry = EngineRegistry::new();
    registry.register(Arc::new(CountingEngine::default()));

    let engine = registry.get("counting").expect("engine should be registered");
    assert!(engine.open("bad:host").is_err());

    let conn = DbConnection::new(engine.open("good").unwrap());
    conn.set_id(ConnectionId::new(1)).unwrap();

    let rows = conn.read("SELECT 42").unwrap();
    assert_eq!(rows.get(0, "n"), Some(&json!(1)));
    assert_eq!(rows.get(0, "len"), Some(&json!(9)));
    conn.update("UPDATE x").unwrap();
    assert_eq!(conn.read("q").unwrap().get(0, "n"), Some(&json!(3)));
}

#[test]
fn test_close_errors_come_from_engine() {
    let engine = CountingEngine::default();
    let conn = DbConnection::new(engine.open("good").unwrap());

    let err = conn.close().unwrap_err();
    assert_eq!(
        err,
        ConnectionError::Engine(EngineError::Unsupported(
            "counting sessions stay open".to_string()
        ))
    );
    assert!(!conn.is_closed());
}

#[test]
fn test_connection_as_trait_object() {
    let engine = MemoryEngine::new();
    let conn: Box<dyn Connection> = Box::new(DbConnection::new(engine.open("").unwrap()));

    conn.set_id(ConnectionId::new(5)).unwrap();
    conn.set_used(true);
    assert_eq!(conn.id(), ConnectionId::new(5));
    assert!(conn.is_used());

    conn.close().unwrap();
    assert!(conn.is_closed());
    assert_eq!(engine.closed(), 1);
}

#[test]
fn test_shared_handle_across_threads() {
    let engine = MemoryEngine::new();
    let conn = Arc::new(DbConnection::new(engine.open("").unwrap()));

    std::thread::scope(|s| {
        for i in 0..4 {
            let conn = Arc::clone(&conn);
            s.spawn(move || conn.read(&format!("SELECT {i}")).unwrap());
        }
    });

    assert_eq!(engine.executed().len(), 4);
}
