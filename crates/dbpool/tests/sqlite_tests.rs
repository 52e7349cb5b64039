//! Pool tests against a real SQLite database
#![cfg(feature = "sqlite")]

use std::thread;
use std::time::Duration;

use dbpool::*;
use serde_json::json;
use tempfile::TempDir;

fn database() -> (TempDir, String) {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let path = dir.path().join("pool.db").to_string_lossy().into_owned();
    (dir, path)
}

#[test]
fn test_sqlite_pool_shares_one_database() {
    let (_dir, path) = database();
    let pool = DefaultDbPool::new();
    pool.init_pool(SQLITE_ENGINE, &path, 2).unwrap();

    let writer = pool.get_connection().unwrap();
    let reader = pool.get_connection().unwrap();
    assert_ne!(writer.id(), reader.id());

    writer
        .create("CREATE TABLE accounts (id INTEGER PRIMARY KEY, owner TEXT NOT NULL)")
        .unwrap();
    writer
        .update("INSERT INTO accounts (owner) VALUES ('ada'), ('grace')")
        .unwrap();
    writer.delete("DELETE FROM accounts WHERE owner = 'grace'").unwrap();

    let rows = reader.read("SELECT id, owner FROM accounts").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.get(0, "owner"), Some(&json!("ada")));

    assert!(pool.release(&writer));
    assert!(pool.release(&reader));
    pool.destroy_pool().unwrap();
    assert!(pool.connections().iter().all(|c| c.is_closed()));
}

#[test]
fn test_sqlite_bad_spec_fails_init() {
    let pool = DefaultDbPool::new();
    let err = pool
        .init_pool(SQLITE_ENGINE, "/no/such/directory/pool.db", 1)
        .unwrap_err();

    assert!(matches!(err, PoolError::Open { .. }));
    assert_eq!(pool.size(), 0);
}

#[test]
fn test_sqlite_query_errors_pass_through() {
    let pool = DefaultDbPool::new();
    pool.init_pool(SQLITE_ENGINE, ":memory:", 1).unwrap();

    let conn = pool.get_connection().unwrap();
    let err = conn.read("SELECT * FROM missing_table").unwrap_err();
    assert!(matches!(
        err,
        ConnectionError::Engine(EngineError::Execute(_))
    ));
    assert!(pool.release(&conn));
}

#[test]
fn test_sqlite_concurrent_workers() {
    let (_dir, path) = database();
    let pool = DefaultDbPool::new();
    pool.init_pool(SQLITE_ENGINE, &path, 4).unwrap();

    {
        let conn = pool.get_connection().unwrap();
        conn.create("CREATE TABLE hits (worker INTEGER)").unwrap();
        conn.update("PRAGMA busy_timeout = 5000").unwrap();
        assert!(pool.release(&conn));
    }

    thread::scope(|s| {
        for worker in 0..4 {
            let pool = &pool;
            s.spawn(move || {
                let conn = pool.get_connection_timeout(Duration::from_secs(5)).unwrap();
                conn.update("PRAGMA busy_timeout = 5000").unwrap();
                conn.update(&format!("INSERT INTO hits (worker) VALUES ({worker})"))
                    .unwrap();
                assert!(pool.release(&conn));
            });
        }
    });

    let conn = pool.get_connection().unwrap();
    let rows = conn.read("SELECT COUNT(*) AS n FROM hits").unwrap();
    assert_eq!(rows.get(0, "n"), Some(&json!(4)));
}
