//! SQLite engine backed by `rusqlite`.
//!
//! The connection spec is a database path; `:memory:` opens a private in-memory
//! database per session.

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;

use super::{Engine, Rows, Session};
use crate::error::{EngineError, EngineResult};

/// Name the SQLite engine registers under
pub const SQLITE_ENGINE: &str = "sqlite";

/// Engine opening SQLite databases
#[derive(Debug, Clone, Default)]
pub struct SqliteEngine {
    flags: OpenFlags,
}

impl SqliteEngine {
    /// Create an engine using the default open flags (read/write, create)
    #[must_use]
    pub fn new() -> Self {
        Self {
            flags: OpenFlags::default(),
        }
    }

    /// Create an engine with explicit open flags
    #[must_use]
    pub const fn with_flags(flags: OpenFlags) -> Self {
        Self { flags }
    }
}

impl Engine for SqliteEngine {
    fn name(&self) -> &str {
        SQLITE_ENGINE
    }

    fn open(&self, spec: &str) -> EngineResult<Box<dyn Session>> {
        if spec.is_empty() {
            return Err(EngineError::Open("empty connection spec".to_string()));
        }

        let conn = if spec == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open_with_flags(spec, self.flags)
        }
        .map_err(|e| EngineError::Open(format!("{spec}: {e}")))?;

        Ok(Box::new(SqliteSession { conn: Some(conn) }))
    }
}

#[derive(Debug)]
struct SqliteSession {
    /// `None` once closed
    conn: Option<Connection>,
}

impl SqliteSession {
    fn conn(&self) -> Result<&Connection, String> {
        self.conn.as_ref().ok_or_else(|| "session closed".to_string())
    }
}

impl Session for SqliteSession {
    fn ping(&mut self) -> EngineResult<()> {
        let conn = self.conn().map_err(EngineError::Ping)?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| EngineError::Ping(e.to_string()))
    }

    fn execute(&mut self, query: &str) -> EngineResult<Rows> {
        let conn = self.conn().map_err(EngineError::Execute)?;
        let execute_error = |e: rusqlite::Error| EngineError::Execute(e.to_string());

        let mut stmt = conn.prepare(query).map_err(execute_error)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let width = columns.len();

        let mut collected = Vec::new();
        let mut rows = stmt.query([]).map_err(execute_error)?;
        while let Some(row) = rows.next().map_err(execute_error)? {
            let mut values = Vec::with_capacity(width);
            for index in 0..width {
                values.push(to_json(row.get_ref(index).map_err(execute_error)?));
            }
            collected.push(values);
        }

        Ok(Rows::new(columns, collected))
    }

    fn close(&mut self) -> EngineResult<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        conn.close().map_err(|(conn, e)| {
            self.conn = Some(conn);
            EngineError::Close(e.to_string())
        })
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::from(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_open_in_memory_and_ping() {
        let engine = SqliteEngine::new();
        let mut session = engine.open(":memory:").unwrap();
        assert!(session.ping().is_ok());
    }

    #[test]
    fn test_empty_spec_is_rejected() {
        let engine = SqliteEngine::new();
        assert!(matches!(engine.open(""), Err(EngineError::Open(_))));
    }

    #[test]
    fn test_unreachable_path_fails_open() {
        let engine = SqliteEngine::new();
        let result = engine.open("/definitely/not/a/real/dir/pool.db");
        assert!(matches!(result, Err(EngineError::Open(_))));
    }

    #[test]
    fn test_execute_returns_rows() {
        let engine = SqliteEngine::new();
        let mut session = engine.open(":memory:").unwrap();

        session
            .execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, score REAL)")
            .unwrap();
        session
            .execute("INSERT INTO users (name, score) VALUES ('ada', 1.5), ('grace', NULL)")
            .unwrap();

        let rows = session
            .execute("SELECT id, name, score FROM users ORDER BY id")
            .unwrap();
        assert_eq!(rows.columns(), ["id", "name", "score"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.get(0, "name"), Some(&json!("ada")));
        assert_eq!(rows.get(0, "score"), Some(&json!(1.5)));
        assert_eq!(rows.get(1, "score"), Some(&Value::Null));
    }

    #[test]
    fn test_bad_query_fails_execute() {
        let engine = SqliteEngine::new();
        let mut session = engine.open(":memory:").unwrap();
        assert!(matches!(
            session.execute("SELEKT nothing"),
            Err(EngineError::Execute(_))
        ));
    }

    #[test]
    fn test_close_twice() {
        let engine = SqliteEngine::new();
        let mut session = engine.open(":memory:").unwrap();

        assert!(session.close().is_ok());
        assert!(session.close().is_ok());
        assert!(matches!(session.ping(), Err(EngineError::Ping(_))));
        assert!(matches!(session.execute("SELECT 1"), Err(EngineError::Execute(_))));
    }
}
