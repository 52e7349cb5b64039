//! # dbpool core
//!
//! Building blocks for the `dbpool` session pool: the connection handle, the
//! engine capability it delegates to, and the error types shared by both.
//!
//! ## Architecture
//!
//! ```text
//! dbpool-core/
//! ├── connection/     # Connection trait and the DbConnection handle
//! ├── engine/         # Engine and Session traits, row sets, registry
//! │   ├── memory      # In-process engine with fault injection
//! │   └── sqlite      # rusqlite-backed engine (feature "sqlite")
//! └── error/          # Engine and connection errors
//! ```
//!
//! ## Usage
//!
//! This crate is re-exported by `dbpool`; depend on it directly only when
//! implementing a new [`Engine`].

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
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_panics_doc
)]

pub mod connection;
pub mod engine;
pub mod error;

pub use connection::{Connection, ConnectionId, DbConnection};
pub use engine::{Engine, EngineRegistry, MemoryEngine, Rows, Session};
#[cfg(feature = "sqlite")]
pub use engine::SqliteEngine;
pub use error::{ConnectionError, ConnectionResult, EngineError, EngineResult};
