//! # irrigo-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the storage port traits defined in `irrigo-app::ports::storage`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `irrigo-app` (for port traits) and `irrigo-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod error;
mod history_repo;
pub mod pool;
mod room_repo;
mod settings_repo;

pub use error::StorageError;
pub use pool::{Config, Database};

use sqlx::SqlitePool;

/// `SQLite`-backed implementation of every storage port the engine needs.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new storage using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Timestamps are stored as fixed-width RFC 3339 strings so that text
/// comparison in SQL orders them chronologically.
fn encode_timestamp(at: irrigo_domain::time::Timestamp) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn decode_timestamp(value: &str) -> Result<irrigo_domain::time::Timestamp, sqlx::Error> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|at| at.to_utc())
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

#[cfg(test)]
pub(crate) async fn memory_storage() -> SqliteStorage {
    let db = Config::in_memory().build().await.unwrap();
    SqliteStorage::new(db.pool().clone())
}
