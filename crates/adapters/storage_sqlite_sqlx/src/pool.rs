//! Connection pool for the irrigo `SQLite` store.
//!
//! File databases run in WAL mode so history writes do not block status
//! reads. An in-memory database lives only as long as one of its
//! connections, so its pool keeps exactly one connection open forever.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::error::StorageError;

const MEMORY_URL: &str = "sqlite::memory:";

/// Where the store lives and how many connections it may use.
#[derive(Debug, Clone)]
pub struct Config {
    /// `sqlite:` URL, e.g. `sqlite:irrigo.db?mode=rwc` or `sqlite::memory:`.
    pub database_url: String,
    /// Pool size for file databases.
    pub max_connections: u32,
    /// How long a statement waits on a locked database.
    pub busy_timeout: Duration,
}

impl Config {
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// A private database that disappears with the pool.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MEMORY_URL)
    }

    fn is_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }

    /// Open the pool and bring the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the URL is malformed, the database
    /// cannot be opened, or a migration fails.
    pub async fn build(self) -> Result<Database, StorageError> {
        let connect = SqliteConnectOptions::from_str(&self.database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout);

        let pool = if self.is_memory() {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(connect)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(self.max_connections.max(1))
                .connect_with(connect.journal_mode(SqliteJournalMode::Wal))
                .await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Database { pool })
    }
}

/// An open, migrated store.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
