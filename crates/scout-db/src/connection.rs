//! Database connection management.
//!
//! Provides a `DbPool` wrapper around the `SQLx` pool that creates the database
//! file on first use and enables write-ahead logging for file databases.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

const IN_MEMORY: &str = ":memory:";

/// `SQLite` connection pool.
#[derive(Debug, Clone)]
pub struct DbPool {
    pool: Pool<Sqlite>,
}

impl DbPool {
    /// Open a connection pool.
    ///
    /// # Arguments
    /// * `path` - Path to the `SQLite` database file (or `:memory:` for in-memory)
    ///
    /// # Errors
    /// Returns `DatabaseError` if:
    /// - The path is not valid UTF-8
    /// - The parent directory cannot be created
    /// - The database file cannot be opened
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_str().ok_or_else(|| {
            DatabaseError::Open("invalid database path: not valid UTF-8".to_string())
        })?;

        let in_memory = path_str == IN_MEMORY;
        let mut connect_options = SqliteConnectOptions::from_str(path_str)
            .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
            .create_if_missing(true);

        if !in_memory {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every in-memory connection is its own database
        let max_connections = if in_memory { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await
            .map_err(|e| DatabaseError::Open(format!("failed to initialize pool: {e}")))?;

        tracing::info!("Database pool created at {}", path_str);

        Ok(Self { pool })
    }

    /// Get a reference to the underlying `SQLx` pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the connection pool gracefully.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }

    /// Verify that the database answers queries.
    pub async fn verify(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
