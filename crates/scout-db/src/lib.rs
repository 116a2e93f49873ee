//! Scout Database Layer
//!
//! Provides `SQLite` persistence for scanned world state using `SQLx` with
//! embedded migrations.
//!
//! # Architecture
//!
//! - **Migrations**: SQL migrations are embedded and versioned using `SQLx`
//! - **Upserts**: every table is keyed by its natural id, so storing the same
//!   snapshot twice leaves one row per entity
//! - **Batching**: rows are written in transactions of at most `batch_size` rows
//!
//! # Example
//!
//! ```ignore
//! use scout_db::Database;
//!
//! let db = Database::new("scout.db").await?;
//! db.run_migrations().await?;
//! let store = db.world_store(100);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod error;
pub mod migrations;
pub mod sightings;
pub mod store;
pub mod waypoints;
pub mod zones;

// Re-export commonly used types
pub use connection::DbPool;
pub use error::{DatabaseError, Result};
pub use store::{SqliteWorldStore, DEFAULT_BATCH_SIZE};

use std::path::Path;

/// Row counts of the world-state tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorldCounts {
    /// Rows in `sightings`
    pub sightings: i64,
    /// Rows in `waypoints`
    pub waypoints: i64,
    /// Rows in `zones`
    pub zones: i64,
}

/// High-level database interface with migrations.
#[derive(Debug)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open the database at `path` (or `:memory:` for in-memory).
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = DbPool::new(path).await?;
        Ok(Self { pool })
    }

    /// Run all pending database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(self.pool.pool()).await
    }

    /// Get the current schema version.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(self.pool.pool()).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Sqlite> {
        self.pool.pool()
    }

    /// A [`scout_core::WorldStore`] writing into this database.
    #[must_use]
    pub fn world_store(&self, batch_size: usize) -> SqliteWorldStore {
        SqliteWorldStore::new(self.pool.clone(), batch_size)
    }

    /// Count the rows of every world-state table.
    pub async fn counts(&self) -> Result<WorldCounts> {
        let (sightings, waypoints, zones) = sqlx::query_as::<_, (i64, i64, i64)>(
            r"SELECT (SELECT COUNT(*) FROM sightings),
                     (SELECT COUNT(*) FROM waypoints),
                     (SELECT COUNT(*) FROM zones)",
        )
        .fetch_one(self.pool.pool())
        .await?;
        Ok(WorldCounts {
            sightings,
            waypoints,
            zones,
        })
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
