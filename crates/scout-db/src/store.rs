//! [`WorldStore`] backed by the `SQLite` tables.

use crate::connection::DbPool;
use crate::{sightings, waypoints, zones};
use async_trait::async_trait;
use scout_core::{WorldSnapshot, WorldStore};

/// Default rows per upsert transaction.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Persists scanned world state with idempotent upserts.
#[derive(Debug, Clone)]
pub struct SqliteWorldStore {
    pool: DbPool,
    batch_size: usize,
}

impl SqliteWorldStore {
    /// Create a store writing through `pool`.
    #[must_use]
    pub fn new(pool: DbPool, batch_size: usize) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl WorldStore for SqliteWorldStore {
    async fn store(&self, snapshot: &WorldSnapshot) -> scout_core::Result<()> {
        if snapshot.is_empty() {
            return Ok(());
        }
        let pool = self.pool.pool();
        sightings::upsert_sightings(pool, &snapshot.sightings, self.batch_size).await?;
        waypoints::upsert_waypoints(pool, &snapshot.waypoints, self.batch_size).await?;
        zones::upsert_zones(pool, &snapshot.zones, self.batch_size).await?;
        tracing::debug!(
            sightings = snapshot.sightings.len(),
            waypoints = snapshot.waypoints.len(),
            zones = snapshot.zones.len(),
            "Upserted world state"
        );
        Ok(())
    }
}
