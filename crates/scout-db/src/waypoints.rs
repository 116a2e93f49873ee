//! Waypoints table operations.

use crate::error::Result;
use scout_core::Waypoint;
use sqlx::{Pool, QueryBuilder, Sqlite};

/// Insert or update waypoints in chunks of at most `batch_size` rows.
///
/// Each chunk is written in its own transaction.
pub async fn upsert_waypoints(
    pool: &Pool<Sqlite>,
    waypoints: &[Waypoint],
    batch_size: usize,
) -> Result<()> {
    for chunk in waypoints.chunks(batch_size.max(1)) {
        let mut tx = pool.begin().await?;
        let mut query = QueryBuilder::<Sqlite>::new(
            "INSERT INTO waypoints (waypoint_id, latitude, longitude, enabled, last_modified_ms, bonus_expires_ms) ",
        );
        query.push_values(chunk, |mut row, waypoint| {
            row.push_bind(waypoint.waypoint_id.clone())
                .push_bind(waypoint.latitude)
                .push_bind(waypoint.longitude)
                .push_bind(waypoint.enabled)
                .push_bind(waypoint.last_modified_ms)
                .push_bind(waypoint.bonus_expires_ms);
        });
        query.push(
            " ON CONFLICT(waypoint_id) DO UPDATE SET
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                enabled = excluded.enabled,
                last_modified_ms = excluded.last_modified_ms,
                bonus_expires_ms = excluded.bonus_expires_ms",
        );
        query.build().execute(&mut *tx).await?;
        tx.commit().await?;
    }
    Ok(())
}

/// All known waypoints, ordered by id.
pub async fn all_waypoints(pool: &Pool<Sqlite>) -> Result<Vec<Waypoint>> {
    let rows = sqlx::query_as::<_, (String, f64, f64, bool, i64, Option<i64>)>(
        r"SELECT waypoint_id, latitude, longitude, enabled, last_modified_ms, bonus_expires_ms
           FROM waypoints
           ORDER BY waypoint_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(waypoint_id, latitude, longitude, enabled, last_modified_ms, bonus_expires_ms)| {
                Waypoint {
                    waypoint_id,
                    latitude,
                    longitude,
                    enabled,
                    last_modified_ms,
                    bonus_expires_ms,
                }
            },
        )
        .collect())
}
