//! Sightings table operations.
//!
//! Sightings are keyed by encounter id; a repeated sighting replaces the
//! stored row so the latest disappear time wins.

use crate::error::Result;
use scout_core::Sighting;
use sqlx::{Pool, QueryBuilder, Sqlite};

/// Insert or update sightings in chunks of at most `batch_size` rows.
///
/// Each chunk is written in its own transaction.
#[allow(clippy::cast_possible_wrap)]
pub async fn upsert_sightings(
    pool: &Pool<Sqlite>,
    sightings: &[Sighting],
    batch_size: usize,
) -> Result<()> {
    for chunk in sightings.chunks(batch_size.max(1)) {
        let mut tx = pool.begin().await?;
        let mut query = QueryBuilder::<Sqlite>::new(
            "INSERT INTO sightings (encounter_id, spawn_point_id, species_id, latitude, longitude, disappear_time_ms) ",
        );
        query.push_values(chunk, |mut row, sighting| {
            row.push_bind(sighting.encounter_id as i64)
                .push_bind(sighting.spawn_point_id.clone())
                .push_bind(i64::from(sighting.species_id))
                .push_bind(sighting.latitude)
                .push_bind(sighting.longitude)
                .push_bind(sighting.disappear_time_ms);
        });
        query.push(
            " ON CONFLICT(encounter_id) DO UPDATE SET
                spawn_point_id = excluded.spawn_point_id,
                species_id = excluded.species_id,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                disappear_time_ms = excluded.disappear_time_ms",
        );
        query.build().execute(&mut *tx).await?;
        tx.commit().await?;
    }
    Ok(())
}

/// Sightings still visible at `now_ms`, soonest to disappear first.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub async fn active_sightings(pool: &Pool<Sqlite>, now_ms: i64) -> Result<Vec<Sighting>> {
    let rows = sqlx::query_as::<_, (i64, String, i64, f64, f64, i64)>(
        r"SELECT encounter_id, spawn_point_id, species_id, latitude, longitude, disappear_time_ms
           FROM sightings
           WHERE disappear_time_ms > ?
           ORDER BY disappear_time_ms",
    )
    .bind(now_ms)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(encounter_id, spawn_point_id, species_id, latitude, longitude, disappear_time_ms)| {
                Sighting {
                    encounter_id: encounter_id as u64,
                    spawn_point_id,
                    species_id: species_id as u32,
                    latitude,
                    longitude,
                    disappear_time_ms,
                }
            },
        )
        .collect())
}

/// Delete sightings that disappeared before `now_ms`. Returns the number removed.
pub async fn delete_expired_sightings(pool: &Pool<Sqlite>, now_ms: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sightings WHERE disappear_time_ms <= ?")
        .bind(now_ms)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
