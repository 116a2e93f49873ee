//! Zones table operations.

use crate::error::{DatabaseError, Result};
use scout_core::{Faction, Zone};
use sqlx::{Pool, QueryBuilder, Sqlite};

/// Insert or update zones in chunks of at most `batch_size` rows.
///
/// Each chunk is written in its own transaction.
pub async fn upsert_zones(
    pool: &Pool<Sqlite>,
    zones: &[Zone],
    batch_size: usize,
) -> Result<()> {
    for chunk in zones.chunks(batch_size.max(1)) {
        let mut tx = pool.begin().await?;
        let mut query = QueryBuilder::<Sqlite>::new(
            "INSERT INTO zones (zone_id, faction, guard_species_id, points, latitude, longitude, last_modified_ms) ",
        );
        query.push_values(chunk, |mut row, zone| {
            row.push_bind(zone.zone_id.clone())
                .push_bind(i64::from(zone.faction.id()))
                .push_bind(i64::from(zone.guard_species_id))
                .push_bind(zone.points)
                .push_bind(zone.latitude)
                .push_bind(zone.longitude)
                .push_bind(zone.last_modified_ms);
        });
        query.push(
            " ON CONFLICT(zone_id) DO UPDATE SET
                faction = excluded.faction,
                guard_species_id = excluded.guard_species_id,
                points = excluded.points,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                last_modified_ms = excluded.last_modified_ms",
        );
        query.build().execute(&mut *tx).await?;
        tx.commit().await?;
    }
    Ok(())
}

/// All known zones, ordered by id.
pub async fn all_zones(pool: &Pool<Sqlite>) -> Result<Vec<Zone>> {
    let rows = sqlx::query_as::<_, (String, i64, i64, i64, f64, f64, i64)>(
        r"SELECT zone_id, faction, guard_species_id, points, latitude, longitude, last_modified_ms
           FROM zones
           ORDER BY zone_id",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(
            |(zone_id, faction, guard_species_id, points, latitude, longitude, last_modified_ms)| {
                let faction = u8::try_from(faction).map_err(|_| {
                    DatabaseError::Decode(format!("invalid faction {faction} for zone '{zone_id}'"))
                })?;
                let guard_species_id = u32::try_from(guard_species_id).map_err(|_| {
                    DatabaseError::Decode(format!(
                        "invalid guard species {guard_species_id} for zone '{zone_id}'"
                    ))
                })?;
                Ok(Zone {
                    zone_id,
                    faction: Faction::from_id(faction),
                    guard_species_id,
                    points,
                    latitude,
                    longitude,
                    last_modified_ms,
                })
            },
        )
        .collect()
}
