//! Conversion of map responses into world-state entities.

use crate::codec::ParsedEnvelope;
use crate::request::RequestType;
use crate::response::{FortKind, MapObjectsResponse, ResponsePayload};
use scout_core::{Faction, Sighting, Waypoint, WorldSnapshot, Zone};

/// Visibility assumed when the server reports none.
pub const DEFAULT_VISIBILITY_MS: i64 = 15 * 60 * 1000;

/// Longest visibility the server reports for a valid entity.
const MAX_VISIBILITY_MS: i64 = 60 * 60 * 1000;

/// Extract world state from the `GET_MAP_OBJECTS` part of `envelope`.
///
/// Returns an empty snapshot when the map sub-response is missing or failed
/// to parse.
#[must_use]
pub fn world_snapshot(envelope: &ParsedEnvelope, now_ms: i64) -> WorldSnapshot {
    match envelope.payload(RequestType::GetMapObjects) {
        Some(ResponsePayload::MapObjects(map)) => snapshot_from_map(map, now_ms),
        _ => WorldSnapshot::default(),
    }
}

/// Extract world state from a map response.
#[must_use]
pub fn snapshot_from_map(map: &MapObjectsResponse, now_ms: i64) -> WorldSnapshot {
    let mut snapshot = WorldSnapshot::default();

    for cell in &map.cells {
        for wild in &cell.wild {
            let disappear_time_ms = if (1..=MAX_VISIBILITY_MS).contains(&wild.time_till_hidden_ms)
            {
                wild.last_modified_ms + wild.time_till_hidden_ms
            } else {
                now_ms + DEFAULT_VISIBILITY_MS
            };
            snapshot.sightings.push(Sighting {
                encounter_id: wild.encounter_id,
                spawn_point_id: wild.spawn_point_id.clone(),
                species_id: wild.species_id,
                latitude: wild.latitude,
                longitude: wild.longitude,
                disappear_time_ms,
            });
        }

        for fort in &cell.forts {
            match &fort.kind {
                FortKind::Waypoint { bonus_expires_ms } => snapshot.waypoints.push(Waypoint {
                    waypoint_id: fort.id.clone(),
                    latitude: fort.latitude,
                    longitude: fort.longitude,
                    enabled: fort.enabled,
                    last_modified_ms: fort.last_modified_ms,
                    bonus_expires_ms: *bonus_expires_ms,
                }),
                FortKind::Zone {
                    owner_team,
                    guard_species_id,
                    points,
                } => snapshot.zones.push(Zone {
                    zone_id: fort.id.clone(),
                    faction: Faction::from_id(*owner_team),
                    guard_species_id: *guard_species_id,
                    points: *points,
                    latitude: fort.latitude,
                    longitude: fort.longitude,
                    last_modified_ms: fort.last_modified_ms,
                }),
            }
        }
    }

    snapshot
}
