//! Parsed world-state entities and the storage contract they are handed to.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A mobile entity seen at a spawn point, valid until `disappear_time_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sighting {
    /// Natural key
    pub encounter_id: u64,
    /// Spawn point the entity appeared at
    pub spawn_point_id: String,
    /// Species identifier
    pub species_id: u32,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Expiry in epoch milliseconds
    pub disappear_time_ms: i64,
}

/// A static point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Natural key
    pub waypoint_id: String,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Whether the waypoint can be interacted with
    pub enabled: bool,
    /// Server-side modification time in epoch milliseconds
    pub last_modified_ms: i64,
    /// Expiry of a time-limited bonus, when one is active
    pub bonus_expires_ms: Option<i64>,
}

/// Owner of a contested zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Faction {
    /// Not held by anyone
    #[default]
    Uncontested,
    /// Team 1
    Blue,
    /// Team 2
    Red,
    /// Team 3
    Yellow,
}

impl Faction {
    /// Wire identifier of the faction.
    #[must_use]
    pub fn id(self) -> u8 {
        match self {
            Self::Uncontested => 0,
            Self::Blue => 1,
            Self::Red => 2,
            Self::Yellow => 3,
        }
    }

    /// Map a wire identifier; unknown ids are treated as uncontested.
    #[must_use]
    pub fn from_id(id: u8) -> Self {
        match id {
            1 => Self::Blue,
            2 => Self::Red,
            3 => Self::Yellow,
            _ => Self::Uncontested,
        }
    }
}

/// A contested zone and its current holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Natural key
    pub zone_id: String,
    /// Current owner
    pub faction: Faction,
    /// Species guarding the zone
    pub guard_species_id: u32,
    /// Prestige points
    pub points: i64,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Server-side modification time in epoch milliseconds
    pub last_modified_ms: i64,
}

/// Everything parsed out of one map response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Mobile entity sightings
    pub sightings: Vec<Sighting>,
    /// Points of interest
    pub waypoints: Vec<Waypoint>,
    /// Contested zones
    pub zones: Vec<Zone>,
}

impl WorldSnapshot {
    /// Whether the snapshot carries no entities at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sightings.is_empty() && self.waypoints.is_empty() && self.zones.is_empty()
    }

    /// Total number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sightings.len() + self.waypoints.len() + self.zones.len()
    }
}

/// Storage collaborator receiving parsed world state.
///
/// Implementations must upsert idempotently by natural key; the same snapshot
/// may be delivered more than once.
#[async_trait]
pub trait WorldStore: Send + Sync {
    /// Persist every entity in `snapshot`.
    async fn store(&self, snapshot: &WorldSnapshot) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faction_ids() {
        for faction in [
            Faction::Uncontested,
            Faction::Blue,
            Faction::Red,
            Faction::Yellow,
        ] {
            assert_eq!(Faction::from_id(faction.id()), faction);
        }
        assert_eq!(Faction::from_id(9), Faction::Uncontested);
    }

    #[test]
    fn test_snapshot_len() {
        let mut snapshot = WorldSnapshot::default();
        assert!(snapshot.is_empty());
        snapshot.zones.push(Zone {
            zone_id: "z1".to_string(),
            faction: Faction::Red,
            guard_species_id: 149,
            points: 2000,
            latitude: 48.0,
            longitude: 11.0,
            last_modified_ms: 0,
        });
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot.is_empty());
    }
}
