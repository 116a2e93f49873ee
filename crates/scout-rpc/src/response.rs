//! Typed sub-response shapes.

use crate::request::RequestType;
use serde::{Deserialize, Serialize};

/// Response to `GET_PLAYER`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerResponse {
    /// Whether the call succeeded
    pub success: bool,
    /// In-game name of the account
    pub username: String,
}

/// Response to `GET_INVENTORY`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryResponse {
    /// Whether the call succeeded
    pub success: bool,
    /// Timestamp to send with the next inventory call
    pub new_timestamp_ms: i64,
    /// Number of changed items
    pub item_count: u32,
}

/// Response to `DOWNLOAD_SETTINGS`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsResponse {
    /// Hash of the current settings blob
    pub hash: String,
}

/// Response to `GET_HATCHED_EGGS`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HatchedEggsResponse {
    /// Whether the call succeeded
    pub success: bool,
    /// Species hatched
    pub species_ids: Vec<u32>,
}

/// Response to `CHECK_AWARDED_BADGES`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwardedBadgesResponse {
    /// Whether the call succeeded
    pub success: bool,
    /// Badge ids awarded
    pub badges: Vec<u32>,
}

/// Response to `GET_MAP_OBJECTS`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapObjectsResponse {
    /// Server status of the map query
    pub status: u32,
    /// Map cells around the queried position
    pub cells: Vec<MapCell>,
}

/// One map cell of a `GET_MAP_OBJECTS` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapCell {
    /// Cell identifier
    pub cell_id: u64,
    /// Server time of the cell snapshot
    pub current_timestamp_ms: i64,
    /// Mobile entities in the cell
    pub wild: Vec<WildEntity>,
    /// Static points of interest and contested zones in the cell
    pub forts: Vec<Fort>,
}

/// A mobile entity visible in a map cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WildEntity {
    /// Encounter identifier
    pub encounter_id: u64,
    /// Spawn point identifier
    pub spawn_point_id: String,
    /// Species identifier
    pub species_id: u32,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Server time the entity was last seen changing
    pub last_modified_ms: i64,
    /// Remaining visibility; out-of-range values mean unknown
    pub time_till_hidden_ms: i64,
}

/// A static map object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fort {
    /// Fort identifier
    pub id: String,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Whether the fort can be interacted with
    pub enabled: bool,
    /// Server modification time
    pub last_modified_ms: i64,
    /// What kind of fort this is
    pub kind: FortKind,
}

/// Kind-specific fort state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FortKind {
    /// A point of interest, possibly with an active bonus
    Waypoint {
        /// Bonus expiry, if one is active
        bonus_expires_ms: Option<i64>,
    },
    /// A contested zone
    Zone {
        /// Faction id of the holder
        owner_team: u8,
        /// Species guarding the zone
        guard_species_id: u32,
        /// Prestige points
        points: i64,
    },
}

/// A successfully parsed sub-response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponsePayload {
    /// `GET_PLAYER`
    Player(PlayerResponse),
    /// `GET_INVENTORY`
    Inventory(InventoryResponse),
    /// `DOWNLOAD_SETTINGS`
    Settings(SettingsResponse),
    /// `GET_MAP_OBJECTS`
    MapObjects(MapObjectsResponse),
    /// `GET_HATCHED_EGGS`
    HatchedEggs(HatchedEggsResponse),
    /// `CHECK_AWARDED_BADGES`
    AwardedBadges(AwardedBadgesResponse),
}

impl ResponsePayload {
    /// Parse `bytes` as the response shape registered for `request_type`.
    pub fn parse(request_type: RequestType, bytes: &[u8]) -> Result<Self, bincode::Error> {
        Ok(match request_type {
            RequestType::GetPlayer => Self::Player(bincode::deserialize(bytes)?),
            RequestType::GetInventory => Self::Inventory(bincode::deserialize(bytes)?),
            RequestType::DownloadSettings => Self::Settings(bincode::deserialize(bytes)?),
            RequestType::GetMapObjects => Self::MapObjects(bincode::deserialize(bytes)?),
            RequestType::GetHatchedEggs => Self::HatchedEggs(bincode::deserialize(bytes)?),
            RequestType::CheckAwardedBadges => {
                Self::AwardedBadges(bincode::deserialize(bytes)?)
            }
        })
    }

    /// Serialize the inner response struct into its wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        match self {
            Self::Player(r) => bincode::serialize(r),
            Self::Inventory(r) => bincode::serialize(r),
            Self::Settings(r) => bincode::serialize(r),
            Self::MapObjects(r) => bincode::serialize(r),
            Self::HatchedEggs(r) => bincode::serialize(r),
            Self::AwardedBadges(r) => bincode::serialize(r),
        }
    }

    /// The request type this payload answers.
    #[must_use]
    pub fn request_type(&self) -> RequestType {
        match self {
            Self::Player(_) => RequestType::GetPlayer,
            Self::Inventory(_) => RequestType::GetInventory,
            Self::Settings(_) => RequestType::DownloadSettings,
            Self::MapObjects(_) => RequestType::GetMapObjects,
            Self::HatchedEggs(_) => RequestType::GetHatchedEggs,
            Self::AwardedBadges(_) => RequestType::CheckAwardedBadges,
        }
    }
}

/// Best-effort result for one sub-response.
#[derive(Debug, Clone, PartialEq)]
pub enum SubResponse {
    /// The payload matched its registered shape
    Parsed(ResponsePayload),
    /// The payload did not parse; the message says why
    Error(String),
}

impl SubResponse {
    /// The parsed payload, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&ResponsePayload> {
        match self {
            Self::Parsed(payload) => Some(payload),
            Self::Error(_) => None,
        }
    }
}
