//! Request type registry and typed subrequests.
//!
//! Every operation the client can bundle into an envelope is a [`SubRequest`]
//! variant carrying its own parameter struct, so the mapping from type id to
//! parameters is checked at compile time.

use scout_core::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operations understood by the remote API, with their wire type ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RequestType {
    /// Baseline account state; also used to refresh server-side context
    GetPlayer,
    /// Inventory delta since a timestamp
    GetInventory,
    /// Remote settings blob
    DownloadSettings,
    /// Entities around a position
    GetMapObjects,
    /// Eggs hatched since the last call
    GetHatchedEggs,
    /// Badges awarded since the last call
    CheckAwardedBadges,
}

impl RequestType {
    /// All known request types.
    pub const ALL: [Self; 6] = [
        Self::GetPlayer,
        Self::GetInventory,
        Self::DownloadSettings,
        Self::GetMapObjects,
        Self::GetHatchedEggs,
        Self::CheckAwardedBadges,
    ];

    /// Wire type id.
    #[must_use]
    pub fn id(self) -> u32 {
        match self {
            Self::GetPlayer => 2,
            Self::GetInventory => 4,
            Self::DownloadSettings => 5,
            Self::GetMapObjects => 106,
            Self::GetHatchedEggs => 126,
            Self::CheckAwardedBadges => 129,
        }
    }

    /// Look up a request type by wire id.
    #[must_use]
    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }

    /// Upper-case name used as the key of parsed sub-responses.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::GetPlayer => "GET_PLAYER",
            Self::GetInventory => "GET_INVENTORY",
            Self::DownloadSettings => "DOWNLOAD_SETTINGS",
            Self::GetMapObjects => "GET_MAP_OBJECTS",
            Self::GetHatchedEggs => "GET_HATCHED_EGGS",
            Self::CheckAwardedBadges => "CHECK_AWARDED_BADGES",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters of [`SubRequest::GetMapObjects`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapObjectsParams {
    /// Latitude of the query
    pub latitude: f64,
    /// Longitude of the query
    pub longitude: f64,
    /// Only return entities changed after this time
    pub since_timestamp_ms: i64,
}

/// Parameters of [`SubRequest::GetInventory`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryParams {
    /// Only return items changed after this time
    pub last_timestamp_ms: i64,
}

/// Parameters of [`SubRequest::DownloadSettings`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsParams {
    /// Hash of the settings blob the client already holds
    pub hash: String,
}

/// One typed operation bundled into a request envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum SubRequest {
    /// See [`RequestType::GetPlayer`]
    GetPlayer,
    /// See [`RequestType::GetInventory`]
    GetInventory(InventoryParams),
    /// See [`RequestType::DownloadSettings`]
    DownloadSettings(SettingsParams),
    /// See [`RequestType::GetMapObjects`]
    GetMapObjects(MapObjectsParams),
    /// See [`RequestType::GetHatchedEggs`]
    GetHatchedEggs,
    /// See [`RequestType::CheckAwardedBadges`]
    CheckAwardedBadges,
}

/// Settings hash sent with every map scan.
pub const SETTINGS_HASH: &str = "05daf51635c82611d1aac95c0b051d3ec088a930";

impl SubRequest {
    /// The registry entry of this subrequest.
    #[must_use]
    pub fn request_type(&self) -> RequestType {
        match self {
            Self::GetPlayer => RequestType::GetPlayer,
            Self::GetInventory(_) => RequestType::GetInventory,
            Self::DownloadSettings(_) => RequestType::DownloadSettings,
            Self::GetMapObjects(_) => RequestType::GetMapObjects,
            Self::GetHatchedEggs => RequestType::GetHatchedEggs,
            Self::CheckAwardedBadges => RequestType::CheckAwardedBadges,
        }
    }

    /// Serialize the parameter struct, if the operation has one.
    pub fn encode_parameters(&self) -> Result<Option<Vec<u8>>, bincode::Error> {
        let bytes = match self {
            Self::GetPlayer | Self::GetHatchedEggs | Self::CheckAwardedBadges => return Ok(None),
            Self::GetInventory(params) => bincode::serialize(params)?,
            Self::DownloadSettings(params) => bincode::serialize(params)?,
            Self::GetMapObjects(params) => bincode::serialize(params)?,
        };
        Ok(Some(bytes))
    }

    /// The subrequest chain sent for one map scan step at `position`.
    #[must_use]
    pub fn scan_chain(position: Point) -> Vec<Self> {
        vec![
            Self::GetMapObjects(MapObjectsParams {
                latitude: position.latitude,
                longitude: position.longitude,
                since_timestamp_ms: 0,
            }),
            Self::GetHatchedEggs,
            Self::GetInventory(InventoryParams::default()),
            Self::CheckAwardedBadges,
            Self::DownloadSettings(SettingsParams {
                hash: SETTINGS_HASH.to_string(),
            }),
        ]
    }
}
