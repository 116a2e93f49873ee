//! Shared types used across the Scout workspace.
//!
//! Geographic positions, configured scan locations and account credentials.

use crate::error::ScoutError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A geographic sample position.
///
/// Coordinates are WGS84 degrees; altitude is in meters. A position is
/// considered complete only when all three components are finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Altitude in meters
    pub altitude: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    /// Create a point at sea level.
    #[must_use]
    pub const fn at_ground(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude, longitude, 0.0)
    }

    /// Whether all three coordinates are present (finite).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite() && self.altitude.is_finite()
    }

    /// Validate that the point can be used as a scan center.
    ///
    /// # Errors
    /// Returns `ScoutError::InvalidArgument` if a coordinate is missing or out of range.
    pub fn validate(&self) -> Result<(), ScoutError> {
        if !self.is_complete() {
            return Err(ScoutError::InvalidArgument(format!(
                "position {self} has a missing coordinate"
            )));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ScoutError::InvalidArgument(format!(
                "latitude {} is outside [-90, 90]",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ScoutError::InvalidArgument(format!(
                "longitude {} is outside [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.6}/{:.6}/{:.1}",
            self.latitude, self.longitude, self.altitude
        )
    }
}

/// A named area to cover on every scan cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanLocation {
    /// Unique location name; coordinates added at runtime use `"lat,lng"`
    pub name: String,
    /// Center latitude in degrees
    pub latitude: f64,
    /// Center longitude in degrees
    pub longitude: f64,
    /// Center altitude in meters
    #[serde(default)]
    pub altitude: f64,
    /// Radius of the covered disc in meters
    pub radius_m: f64,
}

impl ScanLocation {
    /// Create a location named after its coordinates.
    #[must_use]
    pub fn from_coordinates(latitude: f64, longitude: f64, radius_m: f64) -> Self {
        Self {
            name: format!("{latitude},{longitude}"),
            latitude,
            longitude,
            altitude: 0.0,
            radius_m,
        }
    }

    /// The center of the covered disc.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.latitude, self.longitude, self.altitude)
    }
}

/// Order in which the points of a coverage set are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VisitOrder {
    /// Center first, then ring by ring outward
    #[default]
    RingOrder,
    /// Outermost ring first
    Reversed,
    /// Reproducible permutation driven by `seed`
    Shuffled {
        /// Seed for the permutation
        seed: u64,
    },
}

/// Identity provider an account authenticates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    /// Trainer club accounts
    #[default]
    Ptc,
    /// Google accounts
    Google,
}

impl AuthProvider {
    /// Wire name of the provider.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ptc => "ptc",
            Self::Google => "google",
        }
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthProvider {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ptc" => Ok(Self::Ptc),
            "google" => Ok(Self::Google),
            other => Err(ScoutError::InvalidArgument(format!(
                "invalid authentication provider '{other}' - only ptc/google available"
            ))),
        }
    }
}

/// Credentials for one scanning account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Login name
    pub username: String,
    /// Login secret
    pub password: String,
    /// Identity provider
    #[serde(default)]
    pub provider: AuthProvider,
}

impl AccountConfig {
    /// Create account credentials.
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        provider: AuthProvider,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            provider,
        }
    }

    /// Validate that username and password are non-empty.
    ///
    /// # Errors
    /// Returns `ScoutError::InvalidArgument` if either field is blank.
    pub fn validate(&self) -> Result<(), ScoutError> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(ScoutError::InvalidArgument(
                "username/password not correctly specified".to_string(),
            ));
        }
        Ok(())
    }
}

// Secrets stay out of logs.
impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("provider", &self.provider)
            .finish()
    }
}
