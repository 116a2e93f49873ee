use scout_core::ScoutError;
use scout_geo::GeoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Coverage error: {0}")]
    Coverage(#[from] GeoError),

    #[error("Storage error: {0}")]
    Storage(#[from] ScoutError),

    #[error("Location not found: {latitude},{longitude}")]
    LocationNotFound { latitude: f64, longitude: f64 },
}

pub type Result<T> = std::result::Result<T, ScanError>;
