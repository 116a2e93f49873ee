use scout_core::ScoutError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<GeoError> for ScoutError {
    fn from(err: GeoError) -> Self {
        match err {
            GeoError::InvalidArgument(reason) => ScoutError::InvalidArgument(reason),
        }
    }
}

pub type Result<T> = std::result::Result<T, GeoError>;
