//! Scout Core - Foundation crate for the Scout world scanner.
//!
//! This crate provides shared types, error handling, configuration management,
//! and the world-state entities that all other Scout crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Positions, scan locations and account credentials
//! - [`world`] - Parsed world-state entities and the [`WorldStore`] contract
//!
//! # Example
//!
//! ```rust
//! use scout_core::{AppConfig, ScanLocation};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = AppConfig::default();
//! config.locations.push(ScanLocation::from_coordinates(48.0, 11.0, 500.0));
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;
pub mod world;

// Re-export commonly used types
pub use config::{AppConfig, GeneralConfig, RpcConfig, ScanningConfig, StorageConfig};
pub use error::{ConfigError, ConfigResult, Result, ScoutError};
pub use types::{now_millis, AccountConfig, AuthProvider, Point, ScanLocation, VisitOrder};
pub use world::{Faction, Sighting, Waypoint, WorldSnapshot, WorldStore, Zone};
