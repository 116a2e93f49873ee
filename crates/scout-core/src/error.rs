//! Core error types for the Scout scanner.
//!
//! This module defines the central error type shared by the subsystem crates.
//! Each subsystem keeps its own error enum; the variants here are used where a
//! failure crosses a crate boundary or reaches the application shell.

use thiserror::Error;

/// Central error type for Scout operations.
#[derive(Error, Debug)]
pub enum ScoutError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A caller supplied an argument that can never succeed (bad radius, bad position)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Storage errors (connection, upserts, migrations)
    #[error("storage error: {0}")]
    Storage(String),

    /// Network errors (HTTP requests, timeouts)
    #[error("network error: {0}")]
    Network(String),

    /// Authentication errors (identity provider, token refresh)
    #[error("authentication error: {0}")]
    Auth(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Config file not found
    #[error("config file not found at {path}")]
    NotFound {
        /// Path where config was expected
        path: String,
    },

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `ScoutError`.
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
