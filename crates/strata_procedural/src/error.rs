//! # Procedural Error Types
//!
//! Generation itself never fails (out-of-range access is tolerated), so the
//! only errors here come from loading and validating parameters.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating generation parameters.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for the expected schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parameters parsed but violate a constraint.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
