//! Registry error types with clear, actionable messages

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the ownership registry and its configuration
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The manifest directory could not be listed; the live snapshot is kept
    #[error("Manifest directory is unavailable: {path}\n\nThe previous ownership snapshot is still being served.")]
    ManifestDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read a configuration file
    #[error("Failed to read configuration from {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a configuration file
    #[error("Failed to parse configuration file {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// Configuration values that parsed but make no sense
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
