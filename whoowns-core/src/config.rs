//! Service configuration and path resolution.
//!
//! Configuration is read from YAML with every field optional:
//!
//! ```yaml
//! root: /srv/whoowns          # holds packages/ and teams.properties
//! packages_dir: /srv/manifests # overrides <root>/packages
//! teams_file: /srv/links.properties
//! listen: 0.0.0.0:8080
//! refresh_interval_secs: 300
//! ```
//!
//! Discovery order: explicit path, `./whoowns.yml`, then
//! `<config dir>/whoowns/config.yml`. Without any file the defaults apply.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{RegistryError, Result};

/// Manifest directory name under the root
pub const PACKAGES_DIR: &str = "packages";

/// Link file name under the root
pub const TEAMS_FILE: &str = "teams.properties";

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "whoowns.yml";

/// Service configuration as written on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Directory holding `packages/` and `teams.properties`
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Manifest directory override
    #[serde(default)]
    pub packages_dir: Option<PathBuf>,

    /// Link file override
    #[serde(default)]
    pub teams_file: Option<PathBuf>,

    /// Address the HTTP service binds to
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Rebuild the registry on this period; disabled when absent
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            packages_dir: None,
            teams_file: None,
            listen: default_listen(),
            refresh_interval_secs: None,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a specific YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&content).map_err(|source| RegistryError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse configuration from YAML text. An empty document yields defaults.
    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml_ng::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(content)
    }

    /// Find and load configuration.
    ///
    /// An explicit path must exist. Otherwise the local and user config
    /// files are tried in order, falling back to defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        for candidate in Self::candidates() {
            if candidate.is_file() {
                return Self::load(&candidate);
            }
            debug!("No configuration at {:?}", candidate);
        }

        debug!("Using built-in configuration defaults");
        Ok(Self::default())
    }

    fn candidates() -> Vec<PathBuf> {
        let mut candidates = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("whoowns").join("config.yml"));
        }
        candidates
    }

    /// Reject values that parse but cannot work
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == Some(0) {
            return Err(RegistryError::InvalidConfig(
                "refresh_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_secs.map(Duration::from_secs)
    }

    /// Resolve the effective manifest directory and link file
    pub fn paths(&self) -> ServicePaths {
        ServicePaths {
            packages_dir: self
                .packages_dir
                .clone()
                .unwrap_or_else(|| self.root.join(PACKAGES_DIR)),
            teams_file: self
                .teams_file
                .clone()
                .unwrap_or_else(|| self.root.join(TEAMS_FILE)),
        }
    }
}

/// Effective storage locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePaths {
    /// One manifest per team (`<root>/packages/`)
    pub packages_dir: PathBuf,
    /// `key=value` link file (`<root>/teams.properties`)
    pub teams_file: PathBuf,
}

impl ServicePaths {
    /// Conventional layout under `root`
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            packages_dir: root.join(PACKAGES_DIR),
            teams_file: root.join(TEAMS_FILE),
        }
    }
}
