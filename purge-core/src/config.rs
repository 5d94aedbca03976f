use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PurgeError, Result};
use crate::folder::DEFAULT_MARKER;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Connection and run settings read from the JSON config file.
#[derive(Clone, Deserialize)]
pub struct PurgeConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    #[serde(default)]
    pub insecure: bool,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_marker")]
    pub marker: String,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// List with ListObjects (V1, marker pagination) for stores without V2
    #[serde(default)]
    pub use_v1: bool,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl PurgeConfig {
    /// Load and validate the config file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!("Loading config: path={:?}", path);

        let json = std::fs::read_to_string(path).map_err(|source| PurgeError::Config {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_json(&json).map_err(|source| PurgeError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(PurgeError::InvalidConfig("endpoint must not be empty".into()));
        }
        // Transport security comes from `insecure` alone
        if self.endpoint.contains("://") {
            return Err(PurgeError::InvalidConfig(format!(
                "endpoint must be host[:port] without a scheme, got {:?}",
                self.endpoint
            )));
        }
        if self.bucket.trim().is_empty() {
            return Err(PurgeError::InvalidConfig("bucket must not be empty".into()));
        }
        if self.marker.is_empty() || self.marker.contains('/') {
            return Err(PurgeError::InvalidConfig(format!(
                "marker must be a plain file name, got {:?}",
                self.marker
            )));
        }
        if self.channel_capacity == 0 {
            return Err(PurgeError::InvalidConfig(
                "channel_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// `http://` when `insecure` is set, `https://` otherwise.
    pub fn endpoint_url(&self) -> String {
        if self.insecure {
            format!("http://{}", self.endpoint)
        } else {
            format!("https://{}", self.endpoint)
        }
    }

    pub fn settings(&self) -> PurgeSettings {
        PurgeSettings {
            marker: self.marker.clone(),
            backup_dir: self.backup_dir.clone(),
            channel_capacity: self.channel_capacity,
            dry_run: false,
        }
    }
}

impl fmt::Debug for PurgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PurgeConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("insecure", &self.insecure)
            .field("region", &self.region)
            .field("marker", &self.marker)
            .field("backup_dir", &self.backup_dir)
            .field("channel_capacity", &self.channel_capacity)
            .field("use_v1", &self.use_v1)
            .finish()
    }
}

/// The part of the config the scan, record and delete phases need.
#[derive(Debug, Clone)]
pub struct PurgeSettings {
    pub marker: String,
    pub backup_dir: PathBuf,
    pub channel_capacity: usize,
    /// Scan and record only
    pub dry_run: bool,
}

impl Default for PurgeSettings {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            backup_dir: default_backup_dir(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            dry_run: false,
        }
    }
}
