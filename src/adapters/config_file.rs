//! JSON configuration file adapter.
//!
//! Implements [`ConfigPort`] on top of a single JSON document.  Missing
//! keys take their defaults; a missing file means "all defaults".  Writes
//! go to a sibling `.tmp` file first and are renamed into place so a crash
//! never leaves a half-written config behind.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::ConfigPort;
use crate::config::KilnConfig;
use crate::error::ConfigError;

pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

/// Parse and validate a JSON config document.
pub fn parse_config(bytes: &[u8]) -> Result<KilnConfig, ConfigError> {
    let config: KilnConfig = serde_json::from_slice(bytes).map_err(|e| {
        warn!("Config parse error: {}", e);
        ConfigError::Corrupted
    })?;
    config.validate()?;
    Ok(config)
}

impl ConfigPort for JsonConfigFile {
    fn load(&self) -> Result<KilnConfig, ConfigError> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                let config = parse_config(&bytes)?;
                info!("Loaded config from {}", self.path.display());
                Ok(config)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No config at {}, using defaults", self.path.display());
                Ok(KilnConfig::default())
            }
            Err(_) => Err(ConfigError::IoError),
        }
    }

    fn save(&self, config: &KilnConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let json = serde_json::to_vec_pretty(config).map_err(|_| ConfigError::Corrupted)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, json).map_err(|_| ConfigError::IoError)?;
        fs::rename(&tmp, &self.path).map_err(|_| ConfigError::IoError)?;
        info!("Saved config to {}", self.path.display());
        Ok(())
    }
}
