use std::path::{Path, PathBuf};

use anyhow::Result;
use handoff_core::{StressConfig, Variant};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SCENARIO_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Variants to run when none are given on the command line.
    pub variants:            Vec<Variant>,
    pub stress:              StressConfig,
    pub scenario_timeout_ms: u64,
}

impl Default for Configuration {
    #[inline]
    fn default() -> Self {
        Self {
            variants:            Variant::all().collect(),
            stress:              StressConfig::default(),
            scenario_timeout_ms: DEFAULT_SCENARIO_TIMEOUT_MS,
        }
    }
}

impl Configuration {
    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        save_pretty_json(self, path)
    }

    #[inline]
    pub fn load(config_path: &Path) -> Result<Option<Configuration>> {
        if !config_path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(config_path)
            .map_err(|_| ConfigError::ConfigLoadError(config_path.to_path_buf()))?;
        let data = serde_json::from_str(&data)
            .map_err(|_| ConfigError::ConfigLoadError(config_path.to_path_buf()))?;

        Ok(Some(data))
    }

    /// Load the config file, falling back to the defaults when there is none.
    #[inline]
    pub fn load_or_default(config_path: &Path) -> Result<Configuration> {
        Ok(Self::load(config_path)?.unwrap_or_default())
    }
}

/// Write `value` as JSON indented by four spaces, creating parent directories.
#[inline]
pub fn save_pretty_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let mut buffer = vec![];
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, buffer)?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    ConfigLoadError(PathBuf),
}
