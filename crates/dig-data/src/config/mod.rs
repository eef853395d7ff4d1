//! Runtime configuration

use std::path::{Path, PathBuf};

use dig_core::EngineConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::DataError;

/// Project database to load instead of a map data file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,

    /// Falls back to the database's active project
    #[serde(default)]
    pub project_id: Option<i64>,
}

/// Configuration file contents. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    #[serde(flatten)]
    pub engine: EngineConfig,

    pub database: Option<DatabaseConfig>,
}

impl MapConfig {
    pub fn from_json_str(text: &str) -> Result<Self, DataError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load from a JSON file. Relative database paths resolve against the
    /// file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_json_str(&text)?;

        if let (Some(db), Some(dir)) = (config.database.as_mut(), path.parent()) {
            if db.path.is_relative() {
                db.path = dir.join(&db.path);
            }
        }

        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}
