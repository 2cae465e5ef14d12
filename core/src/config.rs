//! Configuration management for Glorp Core

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{GAMES_KEY, MESSAGES_KEY};

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub storage: StorageConfig,
    /// Number of entries kept in the in-app debug log.
    pub debug_log_capacity: usize,
    /// Message ids remembered by the global listener for duplicate suppression.
    pub seen_message_capacity: usize,
    /// `tracing` filter directive; `RUST_LOG` is used when unset.
    pub log_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_file: String,
    pub games_key: String,
    pub messages_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            debug_log_capacity: 10,
            seen_message_capacity: 1024,
            log_filter: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: "glorp.db".to_string(),
            games_key: GAMES_KEY.to_string(),
            messages_key: MESSAGES_KEY.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn load(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Self = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(data_dir)?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(data_dir.join(CONFIG_FILE), content)?;
        Ok(())
    }
}
