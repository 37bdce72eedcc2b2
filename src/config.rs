// SPDX-License-Identifier: GPL-3.0-only

//! User configuration, persisted as JSON under the config directory

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::recording::{AudioQuality, ContainerFormat, QualityPreset};

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Video encode quality preset (Low, Medium, High, Maximum)
    pub quality: QualityPreset,
    /// Audio encode quality preset
    pub audio_quality: AudioQuality,
    /// Output container format
    pub container: ContainerFormat,
    /// Whether audio is captured alongside video
    pub record_audio: bool,
    /// Library directory override; `None` uses the default video directory
    pub save_folder: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quality: QualityPreset::default(),
            audio_quality: AudioQuality::default(),
            container: ContainerFormat::default(),
            record_audio: true,
            save_folder: None,
        }
    }
}

impl Config {
    /// Load the saved configuration, falling back to defaults on any problem
    pub fn load_or_default() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Invalid configuration, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Persist the configuration
    pub fn save(&self) -> Result<(), String> {
        let path = config_path().ok_or_else(|| "No config directory available".to_string())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        std::fs::write(&path, contents).map_err(|e| format!("Failed to write config: {}", e))?;
        debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("avrec").join(CONFIG_FILE))
}
