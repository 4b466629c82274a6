//! Player settings, loaded from TOML.
//!
//! # Example
//!
//! ```toml
//! [player]
//! allow_stage_restart = false
//! ```
//!
//! Every key is optional; a missing `[player]` table yields the defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ── Types ─────────────────────────────────────────────────────────────────────

/// Top-level settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub player: PlayerSettings,
}

/// `[player]` section: behavior switches of the progression engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Learners may erase a visit and restart from it. When disabled, erase
    /// is only accepted for errored submissions.
    pub allow_stage_restart: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        PlayerSettings {
            allow_stage_restart: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Functions ─────────────────────────────────────────────────────────────────

impl PlayerSettings {
    /// Parse the `[player]` table out of a settings document.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let file: SettingsFile = toml::from_str(content)?;
        Ok(file.player)
    }
}

/// Read and parse a settings TOML file from `path`.
pub fn read_player_settings(path: &Path) -> Result<PlayerSettings, SettingsError> {
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    PlayerSettings::from_toml_str(&content)
}
