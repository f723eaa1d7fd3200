//! TOML-based application configuration.
//!
//! Holds everything that must survive restarts and is not session history:
//!
//! - the strict-mode [`CommitmentConfig`], including the monthly exit counter
//!   (the rollover logic depends on it persisting);
//! - session defaults, the user id, blocked-item list;
//! - user-defined schedules and regret-prevention windows.
//!
//! Stored at `~/.config/focusguard/config.toml`. Saves go through a temp
//! file plus rename so a crash mid-write cannot truncate the config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::commitment::CommitmentConfig;
use crate::error::{ConfigError, CoreError};
use crate::regret::RegretWindow;
use crate::schedule::Schedule;

const CONFIG_FILE: &str = "config.toml";

/// Default parameters for new sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDefaults {
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u32,
    #[serde(default)]
    pub strict: bool,
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn default_duration_minutes() -> u32 {
    25
}

fn default_mode() -> String {
    "focus".to_string()
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            duration_minutes: default_duration_minutes(),
            strict: false,
            mode: default_mode(),
        }
    }
}

/// Application configuration, serialized to/from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default)]
    pub defaults: SessionDefaults,
    #[serde(default)]
    pub commitment: CommitmentConfig,
    /// App/domain identifiers blocked during ad hoc sessions.
    #[serde(default)]
    pub blocked_items: Vec<String>,
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub regret_windows: Vec<RegretWindow>,
}

fn default_user_id() -> String {
    "local".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            defaults: SessionDefaults::default(),
            commitment: CommitmentConfig::default(),
            blocked_items: Vec::new(),
            schedules: Vec::new(),
            regret_windows: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist yet.
    pub fn load() -> Result<Self, CoreError> {
        Self::load_from(&data_dir()?.join(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config =
            toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<(), CoreError> {
        self.save_to(&data_dir()?.join(CONFIG_FILE))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), CoreError> {
        let raw = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        let tmp = tmp_path(path);
        let write = || -> std::io::Result<()> {
            std::fs::write(&tmp, &raw)?;
            std::fs::rename(&tmp, path)
        };
        write().map_err(|e| {
            ConfigError::SaveFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()
        })
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.as_os_str().to_owned();
    p.push(".tmp");
    PathBuf::from(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{parse_days, ClockTime};
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.defaults.duration_minutes, 25);
        assert!(config.commitment.enabled);
        assert!(config.schedules.is_empty());
    }

    #[test]
    fn round_trip_preserves_commitment_counter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = AppConfig::default();
        config.commitment.exits_used_this_month = 3;
        config.blocked_items = vec!["social.example".into()];

        let mut schedule = Schedule::new(
            "work",
            ClockTime::new(9, 0).unwrap(),
            ClockTime::new(17, 0).unwrap(),
        );
        schedule.days = parse_days("mon,tue,wed,thu,fri").unwrap();
        config.schedules.push(schedule);

        config.save_to(&path).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();

        assert_eq!(loaded.commitment.exits_used_this_month, 3);
        assert_eq!(loaded.blocked_items, vec!["social.example".to_string()]);
        assert_eq!(loaded.schedules.len(), 1);
        assert_eq!(loaded.schedules[0].name, "work");
    }

    #[test]
    fn save_does_not_leave_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        AppConfig::default().save_to(&path).unwrap();
        assert!(path.exists());
        assert!(!tmp_path(&path).exists());
    }
}
