//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Default session shape (work/break length, repetitions, category)
//! - Audio cue settings
//! - Encounter generation settings
//!
//! Configuration is stored at `~/.config/taskdex/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::audio::{AudioSettings, DEFAULT_CAUGHT_URL, DEFAULT_SPAWN_URL};
use crate::encounter::{Category, WildPool};
use crate::error::ConfigError;
use crate::timer::SessionConfig;

/// Defaults for new sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDefaults {
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u32,
    #[serde(default = "default_break_minutes")]
    pub break_minutes: u32,
    #[serde(default = "default_repetitions")]
    pub repetitions: u32,
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default)]
    pub category: Category,
    /// Clock period; 1000 is real time.
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,
}

/// Audio cue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default = "default_spawn_url")]
    pub spawn_url: String,
    #[serde(default = "default_caught_url")]
    pub caught_url: String,
}

/// Encounter generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncounterConfig {
    /// Fixed seed for reproducible encounters; random when unset.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_off_category_chance")]
    pub off_category_chance: f64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/taskdex/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub session: SessionDefaults,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub encounters: EncounterConfig,
}

// Default functions
fn default_work_minutes() -> u32 {
    30
}
fn default_break_minutes() -> u32 {
    5
}
fn default_repetitions() -> u32 {
    4
}
fn default_label() -> String {
    "Focus Session".into()
}
fn default_tick_period_ms() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}
fn default_volume() -> f64 {
    0.9
}
fn default_spawn_url() -> String {
    DEFAULT_SPAWN_URL.into()
}
fn default_caught_url() -> String {
    DEFAULT_CAUGHT_URL.into()
}
fn default_off_category_chance() -> f64 {
    WildPool::DEFAULT_OFF_CATEGORY_CHANCE
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
            break_minutes: default_break_minutes(),
            repetitions: default_repetitions(),
            label: default_label(),
            category: Category::default(),
            tick_period_ms: default_tick_period_ms(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: default_volume(),
            spawn_url: default_spawn_url(),
            caught_url: default_caught_url(),
        }
    }
}

impl Default for EncounterConfig {
    fn default() -> Self {
        Self {
            seed: None,
            off_category_chance: default_off_category_chance(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => parse_number(value)
                        .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?,
                    // Unset optional: take a number if it looks like one.
                    serde_json::Value::Null => parse_number(value)
                        .unwrap_or_else(|| serde_json::Value::String(value.into())),
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    serde_json::Value::String(_) => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Location of `config.toml` in the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or written.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Change a value in memory by dot-separated key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Session shape for a new run, from the configured defaults.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            work_minutes: self.session.work_minutes,
            break_minutes: self.session.break_minutes,
            repetition_count: self.session.repetitions,
            label: self.session.label.clone(),
            category: self.session.category,
        }
    }

    pub fn audio_settings(&self) -> AudioSettings {
        AudioSettings {
            enabled: self.audio.enabled,
            volume: self.audio.volume.clamp(0.0, 1.0) as f32,
            spawn_url: self.audio.spawn_url.clone(),
            caught_url: self.audio.caught_url.clone(),
        }
    }

    /// Encounter pool honouring the configured seed and off-category chance.
    pub fn wild_pool(&self) -> WildPool {
        let pool = match self.encounters.seed {
            Some(seed) => WildPool::seeded(seed),
            None => WildPool::from_entropy(),
        };
        pool.with_off_category_chance(self.encounters.off_category_chance)
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("using default configuration: {e}");
            Self::default()
        })
    }
}

fn parse_number(value: &str) -> Option<serde_json::Value> {
    if let Ok(n) = value.parse::<u64>() {
        Some(serde_json::Value::Number(n.into()))
    } else if let Ok(n) = value.parse::<f64>() {
        serde_json::Number::from_f64(n).map(serde_json::Value::Number)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.session.work_minutes, 30);
        assert!(parsed.audio.enabled);
        assert_eq!(parsed.encounters.seed, None);
    }

    #[test]
    fn empty_file_gets_all_defaults() {
        let parsed: Config = toml::from_str("").unwrap();
        assert_eq!(parsed.session.break_minutes, 5);
        assert_eq!(parsed.session.repetitions, 4);
        assert_eq!(parsed.session.tick_period_ms, 1000);
        assert_eq!(parsed.audio.spawn_url, DEFAULT_SPAWN_URL);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let parsed: Config = toml::from_str("[session]\nwork_minutes = 45\ncategory = \"ghost\"\n").unwrap();
        assert_eq!(parsed.session.work_minutes, 45);
        assert_eq!(parsed.session.category, Category::Ghost);
        assert_eq!(parsed.session.label, "Focus Session");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("session.work_minutes").as_deref(), Some("30"));
        assert_eq!(cfg.get("audio.enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("session.category").as_deref(), Some("Fire"));
        assert!(cfg.get("session.missing_key").is_none());
    }

    #[test]
    fn apply_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.apply("session.work_minutes", "45").unwrap();
        cfg.apply("audio.enabled", "false").unwrap();
        cfg.apply("session.category", "water").unwrap();
        cfg.apply("encounters.seed", "1234").unwrap();
        assert_eq!(cfg.session.work_minutes, 45);
        assert!(!cfg.audio.enabled);
        assert_eq!(cfg.session.category, Category::Water);
        assert_eq!(cfg.encounters.seed, Some(1234));
    }

    #[test]
    fn apply_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.apply("session.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(cfg.apply("", "1").is_err());
    }

    #[test]
    fn apply_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(cfg.apply("audio.enabled", "not_a_bool").is_err());
        assert!(cfg.apply("session.work_minutes", "lots").is_err());
        assert!(cfg.apply("session.category", "Dragon").is_err());
        assert_eq!(cfg.session.category, Category::Fire);
    }

    #[test]
    fn session_config_from_defaults() {
        let mut cfg = Config::default();
        cfg.apply("session.repetitions", "2").unwrap();
        let session = cfg.session_config();
        assert_eq!(session.repetition_count, 2);
        assert_eq!(session.work_minutes, 30);
        assert_eq!(session.label, "Focus Session");
    }

    #[test]
    fn audio_volume_is_clamped() {
        let mut cfg = Config::default();
        cfg.audio.volume = 3.0;
        assert_eq!(cfg.audio_settings().volume, 1.0);
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.session.work_minutes, 30);
        assert!(path.exists());

        let mut cfg = cfg;
        cfg.apply("session.label", "Thesis").unwrap();
        cfg.save_to(&path).unwrap();
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.session.label, "Thesis");
    }

    #[test]
    fn load_from_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "session = [[[").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
