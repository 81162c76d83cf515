mod config;
pub mod database;

pub use config::{AudioConfig, Config, EncounterConfig, SessionDefaults};
pub use database::{CaughtRecord, CollectionStats, Database};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/taskdex[-dev]/` based on TASKDEX_ENV.
///
/// Set TASKDEX_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("TASKDEX_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("taskdex-dev")
    } else {
        base_dir.join("taskdex")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
