//! Core error types for taskdex-core.
//!
//! This module defines the error hierarchy using thiserror. Most failures
//! inside a running session are best-effort side effects and are logged
//! rather than returned; the types here cover the seams where a caller
//! does get an error back.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for taskdex-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The session task is gone (ended, finished or panicked)
    #[error("Session is no longer running")]
    SessionClosed,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Could not determine or create the data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Unknown enum name
    #[error("Unknown {kind} '{value}'")]
    UnknownName { kind: &'static str, value: String },
}

/// Audio acquisition and playback errors.
///
/// These never leave the audio gate; they exist so backends and the
/// fetcher can say what went wrong before the gate logs and drops them.
#[derive(Error, Debug)]
pub enum AudioError {
    /// The asset could not be fetched
    #[error("Failed to fetch audio from {url}: {message}")]
    FetchFailed { url: String, message: String },

    /// Playback was refused (no user gesture yet, device busy, ...)
    #[error("Playback rejected: {0}")]
    PlaybackRejected(String),

    /// The backend could not write to its output
    #[error("Audio output error: {0}")]
    Output(#[from] std::io::Error),
}

/// Failure of the external persistence call during a catch.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to save caught items: {0}")]
    SaveFailed(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The persistence task panicked or was cancelled
    #[error("Save task aborted: {0}")]
    Aborted(String),
}

/// Failure reported by a fire-and-forget session hook.
#[derive(Error, Debug)]
#[error("Hook '{hook}' failed: {message}")]
pub struct HookError {
    pub hook: &'static str,
    pub message: String,
}

impl HookError {
    pub fn new(hook: &'static str, message: impl Into<String>) -> Self {
        Self {
            hook,
            message: message.into(),
        }
    }
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Custom(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_sqlite_maps_to_locked() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::DatabaseLocked,
                extended_code: 5,
            },
            None,
        );
        assert!(matches!(DatabaseError::from(err), DatabaseError::Locked));
    }

    #[test]
    fn hook_error_display_names_hook() {
        let err = HookError::new("on_work_session_complete", "boom");
        assert_eq!(
            err.to_string(),
            "Hook 'on_work_session_complete' failed: boom"
        );
    }
}
