//! Core error types for focusguard-core.
//!
//! Policy and state-machine errors are returned to the caller; several of
//! them (locked exits, charging) are user-consequential and must never be
//! swallowed. Sync failures are the exception: they degrade to local-only
//! operation and are only logged (see `sync::engine`).

use std::path::PathBuf;
use thiserror::Error;

use crate::commitment::EmergencyExitStatus;

/// Core error type for focusguard-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A focus session is already running on this device.
    #[error("a focus session is already running")]
    AlreadyRunning,

    /// An operation that needs a running session found none.
    #[error("no focus session is running")]
    NotRunning,

    /// Attempted to end a strict session without satisfying the exit policy.
    /// Carries the derived status so callers can show the reason.
    #[error("session is locked: {0}")]
    Locked(EmergencyExitStatus),

    /// The enforcement backend lacks OS permission. The session still runs;
    /// blocking is best-effort.
    #[error("blocking backend is not authorized")]
    NotAuthorized,

    /// The enforcement backend failed to apply or clear a block set.
    #[error("enforcement error: {0}")]
    Enforcement(#[from] crate::enforcement::EnforcementError),

    /// Remote shared-state store unreachable. Recoverable by falling back to
    /// a local-only timer.
    #[error("remote store unavailable: {0}")]
    SyncUnavailable(#[from] crate::sync::SyncError),

    /// Schedule failed its validity invariant (empty days or start >= end).
    /// Caught at edit time, never allowed to persist.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Local database errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("query failed: {0}")]
    QueryFailed(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::QueryFailed(err.to_string())
    }
}

/// Configuration file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    #[error("failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Result type alias for CoreError.
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
