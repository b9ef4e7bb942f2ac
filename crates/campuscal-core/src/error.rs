//! Core error types for campuscal-core.
//!
//! One thiserror enum per concern, gathered under [`CoreError`] for callers
//! that do not care which layer failed.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for campuscal-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Calendar input errors
    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),

    /// Authentication errors
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Remote catalog errors
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Bad calendar input. These are caller errors and are never clamped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Invalid month {month}: expected 1-12")]
    InvalidMonth { month: u32 },

    #[error("Invalid event '{id}': {reason}")]
    InvalidEvent { id: String, reason: String },

    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

/// Authentication errors.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No credential, or the stored credential has expired
    #[error("not authenticated")]
    NotAuthenticated,

    /// Credential store failure (keyring, kv table)
    #[error("Credential store error: {0}")]
    Store(String),
}

/// Errors talking to the remote catalog.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode remote response: {0}")]
    Decode(String),

    #[error("Invalid remote URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
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

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A stored row could not be mapped back to a domain type
    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: &'static str, message: String },
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

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Unknown dotted key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => {
                if code.code == rusqlite::ErrorCode::DatabaseLocked {
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

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
