//! Core error types for pomosync-core.
//!
//! This module defines the error hierarchy using thiserror. Storage,
//! configuration and cloud failures each get their own enum and fold into
//! [`CoreError`] through `#[from]`.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pomosync-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Local storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Hosted backend errors
    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A task id that matches nothing
    #[error("Task not found: {0}")]
    TaskNotFound(String),
}

/// Local SQLite storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
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

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),

    /// Timer state was changed by another process mid-command
    #[error("Timer state changed by another process; try again")]
    TimerChanged,
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

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dotted key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Cloud project URL or anon key not set
    #[error("Cloud backend not configured: set cloud.url and cloud.anon_key")]
    CloudNotConfigured,
}

/// Errors returned by the hosted backend client.
#[derive(Error, Debug)]
pub enum CloudError {
    /// Transport failure (DNS, TLS, connection reset, body decode)
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed endpoint URL
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Non-success status with the provider's message
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// No stored session; the user must sign in
    #[error("Not signed in")]
    NotAuthenticated,

    /// Session exists but could not be refreshed
    #[error("Session expired and refresh failed: {0}")]
    SessionExpired(String),

    /// Signed-in user has no row in the public users table
    #[error("User not found. Please try signing out and signing in again.")]
    UserNotFound { user_id: String },

    /// Keyring access failed
    #[error("Credential store error: {0}")]
    Credential(String),
}

impl CloudError {
    /// Stable machine-readable code, mirrored from the provider's vocabulary.
    pub fn code(&self) -> &'static str {
        match self {
            CloudError::Http(_) => "HTTP_ERROR",
            CloudError::Url(_) => "INVALID_URL",
            CloudError::Api { .. } => "API_ERROR",
            CloudError::NotAuthenticated => "NOT_AUTHENTICATED",
            CloudError::SessionExpired(_) => "SESSION_EXPIRED",
            CloudError::UserNotFound { .. } => "USER_NOT_FOUND",
            CloudError::Credential(_) => "CREDENTIAL_ERROR",
        }
    }
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Value outside its accepted range
    #[error("'{field}' must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: String,
        min: u32,
        max: u32,
        value: u32,
    },

    /// Required text was blank
    #[error("'{0}' must not be empty")]
    Empty(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Storage(err.into())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::Cloud(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
