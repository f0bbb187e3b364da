//! Core error types for cadence-core.
//!
//! This module defines the error hierarchy using thiserror. Every failing
//! operation in the library raises one of these synchronously to its caller;
//! there are no retried or transient failures.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for cadence-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A referenced entity or session does not exist
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A structural precondition involving an active tracking session failed
    #[error("An active tracking session references {kind} '{id}'")]
    ActiveSessionConflict { kind: &'static str, id: String },

    /// Arithmetic faults. These indicate a bug in stored data or in the
    /// caller, never a user mistake; they must propagate, not be clamped.
    #[error("Arithmetic fault: {0}")]
    Arithmetic(#[from] ArithmeticError),

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

impl CoreError {
    /// Shorthand for a NotFound on a schedulable entity or session.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid instant range
    #[error("Invalid time range: end ({end}) must be greater than start ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Invalid time-of-day range
    #[error("Invalid time range: end ({end}) must be greater than start ({start})")]
    InvalidTimeOfDayRange {
        start: chrono::NaiveTime,
        end: chrono::NaiveTime,
    },

    /// Note exceeds the persisted length limit
    #[error("Note is {len} characters (limit {limit})")]
    NoteTooLong { len: usize, limit: usize },

    /// Disallowed state transition
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Outcome field combination violates the status invariants
    #[error("Inconsistent outcome: {0}")]
    InconsistentOutcome(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Arithmetic faults from elapsed-time and completion computations.
#[derive(Error, Debug)]
pub enum ArithmeticError {
    /// Active duration came out negative (paused time exceeds wall time)
    #[error("negative active duration: {seconds}s")]
    NegativeDuration { seconds: i64 },

    /// An occurrence's scheduled window has no positive target duration
    #[error("non-positive target duration: {minutes} min")]
    NonPositiveTarget { minutes: i64 },
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
}

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

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
