//! Core error types for stashweek-core.
//!
//! Engine errors (`ChallengeError`) are local to a single operation and never
//! leave an aggregate half-mutated. Storage and configuration errors are kept
//! separate so the engine itself stays free of I/O concerns.

use std::path::PathBuf;
use thiserror::Error;

use crate::challenge::ChallengeStatus;

/// Core error type for stashweek-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Engine rejected the operation
    #[error("Challenge error: {0}")]
    Challenge(#[from] ChallengeError),

    /// Persistence errors
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the allocator and the ledger state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    /// Bad week count, target, or progression parameters.
    #[error("Invalid schedule parameters: {0}")]
    InvalidScheduleParams(String),

    /// Week outside `[1, total_weeks]`.
    #[error("Week {week} is out of range (1..={total_weeks})")]
    InvalidWeek { week: u32, total_weeks: u32 },

    /// Negative deposit amount.
    #[error("Deposit amount must not be negative (got {0})")]
    InvalidAmount(i64),

    /// The week already has a paid entry.
    #[error("Week {week} has already been paid")]
    DuplicateDeposit { week: u32 },

    /// Mutation attempted on a completed or cancelled challenge.
    #[error("Challenge is {status} and accepts no further changes")]
    ChallengeClosed { status: ChallengeStatus },
}

impl ChallengeError {
    /// True when the error only signals a replay of an already-applied
    /// deposit. Callers treat it as a no-op success.
    pub fn is_idempotent_replay(&self) -> bool {
        matches!(self, ChallengeError::DuplicateDeposit { .. })
    }
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to open the database file
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// No challenge with the given id
    #[error("Challenge not found: {0}")]
    NotFound(String),

    /// Another writer saved the challenge first
    #[error("Version conflict for challenge {id}: expected {expected}, found {found}")]
    VersionConflict { id: String, expected: u64, found: u64 },

    /// Stored row does not form a valid aggregate
    #[error("Corrupt challenge record: {0}")]
    Corrupt(String),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Data directory could not be resolved or created
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
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

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
