//! Error types for the onboarding tracker.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Checklist error: {0}")]
    Checklist(#[from] ChecklistError),

    #[error("Tutorial error: {0}")]
    Tutorial(#[from] TutorialError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persisted client store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Backend round-trip failures. All of these leave optimistic local state
/// in place.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Backend unreachable: {reason}")]
    Network { reason: String },

    #[error("Backend request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Backend rejected credentials")]
    Unauthorized,

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response from backend: {reason}")]
    InvalidResponse { reason: String },
}

/// Checklist engine errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChecklistError {
    #[error("Unknown checklist item: {key}")]
    InvalidKey { key: String },
}

/// Tutorial step tracker errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TutorialError {
    #[error("Tutorial step {step} is outside 1..={max}")]
    StepOutOfRange { step: u32, max: u32 },

    #[error("Tutorial step {step} requires input: {hint}")]
    InputRequired { step: u32, hint: String },

    #[error("Unknown background style: {style}")]
    UnknownStyle { style: String },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
