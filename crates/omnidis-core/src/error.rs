//! Error types for the OmniDIS PDU dispatcher.
//!
//! Startup failures (bad identity, thresholds or network settings) surface as
//! [`ConfigError`]. Per-tick encoding and transport failures live next to the
//! code that raises them, in `omnidis-pdu` and `omnidis-client`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OmniDisError>;

/// Error returned while loading configuration or opening a session.
#[derive(Debug, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum OmniDisError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl OmniDisError {
    /// Dotted configuration path of the offending field, when known.
    pub fn field(&self) -> Option<&str> {
        match self {
            OmniDisError::Config(err) => err.field(),
        }
    }
}

/// Configuration problems.
///
/// All of them are fatal to dispatcher startup: an exercise must not be
/// joined with an identity or timing policy the receivers cannot interpret.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to load configuration from {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Invalid configuration format: {reason}")]
    InvalidFormat { reason: String },

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Identity value does not fit its DIS field width
    #[error("Identity field '{field}' out of range: {value} (max {max})")]
    IdentityOutOfRange { field: String, value: u64, max: u64 },

    /// Neither a registered name nor a `k:d:c:cat:sub:spec:extra` code
    #[error("Unknown entity type: {name}")]
    UnknownEntityType { name: String },

    /// Settings that are individually valid but inconsistent together
    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },
}

impl ConfigError {
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn identity_out_of_range(field: impl Into<String>, value: u64, max: u64) -> Self {
        Self::IdentityOutOfRange {
            field: field.into(),
            value,
            max,
        }
    }

    pub fn validation_failed(reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            reason: reason.into(),
        }
    }

    /// Dotted configuration path of the offending field, when known.
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigError::InvalidValue { field, .. }
            | ConfigError::IdentityOutOfRange { field, .. } => Some(field.as_str()),
            ConfigError::UnknownEntityType { .. } => Some("entity.entity_type"),
            _ => None,
        }
    }
}
