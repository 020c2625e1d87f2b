//! Registry error types.

use thiserror::Error;

use crate::types::SchemaError;

/// Failures reported by the type negotiation collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    /// No server in the pool could be reached
    #[error("Pool '{pool}' is unreachable")]
    Unreachable { pool: String },

    /// The server refused the registration
    #[error("Server rejected request: {reason}")]
    Rejected { reason: String },

    /// The server does not know the enum code
    #[error("Unknown enum code {code}")]
    UnknownEnumCode { code: i32 },

    /// Transport failure
    #[error("I/O error: {0}")]
    Io(String),
}

/// Registry operation errors.
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    /// Type id or enum code negotiation failed
    #[error("Negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),

    /// Schema descriptor is invalid or cannot be merged
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The server returned a code already bound to another enum value
    #[error("Enum code {code} already maps to '{existing}', server returned it for '{requested}'")]
    EnumCodeConflict {
        code: i32,
        existing: String,
        requested: String,
    },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
