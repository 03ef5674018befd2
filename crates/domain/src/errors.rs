//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for PomoSync
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum PomoSyncError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PomoSyncError {
    /// Stable label for metrics and structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Delivery(_) => "delivery",
            Self::Internal(_) => "internal",
        }
    }

    /// Shorthand for a missing record of the given kind.
    pub fn not_found(kind: impl std::fmt::Display, id: &str) -> Self {
        Self::NotFound(format!("{kind} {id}"))
    }
}

/// Result type alias for PomoSync operations
pub type Result<T> = std::result::Result<T, PomoSyncError>;
