//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout the console.
//! All errors are structured and map to stable error codes for JSON output.
//!
//! # Error Categories
//! - `Validation`: Missing required field or malformed input (recovered locally)
//! - `Lookup`: Unresolved category, command or field (recovered locally)
//! - `ConnectionFailed`: Could not open a database connection
//! - `StatementFailed`: The statement, its parameters or the driver failed
//! - `Busy`: An operation is already executing, or the event does not apply
//! - `Config`: Connection settings could not be loaded or saved
//!
//! `ConnectionFailed` and `StatementFailed` together form the execution error
//! class: they are always surfaced to the operator and never retried.

use thiserror::Error;

/// Main error type for console operations
#[derive(Error, Debug)]
pub enum ConsoleError {
    /// Missing required field or malformed input
    #[error("{0}")]
    Validation(String),

    /// Unresolved category, command or field
    #[error("{0}")]
    Lookup(String),

    /// Database connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Statement execution failed
    #[error("{0}")]
    StatementFailed(String),

    /// The dispatcher is not in a state that accepts the event
    #[error("{0}")]
    Busy(String),

    /// Configuration error (file not found, invalid JSON, missing setting)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConsoleError {
    /// Convert error to error code string for JSON output
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Lookup(_) => "LOOKUP_ERROR",
            Self::ConnectionFailed(_) => "CONNECTION_FAILED",
            Self::StatementFailed(_) => "STATEMENT_FAILED",
            Self::Busy(_) => "BUSY",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Get the human-readable error message
    ///
    /// Never contains the password or bound parameter values.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Whether this error came out of the execution gateway
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::StatementFailed(_))
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a lookup error
    pub fn lookup(message: impl Into<String>) -> Self {
        Self::Lookup(message.into())
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    /// Create a statement failed error
    pub fn statement_failed(message: impl Into<String>) -> Self {
        Self::StatementFailed(message.into())
    }

    /// Create a busy error
    pub fn busy(message: impl Into<String>) -> Self {
        Self::Busy(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result type alias for console operations
pub type Result<T> = std::result::Result<T, ConsoleError>;
