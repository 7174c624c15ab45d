//! JSON Output Envelope Types
//!
//! This module defines the JSON output of the non-interactive subcommands.
//! Every operation prints either a `SuccessEnvelope` or an `ErrorEnvelope`.
//!
//! # Output Contract
//! - Success: `{"ok": true, "category": "...", "command": "...", "data": {...}, "meta": {...}}`
//! - Error: `{"ok": false, "category": "...", "command": "...", "error": {"code": "...", "message": "..."}}`
//!
//! `category` is empty for operations outside the command catalog (`list`, `connect`).
//!
//! A catalog command run through `cmps run` is reported as a [`RunEnvelope`]:
//! its `data` is the dispatcher's [`Outcome`], and a failed execution becomes
//! an error envelope carrying the gateway's code and the error notice text.

use serde::Serialize;

use crate::console::RunReport;
use crate::dispatch::Outcome;
use crate::error::ConsoleError;

/// Success envelope for operation results
///
/// Generic over the data type to support different operation return values.
#[derive(Debug, Clone, Serialize)]
pub struct SuccessEnvelope<T> {
    /// Always true for success envelopes
    pub ok: bool,

    /// Catalog category of the command
    pub category: String,

    /// Command that was executed
    pub command: String,

    /// Operation-specific data
    pub data: T,

    /// Execution metadata
    pub meta: Metadata,
}

impl<T> SuccessEnvelope<T> {
    /// Create a new success envelope
    pub fn new(
        category: impl Into<String>,
        command: impl Into<String>,
        data: T,
        meta: Metadata,
    ) -> Self {
        Self { ok: true, category: category.into(), command: command.into(), data, meta }
    }
}

/// Error envelope for operation failures
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    /// Always false for error envelopes
    pub ok: bool,

    pub category: String,

    /// Command that was attempted
    pub command: String,

    /// Error information
    pub error: ErrorInfo,
}

impl ErrorEnvelope {
    /// Create a new error envelope
    pub fn new(category: impl Into<String>, command: impl Into<String>, error: ErrorInfo) -> Self {
        Self { ok: false, category: category.into(), command: command.into(), error }
    }

    /// Create error envelope from `ConsoleError`
    pub fn from_error(
        category: impl Into<String>,
        command: impl Into<String>,
        err: &ConsoleError,
    ) -> Self {
        Self::new(category, command, ErrorInfo::new(err.error_code(), err.message()))
    }
}

/// Error information structure
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    /// Stable error code (e.g., "VALIDATION_ERROR", "CONNECTION_FAILED")
    pub code: String,

    /// Human-readable error message (never carries the password)
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }
}

/// Execution metadata included in all success responses
#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    /// Execution time in milliseconds
    pub execution_ms: u64,

    /// Number of rows returned (None for statements that return no rows)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_returned: Option<usize>,
}

impl Metadata {
    /// Metadata of a catalog command run
    #[must_use]
    pub const fn for_report(report: &RunReport) -> Self {
        match report.rows_returned {
            Some(rows) => Self::with_rows(report.execution_ms, rows),
            None => Self::new(report.execution_ms),
        }
    }

    /// Create new metadata with just execution time
    #[must_use]
    pub const fn new(execution_ms: u64) -> Self {
        Self { execution_ms, rows_returned: None }
    }

    /// Create new metadata with execution time and row count
    #[must_use]
    pub const fn with_rows(execution_ms: u64, rows_returned: usize) -> Self {
        Self { execution_ms, rows_returned: Some(rows_returned) }
    }
}

/// Output of one catalog command run
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RunEnvelope {
    /// The command ran; `data` is its notice or result popup
    Success(SuccessEnvelope<Outcome>),
    /// The gateway failed; the message is the error notice shown to the operator
    Failure(ErrorEnvelope),
}

impl RunEnvelope {
    /// Build the envelope for `report`
    #[must_use]
    pub fn from_report(category: &str, command: &str, report: RunReport) -> Self {
        if let (Some(code), Outcome::Notice(notice)) = (report.error_code, &report.outcome) {
            let info = ErrorInfo::new(code, notice.message());
            return Self::Failure(ErrorEnvelope::new(category, command, info));
        }

        let meta = Metadata::for_report(&report);
        Self::Success(SuccessEnvelope::new(category, command, report.outcome, meta))
    }

    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
