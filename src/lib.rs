//! CMPS Console - Catalog-Driven Database Admin Console
//!
//! A single-operator console for the CMPS exam administration database. The
//! operator picks a category, then a command, fills in a short form, and the
//! console runs the command's statement and shows what comes back.
//!
//! # Pipeline
//! Command Catalog -> Form/Validation -> Execution & Result Presentation.
//! Every command is data: its fields, its statement template and its result
//! labels live in the catalog, and one generic dispatcher drives them all.
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`validation`] - Keystroke gate and time-of-day normalization
//! - [`catalog`] - The static command catalog
//! - [`form`] - Form builder and parameter marshaling
//! - [`gateway`] - Execution gateway trait and the `PostgreSQL` gateway
//! - [`present`] - Result popup sizing and text rendering
//! - [`dispatch`] - The command state machine
//! - [`config`] - Connection settings resolution
//! - [`output`] - JSON output envelopes
//! - [`console`] - Terminal front end

pub mod catalog;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod form;
pub mod gateway;
pub mod output;
pub mod present;
pub mod validation;

// Re-export commonly used types for convenience
pub use catalog::{catalog, Catalog, CommandSpec, FieldKind, FieldSpec};
pub use config::{resolve_settings, save_connection, ConfigLocation, StoredConnection};
pub use dispatch::{Dispatcher, Notice, Outcome, State, Submission};
pub use error::{ConsoleError, Result};
pub use form::Form;
pub use gateway::{ConnectionInfo, ConnectionSettings, ExecutionGateway, ResultSet};
pub use output::{ErrorEnvelope, ErrorInfo, Metadata, RunEnvelope, SuccessEnvelope};
pub use present::{present, ResultPopup, Screen};
pub use validation::{complete_time_of_day, normalize_time_of_day, validate_keystroke, TimeBuffer};

#[cfg(feature = "postgres")]
pub use gateway::postgres::PostgresGateway;
