//! Execution Gateway Trait and Core Types
//!
//! The gateway runs exactly one parameterized statement per call.
//!
//! # Stateless Design
//! Every call opens its own connection, fixes the schema namespace, runs the
//! statement in autocommit mode and releases the connection before returning,
//! on success and on failure alike. There is no pooling and no retry.
//!
//! # Parameters
//! Parameters are raw strings in placeholder order. They are always bound by
//! the driver and never spliced into the statement text.

use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::error::Result;

#[cfg(feature = "postgres")]
pub mod postgres;

/// Namespace every statement runs against unless configured otherwise
pub const DEFAULT_NAMESPACE: &str = "cmps_db";

/// Default PostgreSQL port
pub const DEFAULT_PORT: u16 = 5432;

/// Connection settings for the gateway
///
/// Read once at startup and shared read-only for the process lifetime.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub database: String,

    pub user: String,

    /// WARNING: Sensitive data, do not log or include in error messages
    pub password: String,

    /// Schema every statement runs against
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Upper bound on one statement round trip, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl ConnectionSettings {
    /// Settings with the default port and namespace and no timeout
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            database: database.into(),
            user: user.into(),
            password: password.into(),
            namespace: default_namespace(),
            timeout_ms: None,
        }
    }
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("namespace", &self.namespace)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Connection information returned after successful connection validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Database server version string
    pub database_version: String,

    /// Name of the connected database
    pub connected_database: String,

    /// Connected user name
    pub user: String,
}

/// Rows returned by a statement, every cell rendered as text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Column names reported by the driver
    pub columns: Vec<String>,

    pub rows: Vec<Vec<String>>,
}

impl ResultSet {
    #[must_use]
    pub const fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// One row holding one cell
    #[must_use]
    pub fn is_single_value(&self) -> bool {
        self.rows.len() == 1 && self.rows[0].len() == 1
    }
}

/// Runs one statement against the database
///
/// Implementations must release every resource they acquire before the
/// returned future completes, whatever the outcome.
pub trait ExecutionGateway: Send + Sync {
    /// Execute `statement` with `params` bound positionally
    ///
    /// Returns the rows when `fetch_results` is set, `None` otherwise.
    fn execute(
        &self,
        statement: &str,
        fetch_results: bool,
        params: &[String],
    ) -> impl Future<Output = Result<Option<ResultSet>>> + Send;
}
