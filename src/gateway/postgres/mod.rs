//! `PostgreSQL` Execution Gateway
//!
//! This module implements [`ExecutionGateway`] for `PostgreSQL`.
//!
//! # Features
//! - One TCP connection per call, closed before the call returns
//! - `search_path` fixed to the configured namespace before every statement
//! - Autocommit: every statement is its own implicit transaction
//! - Driver-level parameter binding
//!
//! # Implementation Notes
//! - Uses `tokio-postgres` (async driver, requires tokio runtime)
//! - Raw string parameters are converted to the type the server inferred for
//!   each placeholder (integers, floats, bool, date, time, timestamp, text)
//! - NUMERIC goes through `rust_decimal` both ways, so grades keep their scale
//! - Result cells are rendered as text: NULL as `NULL`, BYTEA as Base64,
//!   TIME from its microsecond count so `24:00:00` survives
//! - Timeouts enforced via `tokio::time::timeout`; an expired statement is
//!   cancelled server-side and its connection task aborted

use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_postgres::types::{FromSql, ToSql, Type};
use tokio_postgres::{Client, Config, NoTls, Row};
use tracing::{debug, info, warn};

use crate::error::{ConsoleError, Result};
use crate::gateway::{ConnectionInfo, ConnectionSettings, ExecutionGateway, ResultSet};

/// Text shown for SQL NULL cells
pub const NULL_TEXT: &str = "NULL";

/// Upper bound on delivering a cancel request for an expired statement
const CANCEL_TIMEOUT: Duration = Duration::from_secs(2);

type BoundParam = Box<dyn ToSql + Sync + Send>;

/// `PostgreSQL` gateway over a fixed set of connection settings
#[derive(Debug, Clone)]
pub struct PostgresGateway {
    settings: ConnectionSettings,
}

impl PostgresGateway {
    #[must_use]
    pub const fn new(settings: ConnectionSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub const fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Open a connection and report who and where we are connected
    ///
    /// The connection is closed before returning.
    pub async fn validate_connection(&self) -> Result<ConnectionInfo> {
        let (client, driver) = self.connect().await?;

        let outcome = client
            .query_one("SELECT version(), current_database(), current_user", &[])
            .await
            .map_err(|e| {
                ConsoleError::connection_failed(format!(
                    "Failed to query server information: {}",
                    driver_message(&e)
                ))
            });

        release(client, driver).await;
        let row = outcome?;

        let version_string: String = row.get(0);

        // "PostgreSQL 15.3 on x86_64..." -> "15.3"
        let database_version =
            version_string.split_whitespace().nth(1).unwrap_or("unknown").to_string();

        Ok(ConnectionInfo { database_version, connected_database: row.get(1), user: row.get(2) })
    }

    async fn connect(&self) -> Result<(Client, JoinHandle<()>)> {
        let pg_config = build_pg_config(&self.settings)?;

        let (client, connection) = pg_config.connect(NoTls).await.map_err(|e| {
            ConsoleError::connection_failed(format!("Failed to connect to PostgreSQL: {e}"))
        })?;

        // Connection errors are not logged in detail to prevent credential leakage
        let driver = tokio::spawn(async move {
            if connection.await.is_err() {
                debug!("PostgreSQL connection closed with an error");
            }
        });

        Ok((client, driver))
    }
}

impl ExecutionGateway for PostgresGateway {
    async fn execute(
        &self,
        statement: &str,
        fetch_results: bool,
        params: &[String],
    ) -> Result<Option<ResultSet>> {
        let (client, driver) = self.connect().await?;
        let namespace = self.settings.namespace.as_str();

        debug!(params = params.len(), fetch_results, "executing statement");

        let start = Instant::now();
        let run = run_statement(&client, namespace, statement, fetch_results, params);
        let finished = match self.settings.timeout_ms {
            Some(timeout_ms) => tokio::time::timeout(Duration::from_millis(timeout_ms), run)
                .await
                .map_err(|_| timeout_ms),
            None => Ok(run.await),
        };

        let outcome = match finished {
            Ok(outcome) => {
                release(client, driver).await;
                outcome
            }
            Err(timeout_ms) => {
                abandon(client, driver).await;
                Err(ConsoleError::statement_failed(format!(
                    "Statement exceeded timeout of {timeout_ms}ms"
                )))
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            Ok(result) => info!(
                elapsed_ms,
                rows = result.as_ref().map_or(0, ResultSet::row_count),
                "statement executed"
            ),
            Err(e) => warn!(elapsed_ms, code = e.error_code(), "statement failed"),
        }

        outcome
    }
}

/// Close the client and wait for the connection task to wind down
async fn release(client: Client, driver: JoinHandle<()>) {
    drop(client);
    if driver.await.is_err() {
        debug!("PostgreSQL connection task did not finish cleanly");
    }
}

/// Cancel the running statement and stop the connection task without waiting
/// for the server to answer it
async fn abandon(client: Client, driver: JoinHandle<()>) {
    let cancel = client.cancel_token();
    match tokio::time::timeout(CANCEL_TIMEOUT, cancel.cancel_query(NoTls)).await {
        Ok(Ok(())) => debug!("cancel request delivered"),
        Ok(Err(_)) => debug!("cancel request failed"),
        Err(_) => debug!("cancel request timed out"),
    }

    drop(client);
    driver.abort();
}

/// Build `PostgreSQL` connection config from `ConnectionSettings`
fn build_pg_config(settings: &ConnectionSettings) -> Result<Config> {
    for (name, value) in
        [("host", &settings.host), ("database", &settings.database), ("user", &settings.user)]
    {
        if value.trim().is_empty() {
            return Err(ConsoleError::config(format!("PostgreSQL requires '{name}' parameter")));
        }
    }

    let mut pg_config = Config::new();
    pg_config
        .host(&settings.host)
        .port(settings.port)
        .user(&settings.user)
        .password(&settings.password)
        .dbname(&settings.database)
        .application_name("cmps-console");

    if let Some(timeout_ms) = settings.timeout_ms {
        pg_config.connect_timeout(Duration::from_millis(timeout_ms));
    }

    Ok(pg_config)
}

async fn run_statement(
    client: &Client,
    namespace: &str,
    statement: &str,
    fetch_results: bool,
    params: &[String],
) -> Result<Option<ResultSet>> {
    client
        .batch_execute(&format!("SET search_path TO {}", quote_identifier(namespace)))
        .await
        .map_err(|e| {
            ConsoleError::statement_failed(format!(
                "Failed to set search path: {}",
                driver_message(&e)
            ))
        })?;

    let prepared = client
        .prepare(statement)
        .await
        .map_err(|e| ConsoleError::statement_failed(driver_message(&e)))?;

    let bound = bind_params(prepared.params(), params)?;
    let refs: Vec<&(dyn ToSql + Sync)> =
        bound.iter().map(|param| &**param as &(dyn ToSql + Sync)).collect();

    if fetch_results {
        let rows = client
            .query(&prepared, &refs)
            .await
            .map_err(|e| ConsoleError::statement_failed(driver_message(&e)))?;

        let columns = prepared.columns().iter().map(|c| c.name().to_string()).collect();
        let rows = rows.iter().map(row_to_text).collect::<Result<Vec<_>>>()?;

        Ok(Some(ResultSet::new(columns, rows)))
    } else {
        client
            .execute(&prepared, &refs)
            .await
            .map_err(|e| ConsoleError::statement_failed(driver_message(&e)))?;

        Ok(None)
    }
}

/// Prefer the server's own message over the driver's wrapper text
fn driver_message(e: &tokio_postgres::Error) -> String {
    e.as_db_error().map_or_else(|| e.to_string(), |db| db.message().to_string())
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Convert raw parameters to the types the server inferred for the placeholders
fn bind_params(types: &[Type], raw: &[String]) -> Result<Vec<BoundParam>> {
    if types.len() != raw.len() {
        return Err(ConsoleError::statement_failed(format!(
            "Statement expects {} parameters, got {}",
            types.len(),
            raw.len()
        )));
    }

    types
        .iter()
        .zip(raw)
        .enumerate()
        .map(|(idx, (ty, value))| {
            bind_param(ty, value).map_err(|reason| {
                ConsoleError::statement_failed(format!(
                    "Parameter ${} ({}): {reason}",
                    idx + 1,
                    ty.name()
                ))
            })
        })
        .collect()
}

fn bind_param(ty: &Type, raw: &str) -> std::result::Result<BoundParam, String> {
    let value = raw.trim();

    let bound: BoundParam = match *ty {
        Type::BOOL => Box::new(parse_bool(value)?),
        Type::INT2 => Box::new(parse_number::<i16>(value)?),
        Type::INT4 => Box::new(parse_number::<i32>(value)?),
        Type::INT8 => Box::new(parse_number::<i64>(value)?),
        Type::FLOAT4 => Box::new(parse_number::<f32>(value)?),
        Type::FLOAT8 => Box::new(parse_number::<f64>(value)?),
        Type::NUMERIC => Box::new(parse_number::<Decimal>(value)?),
        Type::DATE => Box::new(
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map_err(|_| "expected a YYYY-MM-DD date".to_string())?,
        ),
        Type::TIME => Box::new(parse_time(value)?),
        Type::TIMESTAMP => Box::new(
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .map_err(|_| "expected a YYYY-MM-DD HH:MM:SS timestamp".to_string())?,
        ),
        _ if <String as ToSql>::accepts(ty) => Box::new(raw.to_string()),
        _ => {
            return Err(format!(
                "unsupported parameter type '{}', cast the placeholder to text",
                ty.name()
            ))
        }
    };

    Ok(bound)
}

fn parse_number<T: std::str::FromStr>(value: &str) -> std::result::Result<T, String> {
    value.parse().map_err(|_| "expected a number".to_string())
}

fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => Err("expected true or false".to_string()),
    }
}

fn parse_time(value: &str) -> std::result::Result<NaiveTime, String> {
    // PostgreSQL accepts 24:00:00; chrono spells it as a leap second
    if value == "24:00:00" || value == "24:00" {
        return NaiveTime::from_hms_nano_opt(23, 59, 59, 1_000_000_000)
            .ok_or_else(|| "expected an HH:MM:SS time".to_string());
    }

    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| "expected an HH:MM:SS time".to_string())
}

/// Convert a `PostgreSQL` row to display text
fn row_to_text(row: &Row) -> Result<Vec<String>> {
    (0..row.len()).map(|idx| cell_to_text(row, idx)).collect()
}

/// Convert one `PostgreSQL` value to display text
fn cell_to_text(row: &Row, idx: usize) -> Result<String> {
    let col_type = row.columns()[idx].type_();

    match *col_type {
        Type::BOOL => read(row, idx, "boolean", |v: bool| v.to_string()),
        Type::INT2 => read(row, idx, "i16", |v: i16| v.to_string()),
        Type::INT4 => read(row, idx, "i32", |v: i32| v.to_string()),
        Type::INT8 => read(row, idx, "i64", |v: i64| v.to_string()),
        Type::FLOAT4 => read(row, idx, "f32", |v: f32| v.to_string()),
        Type::FLOAT8 => read(row, idx, "f64", |v: f64| v.to_string()),
        Type::NUMERIC => read(row, idx, "numeric", |v: Decimal| v.to_string()),
        Type::VARCHAR | Type::TEXT | Type::BPCHAR | Type::NAME => {
            read(row, idx, "string", |v: String| v)
        }
        Type::JSON | Type::JSONB => read(row, idx, "JSON", |v: serde_json::Value| v.to_string()),
        Type::BYTEA => read(row, idx, "bytea", |v: Vec<u8>| {
            base64::engine::general_purpose::STANDARD.encode(v)
        }),
        Type::TIMESTAMP => read(row, idx, "timestamp", |v: NaiveDateTime| {
            v.format("%Y-%m-%d %H:%M:%S").to_string()
        }),
        Type::TIMESTAMPTZ => read(row, idx, "timestamptz", |v: DateTime<Utc>| v.to_rfc3339()),
        Type::DATE => read(row, idx, "date", |v: NaiveDate| v.format("%Y-%m-%d").to_string()),
        Type::TIME => read(row, idx, "time", |v: TimeOfDay| v.to_string()),
        Type::UUID => read(row, idx, "UUID", |v: uuid::Uuid| v.to_string()),
        _ => {
            let value: Option<String> = row.try_get(idx).map_err(|e| {
                ConsoleError::statement_failed(format!(
                    "Failed to convert PostgreSQL type '{}' to text: {e}",
                    col_type.name()
                ))
            })?;
            Ok(value.unwrap_or_else(|| NULL_TEXT.to_string()))
        }
    }
}

fn read<'a, T, F>(row: &'a Row, idx: usize, kind: &str, render: F) -> Result<String>
where
    T: FromSql<'a>,
    F: FnOnce(T) -> String,
{
    let value: Option<T> = row.try_get(idx).map_err(|e| {
        ConsoleError::statement_failed(format!("Failed to get {kind} value: {e}"))
    })?;

    Ok(value.map_or_else(|| NULL_TEXT.to_string(), render))
}

/// TIME value kept as microseconds since midnight
///
/// `NaiveTime` wraps `24:00:00` to midnight; the raw count does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TimeOfDay(i64);

impl<'a> FromSql<'a> for TimeOfDay {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        let bytes: [u8; 8] = raw.try_into().map_err(|_| "invalid time length")?;
        Ok(Self(i64::from_be_bytes(bytes)))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::TIME
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let seconds = self.0.div_euclid(1_000_000);
        write!(f, "{:02}:{:02}:{:02}", seconds / 3600, seconds % 3600 / 60, seconds % 60)
    }
}
