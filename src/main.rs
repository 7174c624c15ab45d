//! CMPS Console CLI Entry Point
//!
//! Subcommands:
//! - `interactive` (default) - Prompt-driven console
//! - `list` - Print the command catalog
//! - `run` - Run one catalog command with field values from the command line
//! - `connect` - Configure and validate the database connection
//!
//! `list`, `run` and `connect` print JSON envelopes on stdout. Logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use cmps_console::catalog::catalog;
use cmps_console::config::{resolve_settings, save_connection, ConfigLocation, StoredConnection};
use cmps_console::console::{run_interactive, run_once};
use cmps_console::gateway::DEFAULT_PORT;
use cmps_console::{
    ConnectionInfo, ConsoleError, ErrorEnvelope, Metadata, PostgresGateway, RunEnvelope, Screen,
    SuccessEnvelope,
};

/// CMPS Console - catalog-driven admin console for the CMPS database
#[derive(Parser)]
#[command(name = "cmps")]
#[command(about = "Catalog-driven administrative console for the CMPS examinations database")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive console (default)
    Interactive,

    /// List categories and commands
    List {
        /// Only list this category
        #[arg(long)]
        category: Option<String>,
    },

    /// Run a single command
    Run {
        #[arg(long)]
        category: String,

        #[arg(long)]
        command: String,

        /// Field value as `id=value`, repeatable
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Configure and validate the database connection
    Connect {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        #[arg(long)]
        database: Option<String>,

        #[arg(long)]
        user: Option<String>,

        /// Read the password from this environment variable instead of storing it
        #[arg(long)]
        password_env: Option<String>,

        /// Schema to run statements against
        #[arg(long)]
        namespace: Option<String>,

        /// Save to the global config instead of `.cmps/config.json`
        #[arg(long)]
        global: bool,
    },
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(id, _)| !id.is_empty())
        .map(|(id, value)| (id.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected id=value, got '{raw}'"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command.unwrap_or(Commands::Interactive) {
        Commands::Interactive => interactive().await,
        Commands::List { category } => Ok(list(category.as_deref())),
        Commands::Run { category, command, fields } => run(&category, &command, &fields).await,
        Commands::Connect { host, port, database, user, password_env, namespace, global } => {
            let stored = StoredConnection {
                host,
                port,
                database,
                user,
                password: None,
                password_env,
                namespace,
                timeout_ms: None,
            };
            let location = if global { ConfigLocation::Global } else { ConfigLocation::Local };
            connect(stored, location).await
        }
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn interactive() -> anyhow::Result<ExitCode> {
    let settings = match resolve_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e.message());
            return Ok(ExitCode::FAILURE);
        }
    };

    let gateway = Arc::new(PostgresGateway::new(settings));
    run_interactive(gateway, Screen::default()).await?;
    Ok(ExitCode::SUCCESS)
}

fn list(category: Option<&str>) -> ExitCode {
    let categories: Vec<_> = match category {
        None => catalog().categories.iter().collect(),
        Some(name) => match catalog().category(name) {
            Some(found) => vec![found],
            None => {
                let err = ConsoleError::lookup(format!("Unknown category '{name}'"));
                return print_error(&ErrorEnvelope::from_error(name, "list", &err));
            }
        },
    };

    print_success(&SuccessEnvelope::new(
        category.unwrap_or_default(),
        "list",
        categories,
        Metadata::new(0),
    ))
}

async fn run(
    category: &str,
    command: &str,
    fields: &[(String, String)],
) -> anyhow::Result<ExitCode> {
    let settings = match resolve_settings() {
        Ok(settings) => settings,
        Err(e) => return Ok(print_error(&ErrorEnvelope::from_error(category, command, &e))),
    };
    let gateway = PostgresGateway::new(settings);

    let report = match run_once(&gateway, category, command, fields).await {
        Ok(report) => report,
        Err(e) => return Ok(print_error(&ErrorEnvelope::from_error(category, command, &e))),
    };

    let envelope = RunEnvelope::from_report(category, command, report);
    if print_json(&envelope) && envelope.is_ok() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

#[derive(Serialize)]
struct ConnectData {
    #[serde(flatten)]
    info: ConnectionInfo,
    saved_to: String,
}

async fn connect(stored: StoredConnection, location: ConfigLocation) -> anyhow::Result<ExitCode> {
    let theme = ColorfulTheme::default();

    let host = match stored.host {
        Some(host) => host,
        None => Input::with_theme(&theme)
            .with_prompt("Host")
            .default("localhost".to_string())
            .interact_text()
            .context("Failed to read host")?,
    };
    let port = match stored.port {
        Some(port) => port,
        None => Input::with_theme(&theme)
            .with_prompt("Port")
            .default(DEFAULT_PORT)
            .interact_text()
            .context("Failed to read port")?,
    };
    let database = match stored.database {
        Some(database) => database,
        None => Input::with_theme(&theme)
            .with_prompt("Database")
            .interact_text()
            .context("Failed to read database")?,
    };
    let user = match stored.user {
        Some(user) => user,
        None => Input::with_theme(&theme)
            .with_prompt("User")
            .interact_text()
            .context("Failed to read user")?,
    };
    let password = match &stored.password_env {
        Some(_) => None,
        None => Some(
            Password::with_theme(&theme)
                .with_prompt("Password")
                .interact()
                .context("Failed to read password")?,
        ),
    };

    let stored = StoredConnection {
        host: Some(host),
        port: Some(port),
        database: Some(database),
        user: Some(user),
        password,
        ..stored
    };

    let result = async {
        let settings = stored.resolve()?;
        let info = PostgresGateway::new(settings).validate_connection().await?;
        let path = save_connection(&stored, location)?;
        Ok::<_, ConsoleError>(ConnectData { info, saved_to: path.display().to_string() })
    }
    .await;

    Ok(match result {
        Ok(data) => print_success(&SuccessEnvelope::new("", "connect", data, Metadata::new(0))),
        Err(e) => print_error(&ErrorEnvelope::from_error("", "connect", &e)),
    })
}

/// Print `value` as pretty JSON on stdout; `false` if it could not be serialized
fn print_json<T: Serialize>(value: &T) -> bool {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            true
        }
        Err(e) => {
            eprintln!("Could not serialize output: {e}");
            false
        }
    }
}

fn print_success<T: Serialize>(envelope: &SuccessEnvelope<T>) -> ExitCode {
    if print_json(envelope) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_error(envelope: &ErrorEnvelope) -> ExitCode {
    print_json(envelope);
    ExitCode::FAILURE
}
