//! Configuration Management
//!
//! This module loads and saves the database connection settings.
//!
//! # Configuration Locations
//! - Local: `.cmps/config.json` (per working directory)
//! - Global: `~/.config/cmps/connection.json` (per user)
//!
//! # Resolution Precedence
//! 1. `CMPS_DB_*` environment variables (highest priority)
//! 2. Local config file (`.cmps/config.json`)
//! 3. Global config file (`~/.config/cmps/connection.json`)
//!
//! Each layer may set any subset of the settings; a higher layer overrides
//! the settings it sets and leaves the rest alone (`password` and
//! `password_env` count as one setting). Settings are resolved once
//! at startup. Missing host, database, user or password is fatal.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConsoleError, Result};
use crate::gateway::{ConnectionSettings, DEFAULT_NAMESPACE, DEFAULT_PORT};

pub const ENV_HOST: &str = "CMPS_DB_HOST";
pub const ENV_PORT: &str = "CMPS_DB_PORT";
pub const ENV_DATABASE: &str = "CMPS_DB_NAME";
pub const ENV_USER: &str = "CMPS_DB_USER";
pub const ENV_PASSWORD: &str = "CMPS_DB_PASSWORD";
pub const ENV_NAMESPACE: &str = "CMPS_DB_SCHEMA";
pub const ENV_TIMEOUT_MS: &str = "CMPS_DB_TIMEOUT_MS";

/// Stored connection configuration
///
/// Every field is optional so that files and the environment can each supply
/// part of the settings. The password may be referenced through an
/// environment variable instead of being stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConnection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable name for password (if not storing password directly)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// Schema every statement runs against (default `cmps_db`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl StoredConnection {
    /// Layer `higher` on top of `self`; settings present in `higher` win
    ///
    /// `password` and `password_env` are one setting: a layer that names
    /// either replaces both.
    #[must_use]
    pub fn overlay(self, higher: Self) -> Self {
        let (password, password_env) =
            if higher.password.is_some() || higher.password_env.is_some() {
                (higher.password, higher.password_env)
            } else {
                (self.password, self.password_env)
            };

        Self {
            host: higher.host.or(self.host),
            port: higher.port.or(self.port),
            database: higher.database.or(self.database),
            user: higher.user.or(self.user),
            password,
            password_env,
            namespace: higher.namespace.or(self.namespace),
            timeout_ms: higher.timeout_ms.or(self.timeout_ms),
        }
    }

    /// Read the `CMPS_DB_*` variables through `lookup`
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let port = get(ENV_PORT)
            .map(|raw| {
                raw.parse::<u16>().map_err(|_| {
                    ConsoleError::config(format!("{ENV_PORT} must be a port number, got '{raw}'"))
                })
            })
            .transpose()?;

        let timeout_ms = get(ENV_TIMEOUT_MS)
            .map(|raw| {
                raw.parse::<u64>().map_err(|_| {
                    ConsoleError::config(format!(
                        "{ENV_TIMEOUT_MS} must be a number of milliseconds, got '{raw}'"
                    ))
                })
            })
            .transpose()?;

        Ok(Self {
            host: get(ENV_HOST),
            port,
            database: get(ENV_DATABASE),
            user: get(ENV_USER),
            password: get(ENV_PASSWORD),
            password_env: None,
            namespace: get(ENV_NAMESPACE),
            timeout_ms,
        })
    }

    /// Read the `CMPS_DB_*` variables from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    /// Resolve into complete connection settings
    pub fn resolve(&self) -> Result<ConnectionSettings> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve, reading `password_env` through `lookup`
    pub fn resolve_with<F>(&self, lookup: F) -> Result<ConnectionSettings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let password = match (&self.password, &self.password_env) {
            (Some(password), _) => Some(password.clone()),
            (None, Some(env_var)) => Some(lookup(env_var).ok_or_else(|| {
                ConsoleError::config(format!(
                    "Environment variable {env_var} not found for password"
                ))
            })?),
            (None, None) => None,
        };

        let mut missing = Vec::new();
        for (name, value) in [
            ("host", &self.host),
            ("database", &self.database),
            ("user", &self.user),
            ("password", &password),
        ] {
            if value.as_deref().map_or(true, str::is_empty) {
                missing.push(name);
            }
        }

        if !missing.is_empty() {
            return Err(ConsoleError::config(format!(
                "missing connection setting(s): {}. Run 'cmps connect' or set the CMPS_DB_* \
                 environment variables.",
                missing.join(", ")
            )));
        }

        Ok(ConnectionSettings {
            host: self.host.clone().unwrap_or_default(),
            port: self.port.unwrap_or(DEFAULT_PORT),
            database: self.database.clone().unwrap_or_default(),
            user: self.user.clone().unwrap_or_default(),
            password: password.unwrap_or_default(),
            namespace: self.namespace.clone().unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            timeout_ms: self.timeout_ms,
        })
    }
}

/// Configuration file location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLocation {
    /// Local config: `.cmps/config.json`
    Local,
    /// Global config: `~/.config/cmps/connection.json`
    Global,
}

impl ConfigLocation {
    pub fn path(self) -> Result<PathBuf> {
        match self {
            Self::Local => local_config_path(),
            Self::Global => global_config_path(),
        }
    }
}

/// Get path to local config file (`.cmps/config.json`)
pub fn local_config_path() -> Result<PathBuf> {
    let current_dir = std::env::current_dir().map_err(|e| {
        ConsoleError::config(format!("Could not determine current directory: {e}"))
    })?;

    Ok(current_dir.join(".cmps").join("config.json"))
}

/// Get path to global config file (`~/.config/cmps/connection.json`)
pub fn global_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConsoleError::config("Could not determine user config directory"))?;

    Ok(config_dir.join("cmps").join("connection.json"))
}

/// Load a stored connection from a config file
///
/// A missing file is an empty layer, not an error.
pub fn load_stored(path: &Path) -> Result<StoredConnection> {
    if !path.exists() {
        return Ok(StoredConnection::default());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| ConsoleError::config(format!("Could not read config file: {e}")))?;

    serde_json::from_str(&contents).map_err(|e| {
        ConsoleError::config(format!("Invalid config file format in {}: {e}", path.display()))
    })
}

/// Save a stored connection to a config file, creating its directory
pub fn save_stored(path: &Path, stored: &StoredConnection) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ConsoleError::config(format!("Could not create config directory: {e}"))
        })?;
    }

    let contents = serde_json::to_string_pretty(stored)
        .map_err(|e| ConsoleError::config(format!("Could not serialize config: {e}")))?;

    fs::write(path, contents)
        .map_err(|e| ConsoleError::config(format!("Could not write config file: {e}")))?;

    Ok(())
}

/// Merge the global file, the local file and the environment, in that order
pub fn load_with_precedence() -> Result<StoredConnection> {
    // Without a user config directory there is simply no global layer
    let global = match global_config_path() {
        Ok(path) => load_stored(&path)?,
        Err(_) => StoredConnection::default(),
    };
    let local = load_stored(&local_config_path()?)?;
    let env = StoredConnection::from_env()?;

    Ok(global.overlay(local).overlay(env))
}

/// Resolve the connection settings the console runs with
pub fn resolve_settings() -> Result<ConnectionSettings> {
    load_with_precedence()?.resolve()
}

/// Save a connection to the chosen config file, returning its path
pub fn save_connection(stored: &StoredConnection, location: ConfigLocation) -> Result<PathBuf> {
    let path = location.path()?;
    save_stored(&path, stored)?;
    Ok(path)
}
