//! Layered service configuration
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML file
//! (`pharmacy-server.toml` unless `--config` says otherwise), environment
//! variables prefixed `PHARMACY__` and finally command line flags.
//! `DATABASE_URL` is accepted as the default database url.

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use database_layer::PoolSettings;
use logger_redacted::RedactionConfig;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "pharmacy-server.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: PoolSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    /// Browser origins allowed by CORS. Empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl ServerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Colored output on a terminal, JSON otherwise
    #[default]
    Auto,
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub redaction: RedactionConfig,
}

/// Values taken from the command line; they win over every other source.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub verbose: bool,
}

impl Settings {
    /// Load settings from all sources. A missing config file is not an error
    /// unless its path was given explicitly.
    pub fn load(config_path: Option<&str>, overrides: &CliOverrides) -> Result<Self> {
        let (path, required) = match config_path {
            Some(path) => (path, true),
            None => (DEFAULT_CONFIG_FILE, false),
        };

        let database_url = std::env::var("DATABASE_URL").unwrap_or_default();

        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("server.cors_origins", Vec::<String>::new())?
            .set_default("database.url", database_url)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.acquire_timeout_secs", 10)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "auto")?
            .add_source(File::with_name(path).required(required))
            .add_source(
                Environment::with_prefix("PHARMACY")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            );

        builder = builder
            .set_override_option("server.host", overrides.host.clone())?
            .set_override_option("server.port", overrides.port.map(i64::from))?;
        if overrides.verbose {
            builder = builder.set_override("logging.level", "debug")?;
        }

        let settings: Settings = builder
            .build()
            .with_context(|| format!("failed to read configuration from {}", path))?
            .try_deserialize()
            .context("invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            bail!("database url is not set (use PHARMACY__DATABASE__URL or DATABASE_URL)");
        }
        if self.server.port == 0 {
            bail!("server.port must be greater than zero");
        }
        if self.server.request_timeout_secs == 0 {
            bail!("server.request_timeout_secs must be greater than zero");
        }
        if self.database.max_connections == 0 {
            bail!("database.max_connections must be greater than zero");
        }
        if self.database.min_connections > self.database.max_connections {
            bail!("database.min_connections cannot exceed database.max_connections");
        }
        Ok(())
    }
}
