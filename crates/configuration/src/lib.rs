//! # Tabula Configuration Crate
//!
//! Typed settings for the exporter and the reports, assembled from layered
//! sources with the `config` crate:
//!
//! 1. built-in defaults (see `settings`),
//! 2. an optional TOML file (`config.toml` unless told otherwise),
//! 3. `TABULA__*` environment variables (`TABULA__DATABASE__PASSWORD`, ...),
//! 4. explicit overrides, usually coming from the command line.
//!
//! The crate also owns the process-wide `tracing` subscriber setup in `logging`.

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment};
use std::path::{Path, PathBuf};

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use settings::{
    Compression, Config, DatabaseSettings, Driver, ExportSettings, LoggingSettings, ReportSettings,
};

/// Prefix of the environment variables recognised as configuration.
pub const ENV_PREFIX: &str = "TABULA";

/// Values that take precedence over every other source.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub database: Option<String>,
    pub driver: Option<Driver>,
    pub output_dir: Option<PathBuf>,
    pub top_n: Option<usize>,
}

/// Loads the application configuration.
///
/// The file at `path` is optional: a deployment can be configured entirely
/// through the environment. Missing required fields (host, user, database)
/// surface as a `LoadError`, inconsistent values as a `ValidationError`.
pub fn load_config(path: &Path, overrides: &Overrides) -> Result<Config, ConfigError> {
    let builder = config::Config::builder().add_source(config::File::from(path).required(false));
    assemble(builder, overrides)
}

/// Adds the environment and the overrides on top of `builder`, then deserializes
/// and validates the result.
fn assemble(
    builder: ConfigBuilder<DefaultState>,
    overrides: &Overrides,
) -> Result<Config, ConfigError> {
    let settings = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
        .set_override_option("database.host", overrides.host.clone())?
        .set_override_option("database.port", overrides.port.map(i64::from))?
        .set_override_option("database.user", overrides.user.clone())?
        .set_override_option("database.database", overrides.database.clone())?
        .set_override_option("database.driver", overrides.driver.map(|d| d.to_string()))?
        .set_override_option(
            "export.output_dir",
            overrides
                .output_dir
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        )?
        .set_override_option("reports.top_n", overrides.top_n.map(|n| n as i64))?
        .build()?;

    let config = settings.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

impl Config {
    /// Rejects settings that would only fail later, deep inside a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let db = &self.database;
        for (field, value) in [
            ("database.host", &db.host),
            ("database.user", &db.user),
            ("database.database", &db.database),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!("{field} must not be empty")));
            }
        }
        if db.connect_timeout.is_zero() || db.query_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "database timeouts must be greater than zero".to_string(),
            ));
        }
        if self.reports.top_n == 0 {
            return Err(ConfigError::ValidationError(
                "reports.top_n must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
