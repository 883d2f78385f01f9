use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseSettings,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub reports: ReportSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Everything needed to open a session against the source database.
#[derive(Clone, Deserialize)]
pub struct DatabaseSettings {
    pub host: String,
    /// Falls back to the driver's well-known port when absent.
    #[serde(default)]
    pub port: Option<u16>,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    #[serde(default)]
    pub driver: Driver,
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Upper bound for a single statement, including fetching every row.
    #[serde(default = "default_query_timeout", with = "humantime_serde")]
    pub query_timeout: Duration,
    /// Accept the server's TLS certificate without validating it (SQL Server only).
    #[serde(default)]
    pub trust_server_certificate: bool,
}

impl DatabaseSettings {
    /// The configured port, or the default port of the selected driver.
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or_else(|| self.driver.default_port())
    }
}

// Hand-written so the password never ends up in a log line.
impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("driver", &self.driver)
            .field("connect_timeout", &self.connect_timeout)
            .field("query_timeout", &self.query_timeout)
            .field("trust_server_certificate", &self.trust_server_certificate)
            .finish()
    }
}

/// The database driver used to reach the source database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    /// Microsoft SQL Server over TDS.
    #[default]
    #[serde(alias = "mssql", alias = "sqlserver", alias = "ODBC Driver 17 for SQL Server")]
    #[cfg_attr(feature = "clap", value(alias = "mssql"))]
    SqlServer,
    /// PostgreSQL.
    #[serde(alias = "postgresql", alias = "pg")]
    #[cfg_attr(feature = "clap", value(alias = "postgresql"))]
    Postgres,
}

impl Driver {
    pub fn default_port(&self) -> u16 {
        match self {
            Driver::SqlServer => 1433,
            Driver::Postgres => 5432,
        }
    }

    /// The URL scheme used when rendering a connection string for this driver.
    pub fn scheme(&self) -> &'static str {
        match self {
            Driver::SqlServer => "mssql",
            Driver::Postgres => "postgres",
        }
    }

    /// The client library identifier carried in the `driver` query parameter.
    pub fn client_name(&self) -> &'static str {
        match self {
            Driver::SqlServer => "tiberius",
            Driver::Postgres => "sqlx-postgres",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::SqlServer => f.write_str("sql_server"),
            Driver::Postgres => f.write_str("postgres"),
        }
    }
}

impl FromStr for Driver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sql_server" | "sqlserver" | "mssql" | "odbc driver 17 for sql server" => {
                Ok(Driver::SqlServer)
            }
            "postgres" | "postgresql" | "pg" => Ok(Driver::Postgres),
            other => Err(format!("unknown database driver '{other}'")),
        }
    }
}

/// Where and how the table snapshots are written.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub compression: Compression,
    /// Restricts the export to these tables. Empty means every table.
    #[serde(default)]
    pub tables: Vec<String>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            compression: Compression::default(),
            tables: Vec::new(),
        }
    }
}

/// Parquet page compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    Uncompressed,
    #[default]
    Snappy,
    Zstd,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportSettings {
    /// How many groups each "top N" view keeps.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// An `EnvFilter` directive. `RUST_LOG` takes precedence when it is set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// When set, logs are also written to a daily-rolling file in this directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            file_prefix: default_log_file_prefix(),
        }
    }
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_query_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("parquet_tables")
}

fn default_top_n() -> usize {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file_prefix() -> String {
    "tabula.log".to_string()
}
