use analytics::{CountryReport, SalesReport};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use configuration::{Config, Driver, Overrides};
use database::{DbHandle, repository};
use exporter::TableExporter;
use std::path::PathBuf;
use std::process::ExitCode;

/// The main entry point for the Tabula exporter and reports.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // A .env file is optional; the environment may already carry everything.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Could not read the .env file: {e}");
        }
    }

    // Parse command-line arguments
    let cli = Cli::parse();

    let config = match configuration::load_config(&cli.connection.config, &overrides(&cli)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Keep the guard alive so the file writer flushes on exit.
    let _log_guard = match configuration::logging::init_tracing(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Could not initialise logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    let command = cli.command.unwrap_or(Commands::Run(RunArgs::default()));
    match execute(command, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            tracing::warn!("Finished with failed steps.");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Aborted.");
            ExitCode::FAILURE
        }
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Snapshots a database into Parquet files and prints sales reports.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Defaults to `run` when omitted.
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    connection: ConnectionArgs,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Database server host name.
    #[arg(long, global = true)]
    host: Option<String>,

    /// Database server port (defaults to the driver's port).
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Login user name. The password is only read from config or environment.
    #[arg(long, global = true)]
    user: Option<String>,

    /// Database name.
    #[arg(long, global = true)]
    database: Option<String>,

    /// Database driver.
    #[arg(long, global = true, value_enum)]
    driver: Option<Driver>,
}

#[derive(Subcommand)]
enum Commands {
    /// Export every table, then print the country and sales reports.
    Run(RunArgs),
    /// Export tables to Parquet files only.
    Export(ExportArgs),
    /// Print the customers-per-country report.
    Customers(ReportArgs),
    /// Print the sales report.
    Sales(ReportArgs),
    /// List the tables the exporter would see.
    Tables,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Directory the Parquet files are written to.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// How many rows each top-N view keeps.
    #[arg(long)]
    top: Option<usize>,
}

#[derive(Args)]
struct ExportArgs {
    /// Directory the Parquet files are written to.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Only export this table (repeatable).
    #[arg(long = "table")]
    tables: Vec<String>,
}

#[derive(Args)]
struct ReportArgs {
    /// How many rows each top-N view keeps.
    #[arg(long)]
    top: Option<usize>,
}

fn overrides(cli: &Cli) -> Overrides {
    let mut overrides = Overrides {
        host: cli.connection.host.clone(),
        port: cli.connection.port,
        user: cli.connection.user.clone(),
        database: cli.connection.database.clone(),
        driver: cli.connection.driver,
        ..Overrides::default()
    };
    match &cli.command {
        Some(Commands::Run(args)) => {
            overrides.output_dir = args.output_dir.clone();
            overrides.top_n = args.top;
        }
        Some(Commands::Export(args)) => overrides.output_dir = args.output_dir.clone(),
        Some(Commands::Customers(args) | Commands::Sales(args)) => overrides.top_n = args.top,
        Some(Commands::Tables) | None => {}
    }
    overrides
}

// ==============================================================================
// Command Logic
// ==============================================================================

/// Opens the connection, runs the steps of `command` in order and closes it.
///
/// Returns `Ok(false)` when at least one step failed; the remaining steps
/// still ran.
async fn execute(command: Commands, mut config: Config) -> anyhow::Result<bool> {
    let mut db = DbHandle::new(config.database.clone());
    db.open()
        .await
        .context("Could not connect to the source database")?;

    let top_n = config.reports.top_n;
    let ok = match command {
        Commands::Run(_) => {
            let exported = export_tables(&mut db, &config).await;
            let countries = country_report(&mut db, top_n).await;
            let sales = sales_report(&mut db, top_n).await;
            exported && countries && sales
        }
        Commands::Export(args) => {
            if !args.tables.is_empty() {
                config.export.tables = args.tables;
            }
            export_tables(&mut db, &config).await
        }
        Commands::Customers(_) => country_report(&mut db, top_n).await,
        Commands::Sales(_) => sales_report(&mut db, top_n).await,
        Commands::Tables => list_tables(&mut db).await,
    };

    db.close().await;
    Ok(ok)
}

async fn export_tables(db: &mut DbHandle, config: &Config) -> bool {
    let exporter = TableExporter::new(&config.export);
    match exporter.export(&mut *db).await {
        Ok(summary) => {
            println!(
                "Exported {} tables ({} rows) to {}",
                summary.written.len(),
                summary.total_rows(),
                exporter.output_dir().display()
            );
            for failed in &summary.failed {
                println!("Skipped {}: {}", failed.table, failed.error);
            }
            summary.is_complete()
        }
        Err(e) => {
            tracing::error!(error = %e, "Export aborted.");
            false
        }
    }
}

async fn country_report(db: &mut DbHandle, top_n: usize) -> bool {
    match CountryReport::run(db, top_n).await {
        Ok(report) => {
            println!("{report}");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Country report failed.");
            false
        }
    }
}

async fn sales_report(db: &mut DbHandle, top_n: usize) -> bool {
    match SalesReport::run(db, top_n).await {
        Ok(report) => {
            println!("{report}");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Sales report failed.");
            false
        }
    }
}

async fn list_tables(db: &mut DbHandle) -> bool {
    match repository::list_tables(db).await {
        Ok(tables) => {
            for table in tables {
                println!("{table}");
            }
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Could not list tables.");
            false
        }
    }
}
