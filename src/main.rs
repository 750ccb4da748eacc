//! Binary entry point for sqlwrap.
//!
//! This binary provides a command-line interface over the data-access facade.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlwrap::cli::{self, OutputFormat};
use sqlwrap::config::{BackendKind, SqlWrapConfig};
use sqlwrap::observability::{self, LoggingConfig};
use sqlwrap::services::BackendFactory;
use std::path::PathBuf;
use std::process::ExitCode;

/// Environment variable naming a configuration file.
const ENV_CONFIG_PATH: &str = "SQLWRAP_CONFIG_PATH";

/// sqlwrap - one data-access surface for SQLite, MySQL, ODBC and PostgreSQL.
#[derive(Parser)]
#[command(name = "sqlwrap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backend: sqlite, mysql, odbc or postgres.
    #[arg(short, long, global = true)]
    backend: Option<String>,

    /// Raw connection string for the backend.
    #[arg(long, global = true)]
    connection: Option<String>,

    /// Output format: table, json or csv.
    #[arg(short, long, global = true, default_value = "table")]
    format: String,

    /// Substitute type defaults for NULL scalars.
    #[arg(long, global = true)]
    default_on_null: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Execute a statement and print the affected-row count.
    Exec {
        /// SQL statement.
        sql: String,

        /// Positional parameter (repeatable): null, integer, real or text.
        #[arg(short, long = "param")]
        params: Vec<String>,
    },

    /// Execute a statement and print its first value.
    Scalar {
        /// SQL statement.
        sql: String,

        /// Positional parameter (repeatable): null, integer, real or text.
        #[arg(short, long = "param")]
        params: Vec<String>,
    },

    /// Execute a query and print every row.
    Query {
        /// SQL statement.
        sql: String,

        /// Positional parameter (repeatable): null, integer, real or text.
        #[arg(short, long = "param")]
        params: Vec<String>,
    },

    /// Open and close the connection.
    Ping,
}

fn main() -> ExitCode {
    // A missing .env file is not an error.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = observability::init_logging(&LoggingConfig::from_env(cli.verbose)) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let format: OutputFormat = cli.format.parse()?;
    let mut db = BackendFactory::connect(&config)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let result = match cli.command {
        Commands::Exec { sql, params } => {
            cli::cmd_exec(&mut db, &mut out, &sql, &cli::parse_params(&params))
        },
        Commands::Scalar { sql, params } => {
            cli::cmd_scalar(&mut db, &mut out, &sql, &cli::parse_params(&params), format)
        },
        Commands::Query { sql, params } => {
            cli::cmd_query(&mut db, &mut out, &sql, &cli::parse_params(&params), format)
        },
        Commands::Ping => cli::cmd_ping(&mut db, &mut out),
    };
    result.map_err(|e| anyhow::anyhow!("{e}"))
}

/// Loads configuration: file, then environment, then command-line flags.
fn load_config(cli: &Cli) -> anyhow::Result<SqlWrapConfig> {
    let config = if let Some(path) = &cli.config {
        SqlWrapConfig::load_from_file(path)?
    } else if let Some(path) = std::env::var(ENV_CONFIG_PATH)
        .ok()
        .filter(|p| !p.trim().is_empty())
    {
        SqlWrapConfig::load_from_file(&PathBuf::from(path))?
    } else {
        SqlWrapConfig::load_default()
    };

    let mut config = config.with_env_overrides()?;
    if let Some(name) = &cli.backend {
        let kind = BackendKind::parse(name)
            .with_context(|| format!("unknown backend '{name}'"))?;
        config = config.with_backend_kind(kind);
    }
    if let Some(cs) = &cli.connection {
        config.backend.set_connection_string(cs.clone());
    }
    if cli.default_on_null {
        config.default_on_null = true;
    }
    Ok(config)
}
