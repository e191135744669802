//! `roots`: command-line access to the Roots & Routes warehouse
//!
//! Builds one connection manager from the startup settings, runs a single
//! command through it and closes the connection on the way out.

mod commands;
mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roots_connection::{ConnectionManager, DriverFactory, ManagerError};
use roots_drivers::DriverRegistry;
use roots_settings::Settings;
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit status when the warehouse cannot be reached
const EXIT_UNAVAILABLE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "roots", version, about = "Query the Roots & Routes tourism warehouse")]
struct Cli {
    /// Settings file (defaults to the per-user settings.toml)
    #[arg(long, global = true, env = "ROOTS_CONFIG")]
    config: Option<PathBuf>,

    /// Also write JSON logs to the rolling log directory
    #[arg(long, global = true)]
    log_json: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open (or reuse) the warehouse connection and report its latency
    Ping,
    /// Run a query and print the rows
    Query {
        sql: String,
        /// Positional bind parameter, repeatable
        #[arg(short = 'p', long = "param", value_name = "VALUE")]
        params: Vec<String>,
        /// Print rows as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Run a statement and print the affected row count
    Exec {
        sql: String,
        #[arg(short = 'p', long = "param", value_name = "VALUE")]
        params: Vec<String>,
    },
    /// Inspect or drop tables
    #[command(subcommand)]
    Tables(TablesCommand),
}

#[derive(Subcommand, Debug)]
enum TablesCommand {
    Exists { name: String },
    Describe { name: String },
    Drop { name: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // dropped at the end of main, after the manager has closed
    let _log_guard = match logging::init(logging::LoggingConfig::for_cli(cli.log_json, cli.verbose)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("warning: logging disabled: {e:#}");
            None
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<ManagerError>() {
            Some(manager_err) if manager_err.is_unavailable() => {
                tracing::error!(error = %manager_err, "warehouse unavailable");
                eprintln!("Warehouse unavailable: no data to show right now. Try again shortly.");
                ExitCode::from(EXIT_UNAVAILABLE)
            }
            _ => {
                eprintln!("error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    tracing::debug!(?settings, "startup settings");

    let registry = DriverRegistry::with_defaults();
    let driver_name = &settings.warehouse.driver;
    let driver = registry.get(driver_name).with_context(|| {
        format!(
            "driver {driver_name:?} is not compiled in (available: {})",
            registry.list().join(", ")
        )
    })?;

    let factory = DriverFactory::new(driver, settings.to_connection_config());
    let manager = ConnectionManager::new(factory, settings.manager_config());

    let outcome = dispatch(&manager, cli.command).await;
    manager.close().await;
    outcome
}

async fn dispatch(manager: &ConnectionManager, command: Command) -> Result<()> {
    let mut out = std::io::stdout().lock();
    match command {
        Command::Ping => commands::ping(manager, &mut out).await,
        Command::Query { sql, params, json } => {
            commands::query(manager, &sql, &params, json, &mut out).await
        }
        Command::Exec { sql, params } => commands::exec(manager, &sql, &params, &mut out).await,
        Command::Tables(TablesCommand::Exists { name }) => {
            commands::table_exists(manager, &name, &mut out).await
        }
        Command::Tables(TablesCommand::Describe { name }) => {
            commands::describe_table(manager, &name, &mut out).await
        }
        Command::Tables(TablesCommand::Drop { name }) => {
            commands::drop_table(manager, &name, &mut out).await
        }
    }
}
