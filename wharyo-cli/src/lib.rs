//! Command-line interface for the Wharyo feature store.
//!
//! `wharyo create` persists a feature and prints its identifier;
//! `wharyo get` prints a stored feature as JSON. Layer sources come from
//! CLI flags, `WHARYO_` environment variables or configuration files.
#![forbid(unsafe_code)]

use std::io::Write;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod create;
mod error;
mod get;
mod output;
mod sources;

pub use error::CliError;

use self::{create::CreateArgs, get::GetArgs};

const ARG_LAYER: &str = "layer";
const ARG_GEOMETRY: &str = "geometry";
const ARG_ATTRIBUTES: &str = "attributes";
const ARG_ID: &str = "id";
const ENV_CREATE_LAYER: &str = "WHARYO_CMDS_CREATE_LAYER";
const ENV_GET_LAYER: &str = "WHARYO_CMDS_GET_LAYER";
const ENV_GET_ID: &str = "WHARYO_CMDS_GET_ID";
const DEFAULT_LOG_FILTER: &str = "warn";

/// Run the Wharyo CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns [`CliError`] when arguments or configuration are invalid, when
/// the feature store rejects the operation or when output cannot be
/// written.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    init_logging()?;
    let mut stdout = std::io::stdout().lock();
    dispatch(cli.command, &mut stdout)
}

fn init_logging() -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(CliError::Logging)
}

fn dispatch(command: Command, writer: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Create(args) => create::run_create(args, writer),
        Command::Get(args) => get::run_get(args, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "wharyo",
    about = "Create and read features in shapefile, GeoJSON and database layers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Persist a new feature and print its identifier.
    Create(CreateArgs),
    /// Print a stored feature as JSON.
    Get(GetArgs),
}

#[cfg(test)]
mod tests;
