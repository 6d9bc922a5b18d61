//! Command-line interface for the mapcache map-data cache.
//!
//! Every subcommand works on one SQLite database holding both the element
//! and the geometry tables. Options are layered by `ortho_config`: CLI flags
//! win over `MAPCACHE_CMDS_<COMMAND>_<FIELD>` environment variables, which win
//! over configuration files.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use mapcache_core::BoundingBox;
use std::io::{self, Write};

mod check;
mod error;
mod fs;
mod import;
mod logging;
mod prune;
mod query;
mod store;

pub use error::CliError;

use check::{CheckArgs, run_check};
use import::{ImportArgs, run_import};
use logging::{ENV_LOG_LEVEL, install_logger, resolve_log_level};
use prune::{PruneArgs, run_prune};
use query::{QueryArgs, run_query};

const ARG_DATABASE: &str = "database";
const ARG_PBF: &str = "pbf";
const ARG_BBOX: &str = "bbox";
const ARG_OLDER_THAN_DAYS: &str = "older-than-days";
const ARG_LOG_LEVEL: &str = "log-level";

/// Run the mapcache CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let env_level = std::env::var(ENV_LOG_LEVEL).ok();
    let level = resolve_log_level(cli.log_level.as_deref(), env_level.as_deref())?;
    install_logger(level)?;
    let mut stdout = io::stdout().lock();
    run_command(cli.command, &mut stdout)
}

fn run_command(command: Command, writer: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Import(args) => run_import(args, writer),
        Command::Query(args) => run_query(args, writer),
        Command::Prune(args) => run_prune(args, writer),
        Command::Check(args) => run_check(args, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "mapcache",
    about = "Maintain a local cache of OpenStreetMap elements and their geometry",
    version
)]
struct Cli {
    /// Log verbosity: off, error, warn, info, debug or trace.
    #[arg(long = ARG_LOG_LEVEL, value_name = "level", global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replace a region of the cache with the contents of an OSM PBF file.
    Import(ImportArgs),
    /// Count the cached elements whose geometry intersects a region.
    Query(QueryArgs),
    /// Remove elements not written for a number of days.
    Prune(PruneArgs),
    /// Verify that every geometry entry has its element.
    Check(CheckArgs),
}

fn parse_bbox(value: &str) -> Result<BoundingBox, CliError> {
    value
        .parse()
        .map_err(|source| CliError::InvalidBoundingBox {
            field: ARG_BBOX,
            value: value.to_owned(),
            source,
        })
}

fn write_line(writer: &mut dyn Write, line: &str) -> Result<(), CliError> {
    writeln!(writer, "{line}").map_err(CliError::WriteOutput)
}

fn describe_bbox(bbox: &BoundingBox) -> String {
    format!(
        "{},{},{},{}",
        bbox.min_lat(),
        bbox.min_lon(),
        bbox.max_lat(),
        bbox.max_lon()
    )
}

#[cfg(test)]
mod tests;
