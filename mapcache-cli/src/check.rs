//! Check command: report geometry entries without an element.

use camino::Utf8PathBuf;
use clap::Parser;
use mapcache_core::SystemClock;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::fs::require_existing;
use crate::store::open_controller;
use crate::{ARG_DATABASE, CliError, write_line};

pub(crate) const ENV_CHECK_DATABASE: &str = "MAPCACHE_CMDS_CHECK_DATABASE";

/// CLI arguments for the `check` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Verify that every geometry entry has its element")]
#[ortho_config(prefix = "MAPCACHE")]
pub(crate) struct CheckArgs {
    /// Path to an existing SQLite cache database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

pub(crate) fn run_check(args: CheckArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let database = merged.database.ok_or(CliError::MissingArgument {
        field: ARG_DATABASE,
        env: ENV_CHECK_DATABASE,
    })?;
    require_existing(&database, ARG_DATABASE)?;
    open_controller(&database, SystemClock)?.check_integrity()?;
    write_line(writer, &format!("{database}: every geometry has its element"))
}
