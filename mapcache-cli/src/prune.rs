//! Prune command: drop elements that have not been written recently.

use camino::Utf8PathBuf;
use clap::Parser;
use log::info;
use mapcache_core::{Clock, SystemClock};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::fs::require_existing;
use crate::store::open_controller;
use crate::{ARG_DATABASE, ARG_OLDER_THAN_DAYS, CliError, write_line};

pub(crate) const ENV_PRUNE_DATABASE: &str = "MAPCACHE_CMDS_PRUNE_DATABASE";
pub(crate) const ENV_PRUNE_OLDER_THAN_DAYS: &str = "MAPCACHE_CMDS_PRUNE_OLDER_THAN_DAYS";

const MILLIS_PER_DAY: i64 = 86_400_000;

/// CLI arguments for the `prune` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Delete every element last written more than the given \
                 number of days ago, together with its geometry.",
    about = "Remove elements not written for a number of days"
)]
#[ortho_config(prefix = "MAPCACHE")]
pub(crate) struct PruneArgs {
    /// Path to an existing SQLite cache database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Age in days beyond which elements are removed.
    #[arg(long = ARG_OLDER_THAN_DAYS, value_name = "days")]
    #[serde(default)]
    pub(crate) older_than_days: Option<u32>,
}

impl PruneArgs {
    fn into_config(self) -> Result<PruneConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        PruneConfig::try_from(merged)
    }
}

/// Resolved `prune` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PruneConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) older_than_days: u32,
}

impl PruneConfig {
    /// Epoch milliseconds before which elements count as stale.
    pub(crate) fn cutoff_millis(&self, now: i64) -> i64 {
        now.saturating_sub(i64::from(self.older_than_days).saturating_mul(MILLIS_PER_DAY))
    }
}

impl TryFrom<PruneArgs> for PruneConfig {
    type Error = CliError;

    fn try_from(args: PruneArgs) -> Result<Self, Self::Error> {
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_PRUNE_DATABASE,
        })?;
        let older_than_days = args.older_than_days.ok_or(CliError::MissingArgument {
            field: ARG_OLDER_THAN_DAYS,
            env: ENV_PRUNE_OLDER_THAN_DAYS,
        })?;
        Ok(Self {
            database,
            older_than_days,
        })
    }
}

pub(crate) fn run_prune(args: PruneArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    run_prune_with(args, SystemClock, writer)
}

pub(crate) fn run_prune_with(
    args: PruneArgs,
    clock: impl Clock + Copy + 'static,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    require_existing(&config.database, ARG_DATABASE)?;
    let cutoff = config.cutoff_millis(clock.now_millis());
    let controller = open_controller(&config.database, clock)?;
    let removed = controller.delete_older_than(cutoff)?;
    info!(
        "Pruned {removed} elements older than {} days from {}",
        config.older_than_days, config.database
    );
    write_line(writer, &format!("removed {removed} elements"))
}
