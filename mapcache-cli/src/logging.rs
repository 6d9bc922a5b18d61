//! Structured JSON logging to stderr.

use std::{io, str::FromStr};

use log::LevelFilter;
use structured_logger::{Builder, json::new_writer};

use crate::CliError;

/// Environment variable consulted when `--log-level` is absent.
pub(crate) const ENV_LOG_LEVEL: &str = "MAPCACHE_LOG_LEVEL";

const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Pick the level from the flag, then the environment, then the default.
///
/// Blank values count as absent.
pub(crate) fn resolve_log_level(
    flag: Option<&str>,
    env: Option<&str>,
) -> Result<LevelFilter, CliError> {
    let chosen = [flag, env]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty());
    match chosen {
        None => Ok(DEFAULT_LOG_LEVEL),
        Some(value) => LevelFilter::from_str(value).map_err(|_| CliError::InvalidLogLevel {
            value: value.to_owned(),
        }),
    }
}

pub(crate) fn install_logger(level: LevelFilter) -> Result<(), CliError> {
    Builder::with_level(level.as_str())
        .with_target_writer("*", new_writer(io::stderr()))
        .try_init()
        .map_err(CliError::InstallLogger)
}
