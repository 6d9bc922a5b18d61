//! Query command: count cached elements inside a region.

use camino::Utf8PathBuf;
use clap::Parser;
use mapcache_core::{BoundingBox, SystemClock};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::fs::require_existing;
use crate::store::open_controller;
use crate::{ARG_BBOX, ARG_DATABASE, CliError, parse_bbox, write_line};

pub(crate) const ENV_QUERY_DATABASE: &str = "MAPCACHE_CMDS_QUERY_DATABASE";
pub(crate) const ENV_QUERY_BBOX: &str = "MAPCACHE_CMDS_QUERY_BBOX";

/// CLI arguments for the `query` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Count the cached elements whose geometry intersects a region")]
#[ortho_config(prefix = "MAPCACHE")]
pub(crate) struct QueryArgs {
    /// Path to an existing SQLite cache database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Region to query, as `min_lat,min_lon,max_lat,max_lon`.
    #[arg(long = ARG_BBOX, value_name = "bbox", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) bbox: Option<String>,
}

impl QueryArgs {
    fn into_config(self) -> Result<QueryConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        QueryConfig::try_from(merged)
    }
}

/// Resolved `query` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QueryConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) bbox: BoundingBox,
}

impl TryFrom<QueryArgs> for QueryConfig {
    type Error = CliError;

    fn try_from(args: QueryArgs) -> Result<Self, Self::Error> {
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_QUERY_DATABASE,
        })?;
        let raw_bbox = args.bbox.ok_or(CliError::MissingArgument {
            field: ARG_BBOX,
            env: ENV_QUERY_BBOX,
        })?;
        Ok(Self {
            database,
            bbox: parse_bbox(&raw_bbox)?,
        })
    }
}

/// Per-type element counts of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ElementCounts {
    pub(crate) nodes: usize,
    pub(crate) ways: usize,
    pub(crate) relations: usize,
}

pub(crate) fn run_query(args: QueryArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    require_existing(&config.database, ARG_DATABASE)?;
    let counts = count_elements(&config)?;
    write_line(writer, &format!("nodes: {}", counts.nodes))?;
    write_line(writer, &format!("ways: {}", counts.ways))?;
    write_line(writer, &format!("relations: {}", counts.relations))
}

fn count_elements(config: &QueryConfig) -> Result<ElementCounts, CliError> {
    let controller = open_controller(&config.database, SystemClock)?;
    let data = controller.get_map_data_with_geometry(&config.bbox)?;
    Ok(ElementCounts {
        nodes: data.nodes().count(),
        ways: data.ways().count(),
        relations: data.relations().count(),
    })
}
