//! Import command: replace a region of the cache with a PBF extract.

use camino::Utf8PathBuf;
use clap::Parser;
use log::info;
use mapcache_core::{BoundingBox, MapDataWithGeometry, SystemClock};
use mapcache_data::read_osm_pbf;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::fs::require_existing;
use crate::store::open_controller;
use crate::{ARG_BBOX, ARG_DATABASE, ARG_PBF, CliError, describe_bbox, parse_bbox, write_line};

pub(crate) const ENV_IMPORT_DATABASE: &str = "MAPCACHE_CMDS_IMPORT_DATABASE";
pub(crate) const ENV_IMPORT_PBF: &str = "MAPCACHE_CMDS_IMPORT_PBF";

/// CLI arguments for the `import` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Read an OpenStreetMap PBF extract and replace everything the \
                 cache holds inside the region with it. Without --bbox the \
                 region is the bounding box of all nodes in the file.",
    about = "Import an OSM PBF extract into the cache"
)]
#[ortho_config(prefix = "MAPCACHE")]
pub(crate) struct ImportArgs {
    /// Path to the SQLite cache database; created when missing.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Path to the OpenStreetMap PBF file.
    #[arg(long = ARG_PBF, value_name = "path")]
    #[serde(default)]
    pub(crate) pbf: Option<Utf8PathBuf>,
    /// Region to replace, as `min_lat,min_lon,max_lat,max_lon`.
    #[arg(long = ARG_BBOX, value_name = "bbox", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) bbox: Option<String>,
}

impl ImportArgs {
    pub(crate) fn into_config(self) -> Result<ImportConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ImportConfig::try_from(merged)
    }
}

/// Resolved `import` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ImportConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) pbf: Utf8PathBuf,
    pub(crate) bbox: Option<BoundingBox>,
}

impl ImportConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.pbf, ARG_PBF)
    }
}

impl TryFrom<ImportArgs> for ImportConfig {
    type Error = CliError;

    fn try_from(args: ImportArgs) -> Result<Self, Self::Error> {
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_IMPORT_DATABASE,
        })?;
        let pbf = args.pbf.ok_or(CliError::MissingArgument {
            field: ARG_PBF,
            env: ENV_IMPORT_PBF,
        })?;
        let bbox = args.bbox.as_deref().map(parse_bbox).transpose()?;
        Ok(Self {
            database,
            pbf,
            bbox,
        })
    }
}

/// What an import wrote.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ImportOutcome {
    pub(crate) bbox: BoundingBox,
    pub(crate) nodes: usize,
    pub(crate) ways: usize,
    pub(crate) relations: usize,
}

impl ImportOutcome {
    fn of(bbox: BoundingBox, data: &MapDataWithGeometry) -> Self {
        Self {
            bbox,
            nodes: data.nodes().count(),
            ways: data.ways().count(),
            relations: data.relations().count(),
        }
    }
}

pub(crate) fn run_import(args: ImportArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    let outcome = execute_import(&config)?;
    write_line(
        writer,
        &format!(
            "imported {} nodes, {} ways and {} relations into {} for {}",
            outcome.nodes,
            outcome.ways,
            outcome.relations,
            config.database,
            describe_bbox(&outcome.bbox)
        ),
    )
}

pub(crate) fn execute_import(config: &ImportConfig) -> Result<ImportOutcome, CliError> {
    let report = read_osm_pbf(config.pbf.as_std_path(), config.bbox.as_ref())?;
    let bbox = config
        .bbox
        .or(report.summary.bounds)
        .ok_or_else(|| CliError::EmptyDataset {
            path: config.pbf.clone(),
        })?;
    let outcome = ImportOutcome::of(bbox, &report.data);

    let controller = open_controller(&config.database, SystemClock)?;
    controller.put_all_for_bbox(&bbox, report.data)?;
    info!(
        "Imported {} elements from {} into {}",
        outcome.nodes + outcome.ways + outcome.relations,
        config.pbf,
        config.database
    );
    Ok(outcome)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ImportConfig, CliError> {
    let merged = ImportArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ImportConfig::try_from(merged)
}
