//! Error types emitted by the mapcache CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use mapcache_core::{BoundingBoxError, MapDataError, StoreError};
use mapcache_data::OsmReadError;
use thiserror::Error;

/// Errors emitted by the mapcache CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A bounding box option could not be parsed.
    #[error("invalid --{field} value {value:?}: {source}")]
    InvalidBoundingBox {
        field: &'static str,
        value: String,
        #[source]
        source: BoundingBoxError,
    },
    /// The log level is not one of `off`, `error`, `warn`, `info`, `debug`
    /// or `trace`.
    #[error("unknown log level {value:?}")]
    InvalidLogLevel { value: String },
    /// Installing the global logger failed.
    #[error("failed to install logger: {0}")]
    InstallLogger(#[source] log::SetLoggerError),
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Reading the OSM PBF file failed.
    #[error("failed to read OSM data: {0}")]
    ReadOsm(#[from] OsmReadError),
    /// The PBF file holds no node with valid coordinates and no region was
    /// given, so there is nothing to cover.
    #[error("OSM file {path:?} has no bounds; pass --bbox explicitly")]
    EmptyDataset { path: Utf8PathBuf },
    /// Opening the SQLite database failed.
    #[error("failed to open database at {path:?}: {source}")]
    OpenDatabase {
        path: Utf8PathBuf,
        #[source]
        source: StoreError,
    },
    /// The controller rejected or failed an operation.
    #[error(transparent)]
    MapData(#[from] MapDataError),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
