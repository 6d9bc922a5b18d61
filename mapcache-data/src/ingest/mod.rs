use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use geo::Coord;
use log::{debug, warn};
use mapcache_core::{BoundingBox, MapDataWithGeometry};
use osmpbf::ElementReader;
use thiserror::Error;

mod accumulator;
mod tags;

use accumulator::RegionAccumulator;

/// Summary of the raw OSM elements present in a file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OsmReadSummary {
    /// Number of nodes with valid coordinates, including dense-node entries.
    pub nodes: u64,
    /// Number of ways.
    pub ways: u64,
    /// Number of relations.
    pub relations: u64,
    /// Bounding box covering all valid node coordinates, if any.
    pub bounds: Option<BoundingBox>,
}

impl OsmReadSummary {
    fn combine(mut self, other: Self) -> Self {
        self.nodes += other.nodes;
        self.ways += other.ways;
        self.relations += other.relations;
        if let Some(bounds) = other.bounds {
            self.include_bounds(&bounds);
        }
        self
    }

    fn include_bounds(&mut self, bounds: &BoundingBox) {
        self.bounds = Some(match &self.bounds {
            Some(existing) => existing.union(bounds),
            None => *bounds,
        });
    }

    fn record_node(&mut self, position: Coord<f64>) {
        self.nodes += 1;
        if let Ok(point) = BoundingBox::new(position.y, position.x, position.y, position.x) {
            self.include_bounds(&point);
        }
    }
}

/// Result of reading a region from an OSM PBF file.
#[derive(Debug, Clone, PartialEq)]
pub struct OsmReadReport {
    /// Element counts and bounds of the whole file.
    pub summary: OsmReadSummary,
    /// Elements of the region, without geometry.
    pub data: MapDataWithGeometry,
}

/// Errors returned when reading an OSM PBF file.
#[derive(Debug, Error)]
pub enum OsmReadError {
    /// The file could not be opened.
    #[error("failed to open OSM PBF file at {path:?}")]
    Open {
        /// Failure reported by `osmpbf`.
        #[source]
        source: osmpbf::Error,
        /// Location of the file.
        path: PathBuf,
    },
    /// The file content is not valid PBF data.
    #[error("failed to decode OSM PBF data at {path:?}")]
    Decode {
        /// Failure reported by `osmpbf`.
        #[source]
        source: osmpbf::Error,
        /// Location of the file.
        path: PathBuf,
    },
}

fn open_reader(path: &Path) -> Result<ElementReader<BufReader<File>>, OsmReadError> {
    ElementReader::from_path(path).map_err(|source| OsmReadError::Open {
        source,
        path: path.to_path_buf(),
    })
}

/// Read the elements of an OSM PBF file, optionally cut to `region`.
///
/// Without a region every element is returned. With a region, nodes inside
/// it are kept; ways touching a kept node are kept together with all their
/// nodes, and relations are kept when a member is kept.
///
/// # Examples
/// ```no_run
/// use std::path::Path;
/// use mapcache_core::BoundingBox;
/// use mapcache_data::read_osm_pbf;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let region = BoundingBox::new(52.50, 13.39, 52.52, 13.42)?;
/// let report = read_osm_pbf(Path::new("berlin.osm.pbf"), Some(&region))?;
/// println!("Read {} elements", report.data.len());
/// # Ok(())
/// # }
/// ```
pub fn read_osm_pbf(
    path: &Path,
    region: Option<&BoundingBox>,
) -> Result<OsmReadReport, OsmReadError> {
    let region = region.copied();
    let mut accumulator = open_reader(path)?
        .par_map_reduce(
            move |element| {
                let mut accumulator = RegionAccumulator::default();
                accumulator.process_element(element, region.as_ref());
                accumulator
            },
            RegionAccumulator::default,
            RegionAccumulator::combine,
        )
        .map_err(|source| OsmReadError::Decode {
            source,
            path: path.to_path_buf(),
        })?;

    accumulator.retain_region_ways();
    if accumulator.has_pending_nodes() {
        debug!(
            "Resolving {} way nodes outside the region",
            accumulator.pending_node_count()
        );
        let accumulator_ref = &mut accumulator;
        open_reader(path)?
            .for_each(|element| accumulator_ref.resolve_pending_element(element))
            .map_err(|source| OsmReadError::Decode {
                source,
                path: path.to_path_buf(),
            })?;
        if accumulator.has_pending_nodes() {
            warn!(
                "Skipped {} way node references without coordinates",
                accumulator.pending_node_count()
            );
        }
    }

    let report = accumulator.into_report();
    debug!(
        "Read {} of {} elements from {}",
        report.data.len(),
        report.summary.nodes + report.summary.ways + report.summary.relations,
        path.display()
    );
    Ok(report)
}
