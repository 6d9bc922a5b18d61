//! Region import for the mapcache engine.
//!
//! Responsibilities:
//! - Read OpenStreetMap PBF extracts into [`mapcache_core::MapDataWithGeometry`].
//! - Cut a region out of an extract while keeping kept ways complete.
//!
//! Boundaries:
//! - Geometry is not computed here; the controller derives it on import.
//! - No storage access; callers hand the result to the controller.
//!
//! Invariants:
//! - Every node referenced by a returned way is present when the extract
//!   contains it.
//! - No global mutable state.

mod ingest;

pub use ingest::{OsmReadError, OsmReadReport, OsmReadSummary, read_osm_pbf};
