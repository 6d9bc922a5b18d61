//! Facade crate for the mapcache map-data cache.
//!
//! This crate re-exports the core domain types and the controller, and
//! exposes the SQLite stores and the OSM PBF reader behind feature flags.

#![forbid(unsafe_code)]

pub use mapcache_core::{
    BoundingBox, Clock, Element, ElementGeometry, ElementGeometryCreator, ElementGeometryEntry,
    ElementKey, ElementStore, ElementType, ElementUpdates, GeometryComputer, GeometryStore,
    MapDataController, MapDataError, MapDataListener, MapDataWithGeometry, MemoryElementStore,
    MemoryGeometryStore, Node, Relation, RelationMember, StoreError, SystemClock, Tags, Way,
};

#[cfg(feature = "store-sqlite")]
pub use mapcache_core::{SqliteElementStore, SqliteGeometryStore};

#[cfg(feature = "osm-pbf")]
pub use mapcache_data::{OsmReadError, OsmReadReport, OsmReadSummary, read_osm_pbf};

#[cfg(feature = "test-support")]
pub use mapcache_core::test_support;
