//! Core domain types and the map-data controller for the mapcache engine.
//!
//! The crate owns the consistency contract of the local map-data cache:
//! elements (nodes, ways, relations) live in an [`ElementStore`], their
//! derived geometries live in a [`GeometryStore`], and every mutation flows
//! through the [`MapDataController`], which keeps both stores in step and
//! tells registered [`MapDataListener`]s exactly what changed.
//!
//! Coordinates are WGS84 with `x = longitude` and `y = latitude`, matching
//! the `geo` crate conventions.
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod bbox;
pub mod clock;
pub mod controller;
pub mod element;
pub mod geometry;
pub mod listener;
pub mod map_data;
pub mod store;
pub mod test_support;
pub mod update;

pub use bbox::{BoundingBox, BoundingBoxError};
pub use clock::{Clock, SystemClock};
pub use controller::{MapDataController, MapDataError};
pub use element::{
    Element, ElementKey, ElementKeyParseError, ElementType, Node, Relation, RelationMember, Tags,
    Way,
};
pub use geometry::{
    ElementGeometry, ElementGeometryCreator, ElementGeometryEntry, ElementResolver,
    GeometryComputer, GeometryError, is_area,
};
pub use listener::MapDataListener;
pub use map_data::MapDataWithGeometry;
pub use store::{
    ElementStore, GeometryStore, MemoryElementStore, MemoryGeometryStore, StoreError,
};
#[cfg(feature = "store-sqlite")]
pub use store::{SqliteElementStore, SqliteGeometryStore};
pub use update::{ElementIdUpdate, ElementUpdates, InvalidUpdateError};
