//! Storage contracts for elements and their derived geometry.
//!
//! The [`crate::MapDataController`] is the only writer; stores are plain
//! keyed collections and know nothing about the consistency rules that tie
//! elements and geometries together. Reads take `&self`, writes take
//! `&mut self`, and every method reports failures as [`StoreError`].

use std::error::Error as StdError;

#[cfg(feature = "store-sqlite")]
use camino::Utf8PathBuf;

use thiserror::Error;

use crate::{
    BoundingBox, Element, ElementGeometry, ElementGeometryEntry, ElementKey, Relation, Way,
};

mod memory;
#[cfg(feature = "store-sqlite")]
mod sqlite;

pub use memory::{MemoryElementStore, MemoryGeometryStore};
#[cfg(feature = "store-sqlite")]
pub use sqlite::{SqliteElementStore, SqliteGeometryStore};

/// Failure reported by an element or geometry store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot serve requests at the moment.
    #[error("{store} store is unavailable: {reason}")]
    Unavailable {
        /// Which store failed, for example `"element"`.
        store: &'static str,
        /// Human-readable cause.
        reason: String,
    },
    /// Creating the directory holding a database file failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to create database directory {path}: {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite database failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to open SQLite database at {path}: {source}")]
    OpenDatabase {
        /// Location of the SQLite database on disk.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A SQLite statement failed.
    #[cfg(feature = "store-sqlite")]
    #[error("SQLite {operation} failed: {source}")]
    Sqlite {
        /// Short description of the statement being run.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A record could not be serialised for storage.
    #[error("failed to encode {key}: {source}")]
    Encode {
        /// Key of the record being written.
        key: ElementKey,
        /// Serialiser failure.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    /// A stored record could not be deserialised.
    #[error("failed to decode {key}: {source}")]
    Decode {
        /// Key of the record being read.
        key: ElementKey,
        /// Deserialiser failure.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    /// A stored record is structurally invalid.
    #[error("stored record {record} is corrupt: {reason}")]
    Corrupt {
        /// Identification of the damaged record, usually its element key.
        record: String,
        /// Description of the defect.
        reason: String,
    },
}

#[cfg(feature = "store-sqlite")]
impl StoreError {
    pub(crate) fn sqlite(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Self::Sqlite { operation, source }
    }
}

/// Keyed storage of map elements.
///
/// Implementations stamp every element written through [`put_all`] with the
/// current time so that [`get_ids_older_than`] can find stale records.
///
/// [`put_all`]: ElementStore::put_all
/// [`get_ids_older_than`]: ElementStore::get_ids_older_than
///
/// # Examples
/// ```
/// use geo::Coord;
/// use mapcache_core::{ElementKey, ElementStore, MemoryElementStore, Node, Tags};
///
/// let mut store = MemoryElementStore::new();
/// let node = Node::new(1, 1, Coord { x: 13.4, y: 52.5 }, Tags::new());
/// store.put_all(&[node.clone().into()])?;
///
/// assert_eq!(store.get(ElementKey::node(1))?, Some(node.into()));
/// # Ok::<(), mapcache_core::StoreError>(())
/// ```
pub trait ElementStore: Send + Sync {
    /// Fetch one element.
    fn get(&self, key: ElementKey) -> Result<Option<Element>, StoreError>;

    /// Fetch every element among `keys` that exists, in key order.
    fn get_all(&self, keys: &[ElementKey]) -> Result<Vec<Element>, StoreError>;

    /// Keys of elements last written strictly before `timestamp` (epoch ms).
    fn get_ids_older_than(&self, timestamp: i64) -> Result<Vec<ElementKey>, StoreError>;

    /// Ways referencing the node.
    fn ways_for_node(&self, node_id: i64) -> Result<Vec<Way>, StoreError>;

    /// Relations listing `key` as a member.
    fn relations_for_member(&self, key: ElementKey) -> Result<Vec<Relation>, StoreError>;

    /// Number of stored elements.
    fn count(&self) -> Result<usize, StoreError>;

    /// Insert or fully replace elements.
    fn put_all(&mut self, elements: &[Element]) -> Result<(), StoreError>;

    /// Remove elements, returning how many existed. Unknown keys are ignored.
    fn delete_all(&mut self, keys: &[ElementKey]) -> Result<usize, StoreError>;

    /// Remove every element.
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// Keyed storage of one geometry per element with spatial lookup.
///
/// Bounding-box queries return entries whose geometry intersects or lies
/// within the box; boundary contact counts.
pub trait GeometryStore: Send + Sync {
    /// Fetch one geometry.
    fn get(&self, key: ElementKey) -> Result<Option<ElementGeometry>, StoreError>;

    /// Fetch the entries among `keys` that exist, in key order.
    fn get_all(&self, keys: &[ElementKey]) -> Result<Vec<ElementGeometryEntry>, StoreError>;

    /// Entries intersecting `bbox`, in key order.
    fn get_all_entries(&self, bbox: &BoundingBox) -> Result<Vec<ElementGeometryEntry>, StoreError>;

    /// Keys of entries intersecting `bbox`, in key order.
    fn get_all_keys(&self, bbox: &BoundingBox) -> Result<Vec<ElementKey>, StoreError>;

    /// Every stored key, in key order.
    fn all_keys(&self) -> Result<Vec<ElementKey>, StoreError>;

    /// Insert or fully replace entries.
    fn put_all(&mut self, entries: &[ElementGeometryEntry]) -> Result<(), StoreError>;

    /// Remove entries, returning how many existed. Unknown keys are ignored.
    fn delete_all(&mut self, keys: &[ElementKey]) -> Result<usize, StoreError>;

    /// Remove every entry.
    fn clear(&mut self) -> Result<(), StoreError>;
}

impl<T: ElementStore + ?Sized> ElementStore for Box<T> {
    fn get(&self, key: ElementKey) -> Result<Option<Element>, StoreError> {
        (**self).get(key)
    }

    fn get_all(&self, keys: &[ElementKey]) -> Result<Vec<Element>, StoreError> {
        (**self).get_all(keys)
    }

    fn get_ids_older_than(&self, timestamp: i64) -> Result<Vec<ElementKey>, StoreError> {
        (**self).get_ids_older_than(timestamp)
    }

    fn ways_for_node(&self, node_id: i64) -> Result<Vec<Way>, StoreError> {
        (**self).ways_for_node(node_id)
    }

    fn relations_for_member(&self, key: ElementKey) -> Result<Vec<Relation>, StoreError> {
        (**self).relations_for_member(key)
    }

    fn count(&self) -> Result<usize, StoreError> {
        (**self).count()
    }

    fn put_all(&mut self, elements: &[Element]) -> Result<(), StoreError> {
        (**self).put_all(elements)
    }

    fn delete_all(&mut self, keys: &[ElementKey]) -> Result<usize, StoreError> {
        (**self).delete_all(keys)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

impl<T: GeometryStore + ?Sized> GeometryStore for Box<T> {
    fn get(&self, key: ElementKey) -> Result<Option<ElementGeometry>, StoreError> {
        (**self).get(key)
    }

    fn get_all(&self, keys: &[ElementKey]) -> Result<Vec<ElementGeometryEntry>, StoreError> {
        (**self).get_all(keys)
    }

    fn get_all_entries(
        &self,
        bbox: &BoundingBox,
    ) -> Result<Vec<ElementGeometryEntry>, StoreError> {
        (**self).get_all_entries(bbox)
    }

    fn get_all_keys(&self, bbox: &BoundingBox) -> Result<Vec<ElementKey>, StoreError> {
        (**self).get_all_keys(bbox)
    }

    fn all_keys(&self) -> Result<Vec<ElementKey>, StoreError> {
        (**self).all_keys()
    }

    fn put_all(&mut self, entries: &[ElementGeometryEntry]) -> Result<(), StoreError> {
        (**self).put_all(entries)
    }

    fn delete_all(&mut self, keys: &[ElementKey]) -> Result<usize, StoreError> {
        (**self).delete_all(keys)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        (**self).clear()
    }
}
