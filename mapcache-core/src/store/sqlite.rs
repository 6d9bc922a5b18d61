//! SQLite-backed element and geometry stores.
//!
//! Both stores may share one database file; each owns its own tables and
//! connection. Every write runs inside a single SQLite transaction.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use geo::Coord;
use rusqlite::{Connection, OptionalExtension, Params, Row, Statement, Transaction, params};
use serde::{Serialize, de::DeserializeOwned};

use super::{ElementStore, GeometryStore, StoreError};
use crate::{
    BoundingBox, Clock, Element, ElementGeometry, ElementGeometryEntry, ElementKey, ElementType,
    Node, Relation, RelationMember, Tags, Way,
};

/// SQLite limits bound parameters per statement to 999 by default. The stores
/// chunk `IN` queries to remain below that ceiling.
const SQLITE_MAX_VARIABLE_NUMBER: usize = 999;

/// How long a connection waits for a lock held by the sibling store.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ELEMENT_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS elements (
        type TEXT NOT NULL,
        id INTEGER NOT NULL,
        version INTEGER NOT NULL,
        tags TEXT NOT NULL,
        lon REAL,
        lat REAL,
        data TEXT,
        last_sync INTEGER NOT NULL,
        PRIMARY KEY (type, id)
    );
    CREATE INDEX IF NOT EXISTS elements_last_sync ON elements (last_sync);
    CREATE TABLE IF NOT EXISTS way_nodes (
        way_id INTEGER NOT NULL,
        node_id INTEGER NOT NULL,
        PRIMARY KEY (way_id, node_id)
    );
    CREATE INDEX IF NOT EXISTS way_nodes_node ON way_nodes (node_id);
    CREATE TABLE IF NOT EXISTS relation_members (
        relation_id INTEGER NOT NULL,
        member_type TEXT NOT NULL,
        member_id INTEGER NOT NULL,
        PRIMARY KEY (relation_id, member_type, member_id)
    );
    CREATE INDEX IF NOT EXISTS relation_members_member
        ON relation_members (member_type, member_id);
";

const GEOMETRY_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS geometries (
        type TEXT NOT NULL,
        id INTEGER NOT NULL,
        min_lon REAL,
        min_lat REAL,
        max_lon REAL,
        max_lat REAL,
        geometry BLOB NOT NULL,
        PRIMARY KEY (type, id)
    );
    CREATE INDEX IF NOT EXISTS geometries_envelope
        ON geometries (min_lon, max_lon, min_lat, max_lat);
";

const ELEMENT_COLUMNS: &str = "type, id, version, tags, lon, lat, data";

fn open_connection(path: &Utf8Path) -> Result<Connection, StoreError> {
    ensure_parent_dir(path)?;
    let connection =
        Connection::open(path.as_std_path()).map_err(|source| StoreError::OpenDatabase {
            path: path.to_path_buf(),
            source,
        })?;
    connection
        .busy_timeout(BUSY_TIMEOUT)
        .map_err(StoreError::sqlite("set busy timeout"))?;
    Ok(connection)
}

fn open_memory_connection() -> Result<Connection, StoreError> {
    Connection::open_in_memory().map_err(|source| StoreError::OpenDatabase {
        path: Utf8PathBuf::from(":memory:"),
        source,
    })
}

fn ensure_parent_dir(path: &Utf8Path) -> Result<(), StoreError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }

    let create_error = |source: std::io::Error| StoreError::CreateDirectory {
        path: parent.to_path_buf(),
        source,
    };
    let (base, relative) = if parent.is_absolute() {
        ("/", parent.strip_prefix("/").unwrap_or(parent))
    } else {
        (".", parent)
    };
    let dir = fs_utf8::Dir::open_ambient_dir(base, ambient_authority()).map_err(create_error)?;
    dir.create_dir_all(relative).map_err(create_error)
}

fn lock<'a>(
    connection: &'a Mutex<Connection>,
    store: &'static str,
) -> Result<MutexGuard<'a, Connection>, StoreError> {
    connection.lock().map_err(|_| StoreError::Unavailable {
        store,
        reason: "connection lock poisoned".to_owned(),
    })
}

fn parse_key(element_type: &str, id: i64) -> Result<ElementKey, StoreError> {
    let element_type = element_type
        .parse::<ElementType>()
        .map_err(|error| StoreError::Corrupt {
            record: format!("{element_type}/{id}"),
            reason: error.to_string(),
        })?;
    Ok(ElementKey::new(element_type, id))
}

fn encode_json<T: Serialize + ?Sized>(key: ElementKey, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Encode {
        key,
        source: Box::new(source),
    })
}

fn decode_json<T: DeserializeOwned>(key: ElementKey, text: &str) -> Result<T, StoreError> {
    serde_json::from_str(text).map_err(|source| StoreError::Decode {
        key,
        source: Box::new(source),
    })
}

/// Group keys by type, deduplicated, for `IN` queries.
fn ids_by_type(keys: &[ElementKey]) -> BTreeMap<ElementType, Vec<i64>> {
    let mut grouped: BTreeMap<ElementType, Vec<i64>> = BTreeMap::new();
    for key in keys {
        grouped.entry(key.element_type).or_default().push(key.id);
    }
    for ids in grouped.values_mut() {
        ids.sort_unstable();
        ids.dedup();
    }
    grouped
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Raw `elements` row before decoding.
struct ElementRow {
    element_type: String,
    id: i64,
    version: i32,
    tags: String,
    lon: Option<f64>,
    lat: Option<f64>,
    data: Option<String>,
}

impl ElementRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            element_type: row.get(0)?,
            id: row.get(1)?,
            version: row.get(2)?,
            tags: row.get(3)?,
            lon: row.get(4)?,
            lat: row.get(5)?,
            data: row.get(6)?,
        })
    }

    fn into_element(self) -> Result<Element, StoreError> {
        let key = parse_key(&self.element_type, self.id)?;
        let tags: Tags = decode_json(key, &self.tags)?;
        let corrupt = |reason: &str| StoreError::Corrupt {
            record: key.to_string(),
            reason: reason.to_owned(),
        };
        match key.element_type {
            ElementType::Node => {
                let (Some(x), Some(y)) = (self.lon, self.lat) else {
                    return Err(corrupt("node has no position"));
                };
                Ok(Node::new(self.id, self.version, Coord { x, y }, tags).into())
            }
            ElementType::Way => {
                let data = self.data.ok_or_else(|| corrupt("way has no node list"))?;
                let nodes: Vec<i64> = decode_json(key, &data)?;
                Ok(Way::new(self.id, self.version, nodes, tags).into())
            }
            ElementType::Relation => {
                let data = self.data.ok_or_else(|| corrupt("relation has no members"))?;
                let members: Vec<RelationMember> = decode_json(key, &data)?;
                Ok(Relation::new(self.id, self.version, members, tags).into())
            }
        }
    }
}

fn query_elements<P: Params>(
    connection: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Element>, StoreError> {
    let mut statement = connection
        .prepare(sql)
        .map_err(StoreError::sqlite("prepare element query"))?;
    let rows = statement
        .query_map(params, ElementRow::from_row)
        .map_err(StoreError::sqlite("query elements"))?;
    let mut elements = Vec::new();
    for row in rows {
        let row = row.map_err(StoreError::sqlite("read element row"))?;
        elements.push(row.into_element()?);
    }
    Ok(elements)
}

/// [`ElementStore`] persisted in SQLite.
///
/// Tags, way node lists and relation members are stored as JSON. The
/// `way_nodes` and `relation_members` tables answer reverse lookups.
pub struct SqliteElementStore {
    connection: Mutex<Connection>,
    clock: Box<dyn Clock>,
}

impl fmt::Debug for SqliteElementStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteElementStore").finish_non_exhaustive()
    }
}

impl SqliteElementStore {
    /// Open or create the store in the database at `path`.
    ///
    /// Parent directories are created as needed and the schema is
    /// initialised if missing.
    pub fn open(path: impl AsRef<Utf8Path>, clock: impl Clock + 'static) -> Result<Self, StoreError> {
        Self::with_connection(open_connection(path.as_ref())?, clock)
    }

    /// Create a store in a private in-memory database.
    pub fn open_in_memory(clock: impl Clock + 'static) -> Result<Self, StoreError> {
        Self::with_connection(open_memory_connection()?, clock)
    }

    fn with_connection(
        connection: Connection,
        clock: impl Clock + 'static,
    ) -> Result<Self, StoreError> {
        connection
            .execute_batch(ELEMENT_SCHEMA)
            .map_err(StoreError::sqlite("create element schema"))?;
        Ok(Self {
            connection: Mutex::new(connection),
            clock: Box::new(clock),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        lock(&self.connection, "element")
    }
}

impl ElementStore for SqliteElementStore {
    fn get(&self, key: ElementKey) -> Result<Option<Element>, StoreError> {
        let connection = self.connection()?;
        let row = connection
            .query_row(
                &format!("SELECT {ELEMENT_COLUMNS} FROM elements WHERE type = ?1 AND id = ?2"),
                params![key.element_type.as_str(), key.id],
                ElementRow::from_row,
            )
            .optional()
            .map_err(StoreError::sqlite("get element"))?;
        row.map(ElementRow::into_element).transpose()
    }

    fn get_all(&self, keys: &[ElementKey]) -> Result<Vec<Element>, StoreError> {
        let connection = self.connection()?;
        let mut elements = Vec::with_capacity(keys.len());
        for (element_type, ids) in ids_by_type(keys) {
            for chunk in ids.chunks(SQLITE_MAX_VARIABLE_NUMBER) {
                let sql = format!(
                    "SELECT {ELEMENT_COLUMNS} FROM elements WHERE type = '{}' AND id IN ({})",
                    element_type.as_str(),
                    placeholders(chunk.len()),
                );
                elements.extend(query_elements(
                    &connection,
                    &sql,
                    rusqlite::params_from_iter(chunk),
                )?);
            }
        }
        elements.sort_unstable_by_key(Element::key);
        Ok(elements)
    }

    fn get_ids_older_than(&self, timestamp: i64) -> Result<Vec<ElementKey>, StoreError> {
        let connection = self.connection()?;
        let mut statement = connection
            .prepare("SELECT type, id FROM elements WHERE last_sync < ?1")
            .map_err(StoreError::sqlite("prepare age query"))?;
        let rows = statement
            .query_map([timestamp], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(StoreError::sqlite("query element ages"))?;
        let mut keys = Vec::new();
        for row in rows {
            let (element_type, id) = row.map_err(StoreError::sqlite("read element age"))?;
            keys.push(parse_key(&element_type, id)?);
        }
        keys.sort_unstable();
        Ok(keys)
    }

    fn ways_for_node(&self, node_id: i64) -> Result<Vec<Way>, StoreError> {
        let connection = self.connection()?;
        let sql = format!(
            "SELECT {ELEMENT_COLUMNS} FROM elements
             JOIN way_nodes ON elements.type = 'way' AND elements.id = way_nodes.way_id
             WHERE way_nodes.node_id = ?1
             ORDER BY elements.id"
        );
        Ok(query_elements(&connection, &sql, [node_id])?
            .into_iter()
            .filter_map(|element| match element {
                Element::Way(way) => Some(way),
                _ => None,
            })
            .collect())
    }

    fn relations_for_member(&self, key: ElementKey) -> Result<Vec<Relation>, StoreError> {
        let connection = self.connection()?;
        let sql = format!(
            "SELECT {ELEMENT_COLUMNS} FROM elements
             JOIN relation_members
               ON elements.type = 'relation' AND elements.id = relation_members.relation_id
             WHERE relation_members.member_type = ?1 AND relation_members.member_id = ?2
             ORDER BY elements.id"
        );
        Ok(
            query_elements(&connection, &sql, params![key.element_type.as_str(), key.id])?
                .into_iter()
                .filter_map(|element| match element {
                    Element::Relation(relation) => Some(relation),
                    _ => None,
                })
                .collect(),
        )
    }

    fn count(&self) -> Result<usize, StoreError> {
        self.connection()?
            .query_row("SELECT COUNT(*) FROM elements", [], |row| row.get(0))
            .map_err(StoreError::sqlite("count elements"))
    }

    fn put_all(&mut self, elements: &[Element]) -> Result<(), StoreError> {
        let last_sync = self.clock.now_millis();
        let mut connection = self.connection()?;
        let transaction = connection
            .transaction()
            .map_err(StoreError::sqlite("begin element transaction"))?;
        write_elements(&transaction, elements, last_sync)?;
        transaction
            .commit()
            .map_err(StoreError::sqlite("commit element transaction"))
    }

    fn delete_all(&mut self, keys: &[ElementKey]) -> Result<usize, StoreError> {
        let mut connection = self.connection()?;
        let transaction = connection
            .transaction()
            .map_err(StoreError::sqlite("begin element transaction"))?;
        let removed = delete_elements(&transaction, keys)?;
        transaction
            .commit()
            .map_err(StoreError::sqlite("commit element transaction"))?;
        Ok(removed)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        let mut connection = self.connection()?;
        let transaction = connection
            .transaction()
            .map_err(StoreError::sqlite("begin element transaction"))?;
        transaction
            .execute_batch(
                "DELETE FROM elements; DELETE FROM way_nodes; DELETE FROM relation_members;",
            )
            .map_err(StoreError::sqlite("clear elements"))?;
        transaction
            .commit()
            .map_err(StoreError::sqlite("commit element transaction"))
    }
}

fn prepare<'t>(transaction: &'t Transaction<'_>, sql: &str) -> Result<Statement<'t>, StoreError> {
    transaction
        .prepare(sql)
        .map_err(StoreError::sqlite("prepare statement"))
}

fn write_elements(
    transaction: &Transaction<'_>,
    elements: &[Element],
    last_sync: i64,
) -> Result<(), StoreError> {
    if elements.is_empty() {
        return Ok(());
    }

    let mut insert = prepare(
        transaction,
        "INSERT OR REPLACE INTO elements (type, id, version, tags, lon, lat, data, last_sync)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    let mut clear_way_nodes = prepare(transaction, "DELETE FROM way_nodes WHERE way_id = ?1")?;
    let mut insert_way_node = prepare(
        transaction,
        "INSERT OR IGNORE INTO way_nodes (way_id, node_id) VALUES (?1, ?2)",
    )?;
    let mut clear_members =
        prepare(transaction, "DELETE FROM relation_members WHERE relation_id = ?1")?;
    let mut insert_member = prepare(
        transaction,
        "INSERT OR IGNORE INTO relation_members (relation_id, member_type, member_id)
         VALUES (?1, ?2, ?3)",
    )?;

    for element in elements {
        let key = element.key();
        let tags = encode_json(key, element.tags())?;
        let (position, data) = match element {
            Element::Node(node) => (Some(node.position), None),
            Element::Way(way) => (None, Some(encode_json(key, &way.nodes)?)),
            Element::Relation(relation) => (None, Some(encode_json(key, &relation.members)?)),
        };
        insert
            .execute(params![
                key.element_type.as_str(),
                key.id,
                element.version(),
                tags,
                position.map(|coord| coord.x),
                position.map(|coord| coord.y),
                data,
                last_sync,
            ])
            .map_err(StoreError::sqlite("write element"))?;

        match element {
            Element::Node(_) => {}
            Element::Way(way) => {
                clear_way_nodes
                    .execute([way.id])
                    .map_err(StoreError::sqlite("clear way nodes"))?;
                for node_id in &way.nodes {
                    insert_way_node
                        .execute([way.id, *node_id])
                        .map_err(StoreError::sqlite("write way node"))?;
                }
            }
            Element::Relation(relation) => {
                clear_members
                    .execute([relation.id])
                    .map_err(StoreError::sqlite("clear relation members"))?;
                for member in &relation.members {
                    insert_member
                        .execute(params![
                            relation.id,
                            member.key.element_type.as_str(),
                            member.key.id
                        ])
                        .map_err(StoreError::sqlite("write relation member"))?;
                }
            }
        }
    }

    Ok(())
}

fn delete_elements(transaction: &Transaction<'_>, keys: &[ElementKey]) -> Result<usize, StoreError> {
    if keys.is_empty() {
        return Ok(0);
    }

    let mut delete = prepare(transaction, "DELETE FROM elements WHERE type = ?1 AND id = ?2")?;
    let mut delete_way_nodes = prepare(transaction, "DELETE FROM way_nodes WHERE way_id = ?1")?;
    let mut delete_members =
        prepare(transaction, "DELETE FROM relation_members WHERE relation_id = ?1")?;

    let mut removed = 0;
    for key in keys {
        removed += delete
            .execute(params![key.element_type.as_str(), key.id])
            .map_err(StoreError::sqlite("delete element"))?;
        match key.element_type {
            ElementType::Node => {}
            ElementType::Way => {
                delete_way_nodes
                    .execute([key.id])
                    .map_err(StoreError::sqlite("delete way nodes"))?;
            }
            ElementType::Relation => {
                delete_members
                    .execute([key.id])
                    .map_err(StoreError::sqlite("delete relation members"))?;
            }
        }
    }
    Ok(removed)
}

/// Raw `geometries` row before decoding.
struct GeometryRow {
    element_type: String,
    id: i64,
    blob: Vec<u8>,
}

impl GeometryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            element_type: row.get(0)?,
            id: row.get(1)?,
            blob: row.get(2)?,
        })
    }

    fn into_entry(self) -> Result<ElementGeometryEntry, StoreError> {
        let key = parse_key(&self.element_type, self.id)?;
        let geometry =
            bincode::deserialize(&self.blob).map_err(|source| StoreError::Decode {
                key,
                source: Box::new(source),
            })?;
        Ok(ElementGeometryEntry::new(key, geometry))
    }
}

fn query_geometries<P: Params>(
    connection: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<ElementGeometryEntry>, StoreError> {
    let mut statement = connection
        .prepare(sql)
        .map_err(StoreError::sqlite("prepare geometry query"))?;
    let rows = statement
        .query_map(params, GeometryRow::from_row)
        .map_err(StoreError::sqlite("query geometries"))?;
    let mut entries = Vec::new();
    for row in rows {
        let row = row.map_err(StoreError::sqlite("read geometry row"))?;
        entries.push(row.into_entry()?);
    }
    Ok(entries)
}

/// [`GeometryStore`] persisted in SQLite.
///
/// Geometries are `bincode` blobs; envelope columns prefilter box queries
/// before the exact intersection test.
pub struct SqliteGeometryStore {
    connection: Mutex<Connection>,
}

impl fmt::Debug for SqliteGeometryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteGeometryStore").finish_non_exhaustive()
    }
}

impl SqliteGeometryStore {
    /// Open or create the store in the database at `path`.
    pub fn open(path: impl AsRef<Utf8Path>) -> Result<Self, StoreError> {
        Self::with_connection(open_connection(path.as_ref())?)
    }

    /// Create a store in a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(open_memory_connection()?)
    }

    fn with_connection(connection: Connection) -> Result<Self, StoreError> {
        connection
            .execute_batch(GEOMETRY_SCHEMA)
            .map_err(StoreError::sqlite("create geometry schema"))?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        lock(&self.connection, "geometry")
    }
}

impl GeometryStore for SqliteGeometryStore {
    fn get(&self, key: ElementKey) -> Result<Option<ElementGeometry>, StoreError> {
        let connection = self.connection()?;
        let row = connection
            .query_row(
                "SELECT type, id, geometry FROM geometries WHERE type = ?1 AND id = ?2",
                params![key.element_type.as_str(), key.id],
                GeometryRow::from_row,
            )
            .optional()
            .map_err(StoreError::sqlite("get geometry"))?;
        Ok(row
            .map(GeometryRow::into_entry)
            .transpose()?
            .map(|entry| entry.geometry))
    }

    fn get_all(&self, keys: &[ElementKey]) -> Result<Vec<ElementGeometryEntry>, StoreError> {
        let connection = self.connection()?;
        let mut entries = Vec::with_capacity(keys.len());
        for (element_type, ids) in ids_by_type(keys) {
            for chunk in ids.chunks(SQLITE_MAX_VARIABLE_NUMBER) {
                let sql = format!(
                    "SELECT type, id, geometry FROM geometries WHERE type = '{}' AND id IN ({})",
                    element_type.as_str(),
                    placeholders(chunk.len()),
                );
                entries.extend(query_geometries(
                    &connection,
                    &sql,
                    rusqlite::params_from_iter(chunk),
                )?);
            }
        }
        entries.sort_unstable_by_key(|entry| entry.key);
        Ok(entries)
    }

    fn get_all_entries(
        &self,
        bbox: &BoundingBox,
    ) -> Result<Vec<ElementGeometryEntry>, StoreError> {
        let connection = self.connection()?;
        let candidates = query_geometries(
            &connection,
            "SELECT type, id, geometry FROM geometries
             WHERE max_lon >= ?1 AND min_lon <= ?2 AND max_lat >= ?3 AND min_lat <= ?4",
            params![
                bbox.min_lon(),
                bbox.max_lon(),
                bbox.min_lat(),
                bbox.max_lat()
            ],
        )?;
        let mut entries: Vec<_> = candidates
            .into_iter()
            .filter(|entry| entry.geometry.intersects(bbox))
            .collect();
        entries.sort_unstable_by_key(|entry| entry.key);
        Ok(entries)
    }

    fn get_all_keys(&self, bbox: &BoundingBox) -> Result<Vec<ElementKey>, StoreError> {
        Ok(self
            .get_all_entries(bbox)?
            .into_iter()
            .map(|entry| entry.key)
            .collect())
    }

    fn all_keys(&self) -> Result<Vec<ElementKey>, StoreError> {
        let connection = self.connection()?;
        let mut statement = connection
            .prepare("SELECT type, id FROM geometries")
            .map_err(StoreError::sqlite("prepare geometry key query"))?;
        let rows = statement
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(StoreError::sqlite("query geometry keys"))?;
        let mut keys = Vec::new();
        for row in rows {
            let (element_type, id) = row.map_err(StoreError::sqlite("read geometry key"))?;
            keys.push(parse_key(&element_type, id)?);
        }
        keys.sort_unstable();
        Ok(keys)
    }

    fn put_all(&mut self, entries: &[ElementGeometryEntry]) -> Result<(), StoreError> {
        let mut connection = self.connection()?;
        let transaction = connection
            .transaction()
            .map_err(StoreError::sqlite("begin geometry transaction"))?;
        write_geometries(&transaction, entries)?;
        transaction
            .commit()
            .map_err(StoreError::sqlite("commit geometry transaction"))
    }

    fn delete_all(&mut self, keys: &[ElementKey]) -> Result<usize, StoreError> {
        let mut connection = self.connection()?;
        let transaction = connection
            .transaction()
            .map_err(StoreError::sqlite("begin geometry transaction"))?;
        let mut removed = 0;
        {
            let mut delete = transaction
                .prepare("DELETE FROM geometries WHERE type = ?1 AND id = ?2")
                .map_err(StoreError::sqlite("prepare geometry delete"))?;
            for key in keys {
                removed += delete
                    .execute(params![key.element_type.as_str(), key.id])
                    .map_err(StoreError::sqlite("delete geometry"))?;
            }
        }
        transaction
            .commit()
            .map_err(StoreError::sqlite("commit geometry transaction"))?;
        Ok(removed)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.connection()?
            .execute("DELETE FROM geometries", [])
            .map(|_| ())
            .map_err(StoreError::sqlite("clear geometries"))
    }
}

fn write_geometries(
    transaction: &Transaction<'_>,
    entries: &[ElementGeometryEntry],
) -> Result<(), StoreError> {
    if entries.is_empty() {
        return Ok(());
    }

    let mut insert = transaction
        .prepare(
            "INSERT OR REPLACE INTO geometries
                 (type, id, min_lon, min_lat, max_lon, max_lat, geometry)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .map_err(StoreError::sqlite("prepare geometry write"))?;

    for entry in entries {
        let blob = bincode::serialize(&entry.geometry).map_err(|source| StoreError::Encode {
            key: entry.key,
            source: Box::new(source),
        })?;
        let rect = entry.geometry.bounding_rect();
        insert
            .execute(params![
                entry.key.element_type.as_str(),
                entry.key.id,
                rect.map(|rect| rect.min().x),
                rect.map(|rect| rect.min().y),
                rect.map(|rect| rect.max().x),
                rect.map(|rect| rect.max().y),
                blob,
            ])
            .map_err(StoreError::sqlite("write geometry"))?;
    }

    Ok(())
}
