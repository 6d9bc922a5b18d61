//! Controller behaviour against the SQLite stores.
#![cfg(feature = "store-sqlite")]

use camino::{Utf8Path, Utf8PathBuf};
use geo::Coord;
use mapcache_core::{
    BoundingBox, Element, ElementGeometry, ElementKey, ElementUpdates, MapDataController,
    MapDataWithGeometry, Node, Relation, RelationMember, SqliteElementStore, SqliteGeometryStore,
    Tags, Way, test_support::ManualClock,
};
use rstest::{fixture, rstest};
use tempfile::TempDir;

type Controller = MapDataController<SqliteElementStore, SqliteGeometryStore>;

struct Paths {
    _dir: TempDir,
    elements: Utf8PathBuf,
    geometries: Utf8PathBuf,
}

#[fixture]
fn paths() -> Paths {
    let dir = TempDir::new().expect("create temp dir");
    let root = Utf8Path::from_path(dir.path())
        .expect("temp dir path is UTF-8")
        .to_path_buf();
    Paths {
        elements: root.join("cache/elements.db"),
        geometries: root.join("cache/geometries.db"),
        _dir: dir,
    }
}

fn open(paths: &Paths, clock: &ManualClock) -> Controller {
    MapDataController::new(
        SqliteElementStore::open(&paths.elements, clock.clone()).expect("open element store"),
        SqliteGeometryStore::open(&paths.geometries).expect("open geometry store"),
    )
}

fn node(id: i64, x: f64, y: f64) -> Element {
    Node::new(
        id,
        1,
        Coord { x, y },
        Tags::from([("name".to_owned(), format!("node {id}"))]),
    )
    .into()
}

fn square() -> Vec<Element> {
    vec![
        node(1, 0.0, 0.0),
        node(2, 0.1, 0.0),
        node(3, 0.1, 0.1),
        node(4, 0.0, 0.1),
        Way::new(
            10,
            3,
            vec![1, 2, 3, 4, 1],
            Tags::from([("building".to_owned(), "yes".to_owned())]),
        )
        .into(),
    ]
}

fn region() -> BoundingBox {
    BoundingBox::new(-0.05, -0.05, 0.15, 0.15).expect("valid bbox")
}

#[rstest]
fn data_survives_reopening(paths: Paths) {
    let clock = ManualClock::new(1_000);
    {
        let controller = open(&paths, &clock);
        controller
            .put_all_for_bbox(&region(), MapDataWithGeometry::from_elements(square()))
            .expect("import region");
    }

    let controller = open(&paths, &clock);
    let data = controller
        .get_map_data_with_geometry(&region())
        .expect("query region");
    assert_eq!(data.nodes().count(), 4);
    assert_eq!(data.ways().count(), 1);
    assert!(matches!(
        data.geometry(ElementKey::way(10)),
        Some(ElementGeometry::Polygons(_))
    ));
    assert_eq!(controller.get(ElementKey::node(3)).expect("read"), Some(node(3, 0.1, 0.1)));
    controller.check_integrity().expect("consistent stores");
}

#[rstest]
fn reverse_lookups_follow_updates(paths: Paths) {
    let clock = ManualClock::new(1_000);
    let controller = open(&paths, &clock);
    let mut elements = square();
    elements.push(
        Relation::new(
            20,
            1,
            vec![RelationMember::new(ElementKey::way(10), "outer")],
            Tags::from([("type".to_owned(), "multipolygon".to_owned())]),
        )
        .into(),
    );
    controller
        .update_all(&ElementUpdates::new(elements, Vec::new(), Vec::new()))
        .expect("store square");

    let ways: Vec<_> = controller
        .get_ways_for_node(1)
        .expect("ways for node")
        .into_iter()
        .map(|way| way.id)
        .collect();
    assert_eq!(ways, [10]);
    let relations = controller
        .get_relations_for_element(ElementKey::way(10))
        .expect("relations for way");
    assert_eq!(relations.len(), 1);

    controller
        .update_all(&ElementUpdates::new(
            Vec::new(),
            vec![ElementKey::node(3)],
            Vec::new(),
        ))
        .expect("delete corner");
    assert!(
        controller
            .get_geometry(ElementKey::way(10))
            .expect("read geometry")
            .is_none(),
        "way geometry must not outlive its corner"
    );
    controller.check_integrity().expect("consistent stores");
}

#[rstest]
fn pruning_uses_write_time(paths: Paths) {
    let clock = ManualClock::new(1_000);
    let controller = open(&paths, &clock);
    controller
        .put_all_for_bbox(&region(), MapDataWithGeometry::from_elements(square()))
        .expect("import region");
    clock.set(5_000);
    controller
        .update_all(&ElementUpdates::new(
            vec![node(1, 0.0, 0.0)],
            Vec::new(),
            Vec::new(),
        ))
        .expect("touch node");

    let removed = controller.delete_older_than(2_000).expect("prune");

    assert_eq!(removed, 4);
    let remaining = controller
        .get_all(&[ElementKey::node(1), ElementKey::way(10)])
        .expect("read remaining");
    assert_eq!(remaining, [node(1, 0.0, 0.0)]);
    controller.check_integrity().expect("consistent stores");
}

#[rstest]
fn clear_empties_both_databases(paths: Paths) {
    let clock = ManualClock::new(1_000);
    let controller = open(&paths, &clock);
    controller
        .put_all_for_bbox(&region(), MapDataWithGeometry::from_elements(square()))
        .expect("import region");

    controller.clear().expect("clear");

    assert!(
        controller
            .get_map_data_with_geometry(&region())
            .expect("query region")
            .is_empty()
    );
}
