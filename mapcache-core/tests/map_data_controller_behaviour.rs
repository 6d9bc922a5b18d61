//! Behavioural tests for `MapDataController` using rstest-bdd.

use std::{
    cell::{Cell, RefCell},
    sync::Arc,
};

use geo::Coord;
use mapcache_core::{
    BoundingBox, Element, ElementGeometry, ElementIdUpdate, ElementKey, ElementType,
    ElementUpdates, MapDataController, MapDataError, MapDataWithGeometry, MemoryElementStore,
    MemoryGeometryStore, Node, Tags, Way,
    test_support::{
        CallLog, ListenerEvent, ManualClock, RecordingElementStore, RecordingGeometryStore,
        RecordingListener, StoreCall,
    },
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

type Controller = MapDataController<RecordingElementStore, RecordingGeometryStore>;

/// Shared state for controller scenarios.
struct ControllerWorld {
    controller: Controller,
    clock: ManualClock,
    log: CallLog,
    listener: Arc<RecordingListener>,
    error: RefCell<Option<MapDataError>>,
    removed: Cell<usize>,
    queried: RefCell<Option<MapDataWithGeometry>>,
}

impl ControllerWorld {
    fn new() -> Self {
        let clock = ManualClock::new(0);
        let log = CallLog::default();
        let controller = MapDataController::new(
            RecordingElementStore::new(MemoryElementStore::with_clock(clock.clone()), log.clone()),
            RecordingGeometryStore::new(MemoryGeometryStore::new(), log.clone()),
        );
        let listener = Arc::new(RecordingListener::default());
        controller.add_listener(listener.clone());
        Self {
            controller,
            clock,
            log,
            listener,
            error: RefCell::new(None),
            removed: Cell::new(0),
            queried: RefCell::new(None),
        }
    }

    fn seed(&self, elements: Vec<Element>) {
        self.controller
            .update_all(&ElementUpdates::new(elements, Vec::new(), Vec::new()))
            .expect("seed controller");
        self.log.reset();
    }

    fn apply(&self, updates: &ElementUpdates) {
        if let Err(error) = self.controller.update_all(updates) {
            self.error.replace(Some(error));
        }
    }

    fn last_event(&self) -> ListenerEvent {
        self.listener
            .events()
            .last()
            .cloned()
            .expect("a notification should have been delivered")
    }

    fn assert_absent(&self, key: ElementKey) {
        assert!(
            self.controller.get(key).expect("read element").is_none(),
            "{key} should not be stored"
        );
        assert!(
            self.controller
                .get_geometry(key)
                .expect("read geometry")
                .is_none(),
            "{key} should have no geometry"
        );
    }
}

#[fixture]
fn world() -> ControllerWorld {
    ControllerWorld::new()
}

fn node(id: i64, x: f64, y: f64) -> Element {
    Node::new(id, 1, Coord { x, y }, Tags::new()).into()
}

fn around_origin() -> BoundingBox {
    BoundingBox::new(-1.0, -1.0, 1.0, 1.0).expect("valid bbox")
}

fn retired_keys() -> Vec<ElementKey> {
    vec![ElementKey::node(5), ElementKey::node(6), ElementKey::node(-1)]
}

#[given("a controller holding nodes 5, 6 and provisional node -1")]
fn given_provisional(world: &ControllerWorld) {
    world.seed(vec![node(5, 0.5, 0.5), node(6, 0.6, 0.6), node(-1, 0.1, 0.1)]);
}

#[given("a controller holding node 1 written at 1000 and node 2 written at 2000")]
fn given_aged(world: &ControllerWorld) {
    world.clock.set(1_000);
    world.seed(vec![node(1, 0.0, 0.0)]);
    world.clock.set(2_000);
    world.seed(vec![node(2, 0.0, 0.0)]);
}

#[given("an empty controller")]
fn given_empty(world: &ControllerWorld) {
    assert_eq!(world.controller.listener_count(), 1);
}

#[given("a controller holding a way near the origin and a node far away")]
fn given_way_and_distant_node(world: &ControllerWorld) {
    world.seed(vec![
        node(1, 0.0, 0.0),
        node(2, 0.5, 0.5),
        Way::new(10, 1, vec![1, 2], Tags::new()).into(),
        node(3, 10.0, 10.0),
    ]);
}

#[when("I upload nodes 1 and 2, delete nodes 5 and 6 and promote node -1 to 1")]
fn when_upload(world: &ControllerWorld) {
    world.apply(&ElementUpdates::new(
        vec![node(1, 0.1, 0.1), node(2, 0.2, 0.2)],
        vec![ElementKey::node(5), ElementKey::node(6)],
        vec![ElementIdUpdate::new(ElementType::Node, -1, 1)],
    ));
}

#[when("I promote node -1 to 1 while also deleting node -1")]
fn when_conflicting_update(world: &ControllerWorld) {
    world.apply(&ElementUpdates::new(
        vec![node(1, 0.1, 0.1)],
        vec![ElementKey::node(-1)],
        vec![ElementIdUpdate::new(ElementType::Node, -1, 1)],
    ));
}

#[when("I delete elements older than 1500")]
fn when_prune(world: &ControllerWorld) {
    let removed = world
        .controller
        .delete_older_than(1_500)
        .expect("delete older elements");
    world.removed.set(removed);
}

#[when("I replace the region around the origin with nodes 1 and 2")]
fn when_replace(world: &ControllerWorld) {
    let data = MapDataWithGeometry::from_elements([node(1, 0.1, 0.1), node(2, 0.2, 0.2)]);
    world
        .controller
        .put_all_for_bbox(&around_origin(), data)
        .expect("replace region");
}

#[when("I query the region around the origin")]
fn when_query(world: &ControllerWorld) {
    let data = world
        .controller
        .get_map_data_with_geometry(&around_origin())
        .expect("query region");
    world.queried.replace(Some(data));
}

#[then("nodes 5, 6 and -1 are absent from both stores")]
fn then_retired_absent(world: &ControllerWorld) {
    assert!(world.error.borrow().is_none(), "unexpected controller error");
    for key in retired_keys() {
        world.assert_absent(key);
    }
}

#[then("nodes 1 and 2 are stored with point geometry")]
fn then_points_stored(world: &ControllerWorld) {
    for id in [1, 2] {
        let key = ElementKey::node(id);
        assert!(world.controller.get(key).expect("read element").is_some());
        assert!(matches!(
            world.controller.get_geometry(key).expect("read geometry"),
            Some(ElementGeometry::Point(_))
        ));
    }
    world
        .controller
        .check_integrity()
        .expect("no orphan geometry");
}

#[then("listeners were told that nodes 5, 6 and -1 were deleted")]
fn then_told_about_retired(world: &ControllerWorld) {
    let ListenerEvent::Updated { data, deleted } = world.last_event() else {
        panic!("expected an update notification");
    };
    assert_eq!(deleted, retired_keys());
    let keys: Vec<_> = data.keys().collect();
    assert_eq!(keys, [ElementKey::node(1), ElementKey::node(2)]);
}

#[then("one element is reported as removed")]
fn then_one_removed(world: &ControllerWorld) {
    assert_eq!(world.removed.get(), 1);
}

#[then("node 1 is absent from both stores")]
fn then_node_one_absent(world: &ControllerWorld) {
    world.assert_absent(ElementKey::node(1));
    assert!(
        world
            .controller
            .get(ElementKey::node(2))
            .expect("read element")
            .is_some()
    );
}

#[then("listeners were told that node 1 was deleted with no additions")]
fn then_told_about_pruned(world: &ControllerWorld) {
    assert_eq!(
        world.last_event(),
        ListenerEvent::Updated {
            data: MapDataWithGeometry::default(),
            deleted: vec![ElementKey::node(1)],
        }
    );
}

#[then("both stores received empty delete sets")]
fn then_empty_deletes(world: &ControllerWorld) {
    let calls = world.log.calls();
    assert_eq!(
        calls.get(..2),
        Some(
            [
                StoreCall::DeleteGeometries(Vec::new()),
                StoreCall::DeleteElements(Vec::new()),
            ]
            .as_slice()
        )
    );
}

#[then("listeners received the replacement with geometry attached")]
fn then_told_about_replacement(world: &ControllerWorld) {
    let ListenerEvent::ReplacedForBBox { bbox, data } = world.last_event() else {
        panic!("expected a replace notification");
    };
    assert_eq!(bbox, around_origin());
    assert_eq!(data.len(), 2);
    assert!(data.geometry(ElementKey::node(1)).is_some());
    assert!(data.geometry(ElementKey::node(2)).is_some());
}

#[then("the way and its nodes are returned with geometry")]
fn then_way_returned(world: &ControllerWorld) {
    let queried = world.queried.borrow();
    let data = queried.as_ref().expect("query should have run");
    assert_eq!(data.ways().count(), 1);
    assert_eq!(data.nodes().count(), 2);
    assert!(matches!(
        data.geometry(ElementKey::way(10)),
        Some(ElementGeometry::Polyline(_))
    ));
}

#[then("the distant node is not returned")]
fn then_distant_excluded(world: &ControllerWorld) {
    let queried = world.queried.borrow();
    let data = queried.as_ref().expect("query should have run");
    assert!(!data.contains(ElementKey::node(3)));
}

#[then("the update is rejected as invalid")]
fn then_rejected(world: &ControllerWorld) {
    assert!(matches!(
        world.error.borrow().as_ref(),
        Some(MapDataError::InvalidUpdate(_))
    ));
    assert!(world.log.calls().is_empty(), "no store call may happen");
}

#[then("provisional node -1 is still stored")]
fn then_provisional_kept(world: &ControllerWorld) {
    assert!(
        world
            .controller
            .get(ElementKey::node(-1))
            .expect("read element")
            .is_some()
    );
}

#[scenario(path = "tests/features/map_data_controller.feature", index = 0)]
fn edit_with_id_update(world: ControllerWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/map_data_controller.feature", index = 1)]
fn prune_older_elements(world: ControllerWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/map_data_controller.feature", index = 2)]
fn replace_empty_region(world: ControllerWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/map_data_controller.feature", index = 3)]
fn query_bounding_box(world: ControllerWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/map_data_controller.feature", index = 4)]
fn reject_inconsistent_update(world: ControllerWorld) {
    let _ = world;
}
