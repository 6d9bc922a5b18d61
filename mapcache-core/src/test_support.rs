//! Deterministic clocks, call-recording stores and listeners used by unit and
//! behaviour tests.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicI64, Ordering},
};
#[cfg(any(test, feature = "test-support"))]
use std::sync::atomic::AtomicUsize;

use crate::{
    BoundingBox, Clock, Element, ElementGeometry, ElementGeometryEntry, ElementKey,
    ElementStore, GeometryStore, MapDataListener, MapDataWithGeometry, MemoryElementStore,
    MemoryGeometryStore, Relation, StoreError, Way,
};

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give
/// another to a store.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    /// Start the clock at `millis`.
    pub fn new(millis: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(millis)),
        }
    }

    /// Jump to `millis`.
    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    /// Move forward by `millis`.
    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Mutating store call captured by the recording stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// `ElementStore::put_all` with the keys written.
    PutElements(Vec<ElementKey>),
    /// `ElementStore::delete_all` with the keys passed.
    DeleteElements(Vec<ElementKey>),
    /// `ElementStore::clear`.
    ClearElements,
    /// `GeometryStore::put_all` with the keys written.
    PutGeometries(Vec<ElementKey>),
    /// `GeometryStore::delete_all` with the keys passed.
    DeleteGeometries(Vec<ElementKey>),
    /// `GeometryStore::clear`.
    ClearGeometries,
}

/// Ordered log of store calls, shareable between stores.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<StoreCall>>>,
}

impl CallLog {
    fn record(&self, call: StoreCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// Calls recorded so far.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget recorded calls, typically after seeding the stores.
    pub fn reset(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// [`MemoryElementStore`] that logs every mutating call.
#[derive(Debug, Default)]
pub struct RecordingElementStore {
    inner: MemoryElementStore,
    log: CallLog,
}

impl RecordingElementStore {
    /// Wrap `inner`, appending calls to `log`.
    pub fn new(inner: MemoryElementStore, log: CallLog) -> Self {
        Self { inner, log }
    }
}

impl ElementStore for RecordingElementStore {
    fn get(&self, key: ElementKey) -> Result<Option<Element>, StoreError> {
        self.inner.get(key)
    }

    fn get_all(&self, keys: &[ElementKey]) -> Result<Vec<Element>, StoreError> {
        self.inner.get_all(keys)
    }

    fn get_ids_older_than(&self, timestamp: i64) -> Result<Vec<ElementKey>, StoreError> {
        self.inner.get_ids_older_than(timestamp)
    }

    fn ways_for_node(&self, node_id: i64) -> Result<Vec<Way>, StoreError> {
        self.inner.ways_for_node(node_id)
    }

    fn relations_for_member(&self, key: ElementKey) -> Result<Vec<Relation>, StoreError> {
        self.inner.relations_for_member(key)
    }

    fn count(&self) -> Result<usize, StoreError> {
        self.inner.count()
    }

    fn put_all(&mut self, elements: &[Element]) -> Result<(), StoreError> {
        self.log.record(StoreCall::PutElements(
            elements.iter().map(Element::key).collect(),
        ));
        self.inner.put_all(elements)
    }

    fn delete_all(&mut self, keys: &[ElementKey]) -> Result<usize, StoreError> {
        self.log.record(StoreCall::DeleteElements(keys.to_vec()));
        self.inner.delete_all(keys)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.log.record(StoreCall::ClearElements);
        self.inner.clear()
    }
}

/// [`MemoryGeometryStore`] that logs every mutating call.
#[derive(Debug, Default)]
pub struct RecordingGeometryStore {
    inner: MemoryGeometryStore,
    log: CallLog,
}

impl RecordingGeometryStore {
    /// Wrap `inner`, appending calls to `log`.
    pub fn new(inner: MemoryGeometryStore, log: CallLog) -> Self {
        Self { inner, log }
    }
}

impl GeometryStore for RecordingGeometryStore {
    fn get(&self, key: ElementKey) -> Result<Option<ElementGeometry>, StoreError> {
        self.inner.get(key)
    }

    fn get_all(&self, keys: &[ElementKey]) -> Result<Vec<ElementGeometryEntry>, StoreError> {
        self.inner.get_all(keys)
    }

    fn get_all_entries(
        &self,
        bbox: &BoundingBox,
    ) -> Result<Vec<ElementGeometryEntry>, StoreError> {
        self.inner.get_all_entries(bbox)
    }

    fn get_all_keys(&self, bbox: &BoundingBox) -> Result<Vec<ElementKey>, StoreError> {
        self.inner.get_all_keys(bbox)
    }

    fn all_keys(&self) -> Result<Vec<ElementKey>, StoreError> {
        self.inner.all_keys()
    }

    fn put_all(&mut self, entries: &[ElementGeometryEntry]) -> Result<(), StoreError> {
        self.log.record(StoreCall::PutGeometries(
            entries.iter().map(|entry| entry.key).collect(),
        ));
        self.inner.put_all(entries)
    }

    fn delete_all(&mut self, keys: &[ElementKey]) -> Result<usize, StoreError> {
        self.log.record(StoreCall::DeleteGeometries(keys.to_vec()));
        self.inner.delete_all(keys)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.log.record(StoreCall::ClearGeometries);
        self.inner.clear()
    }
}

/// Notification captured by [`RecordingListener`].
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    /// `on_updated` payload.
    Updated {
        /// Changed elements with geometry.
        data: MapDataWithGeometry,
        /// Removed keys.
        deleted: Vec<ElementKey>,
    },
    /// `on_replaced_for_bbox` payload.
    ReplacedForBBox {
        /// Replaced region.
        bbox: BoundingBox,
        /// New contents of the region.
        data: MapDataWithGeometry,
    },
    /// `on_cleared`.
    Cleared,
}

/// Event log shared by several [`RecordingListener`]s, tagged by name.
#[derive(Debug, Clone, Default)]
pub struct ListenerLog {
    events: Arc<Mutex<Vec<(&'static str, ListenerEvent)>>>,
}

impl ListenerLog {
    fn record(&self, name: &'static str, event: ListenerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name, event));
    }

    /// Every event in delivery order, tagged with the receiving listener.
    pub fn events(&self) -> Vec<(&'static str, ListenerEvent)> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// [`MapDataListener`] that records every notification.
#[derive(Debug, Clone)]
pub struct RecordingListener {
    name: &'static str,
    log: ListenerLog,
}

impl Default for RecordingListener {
    fn default() -> Self {
        Self::with_log("listener", ListenerLog::default())
    }
}

impl RecordingListener {
    /// Create a log to share between listeners.
    pub fn shared_log() -> ListenerLog {
        ListenerLog::default()
    }

    /// Listener appending to `log` under `name`.
    pub fn with_log(name: &'static str, log: ListenerLog) -> Self {
        Self { name, log }
    }

    /// Events received by this listener, in order.
    pub fn events(&self) -> Vec<ListenerEvent> {
        self.log
            .events()
            .into_iter()
            .filter(|(name, _)| *name == self.name)
            .map(|(_, event)| event)
            .collect()
    }
}

impl MapDataListener for RecordingListener {
    fn on_updated(&self, updated: &MapDataWithGeometry, deleted: &[ElementKey]) {
        self.log.record(
            self.name,
            ListenerEvent::Updated {
                data: updated.clone(),
                deleted: deleted.to_vec(),
            },
        );
    }

    fn on_replaced_for_bbox(&self, bbox: &BoundingBox, data: &MapDataWithGeometry) {
        self.log.record(
            self.name,
            ListenerEvent::ReplacedForBBox {
                bbox: *bbox,
                data: data.clone(),
            },
        );
    }

    fn on_cleared(&self) {
        self.log.record(self.name, ListenerEvent::Cleared);
    }
}

/// Switch telling a [`FailingGeometryStore`] how many upcoming writes fail.
#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
#[derive(Debug, Clone, Default)]
pub struct FailureSwitch {
    remaining: Arc<AtomicUsize>,
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
impl FailureSwitch {
    /// Fail the next `count` `put_all` calls.
    pub fn fail_next_puts(&self, count: usize) {
        self.remaining.store(count, Ordering::SeqCst);
    }

    fn trip(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }
}

/// [`MemoryGeometryStore`] whose `put_all` can be made to fail on demand.
#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
#[derive(Debug, Default)]
pub struct FailingGeometryStore {
    inner: MemoryGeometryStore,
    switch: FailureSwitch,
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
impl FailingGeometryStore {
    /// Store controlled by `switch`.
    pub fn new(switch: FailureSwitch) -> Self {
        Self {
            inner: MemoryGeometryStore::new(),
            switch,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
impl GeometryStore for FailingGeometryStore {
    fn get(&self, key: ElementKey) -> Result<Option<ElementGeometry>, StoreError> {
        self.inner.get(key)
    }

    fn get_all(&self, keys: &[ElementKey]) -> Result<Vec<ElementGeometryEntry>, StoreError> {
        self.inner.get_all(keys)
    }

    fn get_all_entries(
        &self,
        bbox: &BoundingBox,
    ) -> Result<Vec<ElementGeometryEntry>, StoreError> {
        self.inner.get_all_entries(bbox)
    }

    fn get_all_keys(&self, bbox: &BoundingBox) -> Result<Vec<ElementKey>, StoreError> {
        self.inner.get_all_keys(bbox)
    }

    fn all_keys(&self) -> Result<Vec<ElementKey>, StoreError> {
        self.inner.all_keys()
    }

    fn put_all(&mut self, entries: &[ElementGeometryEntry]) -> Result<(), StoreError> {
        if self.switch.trip() {
            return Err(StoreError::Unavailable {
                store: "geometry",
                reason: "injected write failure".to_owned(),
            });
        }
        self.inner.put_all(entries)
    }

    fn delete_all(&mut self, keys: &[ElementKey]) -> Result<usize, StoreError> {
        self.inner.delete_all(keys)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.inner.clear()
    }
}
