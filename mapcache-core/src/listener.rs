//! Change notifications emitted after each committed mutation.

use std::sync::{Arc, PoisonError, RwLock};

use crate::{BoundingBox, ElementKey, MapDataWithGeometry};

/// Observer of committed map-data changes.
///
/// Exactly one notification is delivered per mutation, after the stores
/// have been updated. Callbacks may read from the controller but must not
/// call its mutating operations.
pub trait MapDataListener: Send + Sync {
    /// Elements were added or changed, and `deleted` keys were removed.
    ///
    /// `updated` carries the new elements with whatever geometry could be
    /// computed for them.
    fn on_updated(&self, updated: &MapDataWithGeometry, deleted: &[ElementKey]);

    /// Everything inside `bbox` was replaced by `data`.
    fn on_replaced_for_bbox(&self, bbox: &BoundingBox, data: &MapDataWithGeometry);

    /// Both stores were emptied.
    fn on_cleared(&self) {}
}

/// Registered listeners in registration order.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn MapDataListener>>>,
}

impl ListenerRegistry {
    pub(crate) fn add(&self, listener: Arc<dyn MapDataListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Remove the first registration of `listener`, compared by identity.
    pub(crate) fn remove(&self, listener: &Arc<dyn MapDataListener>) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let target = Arc::as_ptr(listener).cast::<()>();
        let Some(position) = listeners
            .iter()
            .position(|candidate| Arc::as_ptr(candidate).cast::<()>() == target)
        else {
            return false;
        };
        listeners.remove(position);
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Invoke `notify` on a snapshot of the listeners so callbacks may
    /// register or remove listeners without deadlocking.
    pub(crate) fn dispatch(&self, notify: impl Fn(&dyn MapDataListener)) {
        let snapshot = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in snapshot {
            notify(listener.as_ref());
        }
    }
}
