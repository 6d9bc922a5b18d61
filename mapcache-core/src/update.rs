//! Incremental updates applied after a local edit or an upload response.

use std::collections::HashSet;

use thiserror::Error;

use crate::{Element, ElementKey, ElementType};

/// Promotion of a provisional identifier to the one assigned remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementIdUpdate {
    /// Type of the element whose identifier changed.
    pub element_type: ElementType,
    /// Provisional identifier being retired.
    pub old_id: i64,
    /// Identifier assigned by the remote authority.
    pub new_id: i64,
}

impl ElementIdUpdate {
    /// Describe an identifier change.
    pub const fn new(element_type: ElementType, old_id: i64, new_id: i64) -> Self {
        Self {
            element_type,
            old_id,
            new_id,
        }
    }

    /// Key being retired.
    pub const fn old_key(&self) -> ElementKey {
        ElementKey::new(self.element_type, self.old_id)
    }

    /// Key taking over.
    pub const fn new_key(&self) -> ElementKey {
        ElementKey::new(self.element_type, self.new_id)
    }
}

/// Input of [`crate::MapDataController::update_all`].
///
/// `updated` holds full replacements (or new elements), `deleted` keys are
/// removed outright, and each id update retires its old key. The element
/// carrying an id update's new identifier must be part of `updated`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementUpdates {
    /// Elements to upsert.
    pub updated: Vec<Element>,
    /// Keys to delete.
    pub deleted: Vec<ElementKey>,
    /// Identifier promotions.
    pub id_updates: Vec<ElementIdUpdate>,
}

/// Reasons an [`ElementUpdates`] value is rejected before touching storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidUpdateError {
    /// An id update retires a key that is also deleted explicitly.
    #[error("{key} is both retired by an id update and deleted")]
    RetiredKeyDeleted {
        /// Conflicting key.
        key: ElementKey,
    },
    /// An id update retires a key that is also upserted.
    #[error("{key} is retired by an id update but still listed as updated")]
    RetiredKeyUpdated {
        /// Conflicting key.
        key: ElementKey,
    },
    /// The element carrying the new identifier is missing from `updated`.
    #[error("id update {old} -> {new} has no updated element for {new}")]
    MissingRenamedElement {
        /// Retired key.
        old: ElementKey,
        /// Key that should have been updated.
        new: ElementKey,
    },
}

impl ElementUpdates {
    /// Bundle the three parts of an update.
    pub const fn new(
        updated: Vec<Element>,
        deleted: Vec<ElementKey>,
        id_updates: Vec<ElementIdUpdate>,
    ) -> Self {
        Self {
            updated,
            deleted,
            id_updates,
        }
    }

    /// Check the cross-collection invariants.
    ///
    /// # Examples
    /// ```
    /// use geo::Coord;
    /// use mapcache_core::{ElementIdUpdate, ElementType, ElementUpdates, Node, Tags};
    ///
    /// let node = Node::new(1, 1, Coord { x: 0.0, y: 0.0 }, Tags::new());
    /// let update = ElementUpdates::new(
    ///     vec![node.into()],
    ///     Vec::new(),
    ///     vec![ElementIdUpdate::new(ElementType::Node, -1, 1)],
    /// );
    /// assert!(update.validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), InvalidUpdateError> {
        let updated: HashSet<ElementKey> = self.updated.iter().map(Element::key).collect();
        let deleted: HashSet<ElementKey> = self.deleted.iter().copied().collect();
        for id_update in &self.id_updates {
            let old = id_update.old_key();
            let new = id_update.new_key();
            if deleted.contains(&old) {
                return Err(InvalidUpdateError::RetiredKeyDeleted { key: old });
            }
            if old != new && updated.contains(&old) {
                return Err(InvalidUpdateError::RetiredKeyUpdated { key: old });
            }
            if !updated.contains(&new) {
                return Err(InvalidUpdateError::MissingRenamedElement { old, new });
            }
        }
        Ok(())
    }

    /// Keys removed by this update: explicit deletions followed by retired keys.
    pub fn effective_deleted_keys(&self) -> Vec<ElementKey> {
        self.deleted
            .iter()
            .copied()
            .chain(self.id_updates.iter().map(ElementIdUpdate::old_key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Node, Tags};
    use geo::Coord;
    use rstest::rstest;

    fn node(id: i64) -> Element {
        Node::new(id, 1, Coord { x: 0.0, y: 0.0 }, Tags::new()).into()
    }

    #[rstest]
    fn effective_deletions_append_retired_keys() {
        let update = ElementUpdates::new(
            vec![node(1)],
            vec![ElementKey::node(5), ElementKey::node(6)],
            vec![ElementIdUpdate::new(ElementType::Node, -1, 1)],
        );
        assert_eq!(
            update.effective_deleted_keys(),
            [ElementKey::node(5), ElementKey::node(6), ElementKey::node(-1)]
        );
    }

    #[rstest]
    fn rejects_retired_key_that_is_deleted() {
        let update = ElementUpdates::new(
            vec![node(1)],
            vec![ElementKey::node(-1)],
            vec![ElementIdUpdate::new(ElementType::Node, -1, 1)],
        );
        assert_eq!(
            update.validate(),
            Err(InvalidUpdateError::RetiredKeyDeleted {
                key: ElementKey::node(-1)
            })
        );
    }

    #[rstest]
    fn rejects_retired_key_that_is_updated() {
        let update = ElementUpdates::new(
            vec![node(1), node(-1)],
            Vec::new(),
            vec![ElementIdUpdate::new(ElementType::Node, -1, 1)],
        );
        assert!(matches!(
            update.validate(),
            Err(InvalidUpdateError::RetiredKeyUpdated { .. })
        ));
    }

    #[rstest]
    fn rejects_missing_renamed_element() {
        let update = ElementUpdates::new(
            Vec::new(),
            Vec::new(),
            vec![ElementIdUpdate::new(ElementType::Node, -1, 1)],
        );
        assert!(matches!(
            update.validate(),
            Err(InvalidUpdateError::MissingRenamedElement { .. })
        ));
    }

    #[rstest]
    fn accepts_deletion_of_the_new_key() {
        // Deletes run before upserts, so the renamed element survives.
        let update = ElementUpdates::new(
            vec![node(1)],
            vec![ElementKey::node(1)],
            vec![ElementIdUpdate::new(ElementType::Node, -1, 1)],
        );
        assert!(update.validate().is_ok());
    }
}
