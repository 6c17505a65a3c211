//! Persistent model indexes.
//!
//! A [`PersistentModelIndex`] is a shared, remappable handle to a model
//! position. Models that support persistence keep a
//! [`PersistentIndexRegistry`] holding weak references to every handle they
//! gave out, and update them as rows and columns move:
//!
//! - insertion shifts later siblings forward,
//! - removal shifts later siblings back and invalidates everything inside
//!   the removed range (at any depth),
//! - layout changes remap every handle through a model-supplied function,
//! - resets invalidate everything.
//!
//! Handles whose last owner dropped them are pruned lazily.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::index::ModelIndex;
use super::traits::Orientation;

/// A long-lived reference to a model item that follows structural changes.
///
/// Cloning shares the same underlying slot, so all clones observe updates.
#[derive(Clone)]
pub struct PersistentModelIndex {
    slot: Arc<RwLock<ModelIndex>>,
}

impl PersistentModelIndex {
    /// Creates a handle that no model tracks. It always returns `index`.
    pub fn detached(index: ModelIndex) -> Self {
        Self {
            slot: Arc::new(RwLock::new(index)),
        }
    }

    /// Returns the current index.
    pub fn index(&self) -> ModelIndex {
        self.slot.read().clone()
    }

    /// Returns `true` while the referenced item still exists.
    pub fn is_valid(&self) -> bool {
        self.slot.read().is_valid()
    }

    /// Returns the current row.
    pub fn row(&self) -> usize {
        self.slot.read().row()
    }

    /// Returns the current column.
    pub fn column(&self) -> usize {
        self.slot.read().column()
    }

    pub(crate) fn set(&self, index: ModelIndex) {
        *self.slot.write() = index;
    }
}

impl PartialEq for PersistentModelIndex {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot) || self.index() == other.index()
    }
}

impl std::fmt::Debug for PersistentModelIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PersistentModelIndex").field(&self.index()).finish()
    }
}

/// Registry of the persistent indexes a model has handed out.
#[derive(Default)]
pub struct PersistentIndexRegistry {
    entries: Mutex<Vec<Weak<RwLock<ModelIndex>>>>,
}

impl std::fmt::Debug for PersistentIndexRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentIndexRegistry")
            .field("live", &self.len())
            .finish()
    }
}

impl PersistentIndexRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and tracks a persistent handle for `index`.
    ///
    /// Invalid indexes yield a detached invalid handle.
    pub fn track(&self, index: ModelIndex) -> PersistentModelIndex {
        let handle = PersistentModelIndex::detached(index);
        if handle.is_valid() {
            self.entries.lock().push(Arc::downgrade(&handle.slot));
        }
        handle
    }

    /// Returns the number of live handles.
    pub fn len(&self) -> usize {
        self.live().len()
    }

    /// Returns `true` if no live handle is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every live, valid handle.
    pub fn handles(&self) -> Vec<PersistentModelIndex> {
        self.live()
            .into_iter()
            .map(|slot| PersistentModelIndex { slot })
            .filter(PersistentModelIndex::is_valid)
            .collect()
    }

    fn live(&self) -> Vec<Arc<RwLock<ModelIndex>>> {
        let mut entries = self.entries.lock();
        entries.retain(|weak| weak.strong_count() > 0);
        entries.iter().filter_map(Weak::upgrade).collect()
    }

    /// Classifies handles affected by inserting `count` items at `first`
    /// under `parent`. Call before the model changes, apply after.
    pub fn begin_insert(
        &self,
        parent: &ModelIndex,
        orientation: Orientation,
        first: usize,
        count: usize,
        parent_of: &dyn Fn(&ModelIndex) -> ModelIndex,
    ) -> PendingPersistentUpdate {
        let moved = self
            .live()
            .into_iter()
            .filter(|slot| {
                let index = slot.read().clone();
                index.is_valid()
                    && position(&index, orientation) >= first
                    && parent_of(&index) == *parent
            })
            .collect();
        PendingPersistentUpdate {
            orientation,
            delta: count as isize,
            moved,
            invalidated: Vec::new(),
        }
    }

    /// Classifies handles affected by removing `first..=last` under `parent`.
    ///
    /// Siblings after the range move back. Items inside the range, and any
    /// descendant of them, are invalidated. Call before the model changes,
    /// apply after.
    pub fn begin_remove(
        &self,
        parent: &ModelIndex,
        orientation: Orientation,
        first: usize,
        last: usize,
        parent_of: &dyn Fn(&ModelIndex) -> ModelIndex,
    ) -> PendingPersistentUpdate {
        let mut moved = Vec::new();
        let mut invalidated = Vec::new();
        for slot in self.live() {
            let index = slot.read().clone();
            if !index.is_valid() {
                continue;
            }
            let mut current = index.clone();
            loop {
                let current_parent = parent_of(&current);
                if current_parent == *parent {
                    let pos = position(&current, orientation);
                    if (first..=last).contains(&pos) {
                        invalidated.push(slot.clone());
                    } else if pos > last && current == index {
                        moved.push(slot.clone());
                    }
                    break;
                }
                if !current_parent.is_valid() {
                    break;
                }
                current = current_parent;
            }
        }
        PendingPersistentUpdate {
            orientation,
            delta: -((last - first + 1) as isize),
            moved,
            invalidated,
        }
    }

    /// Replaces every live index with `remap(index)`.
    pub fn remap(&self, mut remap: impl FnMut(&ModelIndex) -> ModelIndex) {
        for slot in self.live() {
            let updated = remap(&slot.read());
            *slot.write() = updated;
        }
    }

    /// Invalidates every live handle.
    pub fn invalidate_all(&self) {
        for slot in self.live() {
            *slot.write() = ModelIndex::invalid();
        }
    }
}

/// Handles classified by [`PersistentIndexRegistry::begin_insert`] or
/// [`PersistentIndexRegistry::begin_remove`], waiting to be updated.
#[derive(Debug)]
pub struct PendingPersistentUpdate {
    orientation: Orientation,
    delta: isize,
    moved: Vec<Arc<RwLock<ModelIndex>>>,
    invalidated: Vec<Arc<RwLock<ModelIndex>>>,
}

impl PendingPersistentUpdate {
    /// Applies the shift and invalidation.
    pub fn apply(self) {
        for slot in self.moved {
            let mut index = slot.write();
            let shifted = position(&index, self.orientation).saturating_add_signed(self.delta);
            *index = match self.orientation {
                Orientation::Vertical => index.relocated(shifted, index.column()),
                Orientation::Horizontal => index.relocated(index.row(), shifted),
            };
        }
        for slot in self.invalidated {
            *slot.write() = ModelIndex::invalid();
        }
    }
}

fn position(index: &ModelIndex, orientation: Orientation) -> usize {
    match orientation {
        Orientation::Vertical => index.row(),
        Orientation::Horizontal => index.column(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_parent(_: &ModelIndex) -> ModelIndex {
        ModelIndex::invalid()
    }

    #[test]
    fn test_detached_handle_never_moves() {
        let handle = PersistentModelIndex::detached(ModelIndex::new(3, 1, ModelIndex::invalid()));
        assert!(handle.is_valid());
        assert_eq!((handle.row(), handle.column()), (3, 1));
    }

    #[test]
    fn test_insert_shifts_later_rows() {
        let registry = PersistentIndexRegistry::new();
        let before = registry.track(ModelIndex::new(1, 0, ModelIndex::invalid()));
        let at = registry.track(ModelIndex::new(2, 0, ModelIndex::invalid()));
        let after = registry.track(ModelIndex::new(4, 0, ModelIndex::invalid()));

        registry
            .begin_insert(&ModelIndex::invalid(), Orientation::Vertical, 2, 3, &flat_parent)
            .apply();

        assert_eq!(before.row(), 1);
        assert_eq!(at.row(), 5);
        assert_eq!(after.row(), 7);
    }

    #[test]
    fn test_remove_shifts_and_invalidates() {
        let registry = PersistentIndexRegistry::new();
        let kept = registry.track(ModelIndex::new(0, 0, ModelIndex::invalid()));
        let removed = registry.track(ModelIndex::new(2, 0, ModelIndex::invalid()));
        let shifted = registry.track(ModelIndex::new(5, 2, ModelIndex::invalid()));

        registry
            .begin_remove(&ModelIndex::invalid(), Orientation::Vertical, 1, 3, &flat_parent)
            .apply();

        assert_eq!(kept.row(), 0);
        assert!(!removed.is_valid());
        assert_eq!((shifted.row(), shifted.column()), (2, 2));
    }

    #[test]
    fn test_remove_invalidates_descendants() {
        let registry = PersistentIndexRegistry::new();
        let parent = ModelIndex::with_internal_id(1, 0, ModelIndex::invalid(), 10);
        let child = ModelIndex::with_internal_id(0, 0, parent.clone(), 11);
        let grandchild = ModelIndex::with_internal_id(4, 0, child.clone(), 12);
        let handle = registry.track(grandchild);

        registry
            .begin_remove(&ModelIndex::invalid(), Orientation::Vertical, 1, 1, &|i| i.parent())
            .apply();

        assert!(!handle.is_valid());
    }

    #[test]
    fn test_column_removal() {
        let registry = PersistentIndexRegistry::new();
        let handle = registry.track(ModelIndex::new(0, 4, ModelIndex::invalid()));
        registry
            .begin_remove(&ModelIndex::invalid(), Orientation::Horizontal, 0, 1, &flat_parent)
            .apply();
        assert_eq!(handle.column(), 2);
    }

    #[test]
    fn test_dropped_handles_are_pruned() {
        let registry = PersistentIndexRegistry::new();
        let keep = registry.track(ModelIndex::new(0, 0, ModelIndex::invalid()));
        {
            let _gone = registry.track(ModelIndex::new(1, 0, ModelIndex::invalid()));
            assert_eq!(registry.len(), 2);
        }
        assert_eq!(registry.len(), 1);
        registry.invalidate_all();
        assert!(!keep.is_valid());
        assert!(registry.handles().is_empty());
    }

    #[test]
    fn test_remap() {
        let registry = PersistentIndexRegistry::new();
        let handle = registry.track(ModelIndex::new(0, 0, ModelIndex::invalid()));
        registry.remap(|index| index.relocated(index.row() + 9, index.column()));
        assert_eq!(handle.row(), 9);
    }
}
