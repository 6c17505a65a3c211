//! Model index for addressing items in hierarchical models.
//!
//! The `ModelIndex` type is the fundamental way to reference items within
//! an `ItemModel`. It contains row, column, and parent information to
//! identify any item in a hierarchical data structure.

use std::hash::{Hash, Hasher};

/// Represents a position within an `ItemModel`.
///
/// Each index contains:
/// - Row and column within the parent
/// - A copy of the parent index (for hierarchical models)
/// - An internal ID for model-specific identification
///
/// # Identity
///
/// Two valid indices are equal when their row, column and internal ID match.
/// The parent chain is carried for navigation only; models that need to tell
/// apart items at the same position under different parents encode the parent
/// in the internal ID (the tree model stores its node key there, the proxy
/// stores its mapping handle).
///
/// # Index Validity
///
/// Model indices should be used immediately and not stored long-term.
/// After model modifications (insertions, deletions, moves), previously
/// obtained indices may refer to different items. Use a
/// [`PersistentModelIndex`](super::PersistentModelIndex) to keep a reference
/// that follows structural changes.
///
/// # Example
///
/// ```
/// use sieve::model::ModelIndex;
///
/// let root = ModelIndex::invalid();
/// let index = ModelIndex::new(1, 0, root);
/// let sibling = index.sibling(2, 0);
/// assert_eq!(sibling.row(), 2);
/// ```
#[derive(Clone)]
pub struct ModelIndex {
    /// The row within the parent.
    row: usize,
    /// The column within the parent.
    column: usize,
    /// The parent index. `None` indicates a root-level item.
    parent: Option<Box<ModelIndex>>,
    /// An internal ID that models can use for their own purposes.
    internal_id: u64,
    /// Whether this index is valid.
    valid: bool,
}

impl Default for ModelIndex {
    fn default() -> Self {
        Self::invalid()
    }
}

impl ModelIndex {
    /// Creates an invalid (null) model index.
    ///
    /// An invalid index is used to represent:
    /// - The root of the model (as a parent reference)
    /// - A non-existent, filtered out or out-of-bounds item
    /// - A stale proxy index whose mapping no longer exists
    #[inline]
    pub const fn invalid() -> Self {
        Self {
            row: 0,
            column: 0,
            parent: None,
            internal_id: 0,
            valid: false,
        }
    }

    /// Creates a new valid model index with internal ID 0.
    ///
    /// Flat models, whose items are fully identified by row and column,
    /// use this directly.
    #[inline]
    pub fn new(row: usize, column: usize, parent: ModelIndex) -> Self {
        Self::with_internal_id(row, column, parent, 0)
    }

    /// Creates a new valid model index with a custom internal ID.
    ///
    /// Models can use the internal ID to store an identifier of their
    /// internal data structures for efficient lookups.
    #[inline]
    pub fn with_internal_id(row: usize, column: usize, parent: ModelIndex, internal_id: u64) -> Self {
        Self {
            row,
            column,
            parent: if parent.is_valid() {
                Some(Box::new(parent))
            } else {
                None
            },
            internal_id,
            valid: true,
        }
    }

    /// Returns `true` if this is a valid index.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns the row of this index within its parent.
    ///
    /// Returns 0 for invalid indices.
    #[inline]
    pub fn row(&self) -> usize {
        self.row
    }

    /// Returns the column of this index within its parent.
    ///
    /// Returns 0 for invalid indices.
    #[inline]
    pub fn column(&self) -> usize {
        self.column
    }

    /// Returns the parent index, or an invalid index if this is a root item.
    #[inline]
    pub fn parent(&self) -> ModelIndex {
        match &self.parent {
            Some(parent) => (**parent).clone(),
            None => ModelIndex::invalid(),
        }
    }

    /// Returns `true` if this index has a valid parent.
    #[inline]
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Returns the internal ID associated with this index.
    #[inline]
    pub fn internal_id(&self) -> u64 {
        self.internal_id
    }

    /// Creates a sibling index at the given row and column.
    ///
    /// The sibling keeps this index's parent and internal ID. It is not
    /// validated against a model; prefer `ItemModel::sibling` when the model
    /// is at hand.
    ///
    /// Returns an invalid index if this index is invalid.
    #[inline]
    pub fn sibling(&self, row: usize, column: usize) -> ModelIndex {
        if !self.is_valid() {
            return ModelIndex::invalid();
        }
        self.relocated(row, column)
    }

    /// Creates a sibling at the same column but different row.
    #[inline]
    pub fn sibling_at_row(&self, row: usize) -> ModelIndex {
        self.sibling(row, self.column)
    }

    /// Creates a sibling at the same row but different column.
    #[inline]
    pub fn sibling_at_column(&self, column: usize) -> ModelIndex {
        self.sibling(self.row, column)
    }

    /// Returns a copy of this index moved to `(row, column)`.
    ///
    /// Parent and internal ID are kept. Used when a structural change
    /// shifts an item without changing its identity.
    pub fn relocated(&self, row: usize, column: usize) -> ModelIndex {
        Self {
            row,
            column,
            parent: self.parent.clone(),
            internal_id: self.internal_id,
            valid: self.valid,
        }
    }

    /// Returns the depth of this index in the tree hierarchy.
    ///
    /// Root-level items have depth 0. Returns 0 for invalid indices.
    pub fn depth(&self) -> usize {
        if !self.is_valid() {
            return 0;
        }
        let mut depth = 0;
        let mut current = self.parent();
        while current.is_valid() {
            depth += 1;
            current = current.parent();
        }
        depth
    }

    /// Returns the chain of ancestors from this index up to (but not including) the root.
    ///
    /// The first element is the immediate parent, and the last is the
    /// top-level ancestor.
    pub fn ancestors(&self) -> Vec<ModelIndex> {
        let mut ancestors = Vec::new();
        let mut current = self.parent();
        while current.is_valid() {
            ancestors.push(current.clone());
            current = current.parent();
        }
        ancestors
    }

    /// Checks if this index is a descendant of the given ancestor.
    pub fn is_descendant_of(&self, ancestor: &ModelIndex) -> bool {
        if !self.is_valid() || !ancestor.is_valid() {
            return false;
        }
        self.ancestors().iter().any(|a| a == ancestor)
    }
}

impl std::fmt::Debug for ModelIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            f.debug_struct("ModelIndex")
                .field("row", &self.row)
                .field("column", &self.column)
                .field("depth", &self.depth())
                .field("internal_id", &self.internal_id)
                .finish()
        } else {
            write!(f, "ModelIndex(invalid)")
        }
    }
}

impl PartialEq for ModelIndex {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_valid(), other.is_valid()) {
            (false, false) => true,
            (true, true) => {
                self.row == other.row
                    && self.column == other.column
                    && self.internal_id == other.internal_id
            }
            _ => false,
        }
    }
}

impl Eq for ModelIndex {}

impl Hash for ModelIndex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.valid.hash(state);
        if self.valid {
            self.row.hash(state);
            self.column.hash(state);
            self.internal_id.hash(state);
        }
    }
}

impl PartialOrd for ModelIndex {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ModelIndex {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.is_valid(), other.is_valid()) {
            (false, false) => std::cmp::Ordering::Equal,
            (false, true) => std::cmp::Ordering::Less,
            (true, false) => std::cmp::Ordering::Greater,
            (true, true) => self
                .row
                .cmp(&other.row)
                .then(self.column.cmp(&other.column))
                .then(self.internal_id.cmp(&other.internal_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_invalid_index() {
        let index = ModelIndex::invalid();
        assert!(!index.is_valid());
        assert_eq!(index.row(), 0);
        assert_eq!(index.column(), 0);
        assert!(!index.has_parent());
    }

    #[test]
    fn test_valid_index() {
        let index = ModelIndex::new(5, 3, ModelIndex::invalid());
        assert!(index.is_valid());
        assert_eq!(index.row(), 5);
        assert_eq!(index.column(), 3);
        assert_eq!(index.internal_id(), 0);
        assert!(!index.has_parent());
    }

    #[test]
    fn test_hierarchical_index() {
        let parent = ModelIndex::new(0, 0, ModelIndex::invalid());
        let child = ModelIndex::new(2, 1, parent.clone());

        assert!(child.has_parent());
        assert_eq!(child.parent(), parent);
        assert_eq!(child.depth(), 1);
    }

    #[test]
    fn test_sibling_keeps_identity() {
        let parent = ModelIndex::with_internal_id(3, 0, ModelIndex::invalid(), 9);
        let index = ModelIndex::with_internal_id(1, 0, parent.clone(), 42);
        let sibling = index.sibling(2, 1);

        assert_eq!(sibling.row(), 2);
        assert_eq!(sibling.column(), 1);
        assert_eq!(sibling.internal_id(), 42);
        assert_eq!(sibling.parent(), parent);
        assert!(!ModelIndex::invalid().sibling(0, 0).is_valid());
    }

    #[test]
    fn test_equality_ignores_parent_chain() {
        assert_eq!(ModelIndex::invalid(), ModelIndex::invalid());

        let stale_parent = ModelIndex::with_internal_id(4, 0, ModelIndex::invalid(), 7);
        let fresh_parent = ModelIndex::with_internal_id(2, 0, ModelIndex::invalid(), 7);
        let a = ModelIndex::with_internal_id(1, 0, stale_parent, 100);
        let b = ModelIndex::with_internal_id(1, 0, fresh_parent, 100);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));

        let other = ModelIndex::with_internal_id(1, 0, ModelIndex::invalid(), 101);
        assert_ne!(b, other);
    }

    #[test]
    fn test_ancestors() {
        let level1 = ModelIndex::with_internal_id(0, 0, ModelIndex::invalid(), 1);
        let level2 = ModelIndex::with_internal_id(1, 0, level1.clone(), 2);
        let level3 = ModelIndex::with_internal_id(2, 0, level2.clone(), 3);

        let ancestors = level3.ancestors();
        assert_eq!(ancestors, vec![level2.clone(), level1.clone()]);
        assert!(level3.is_descendant_of(&level2));
        assert!(level3.is_descendant_of(&level1));
        assert!(!level1.is_descendant_of(&level3));
    }

    #[test]
    fn test_ordering() {
        let root = ModelIndex::invalid();
        let idx1 = ModelIndex::new(0, 0, root.clone());
        let idx2 = ModelIndex::new(1, 0, root.clone());
        let idx3 = ModelIndex::new(0, 1, root);

        assert!(idx1 < idx2);
        assert!(idx1 < idx3);
        assert!(ModelIndex::invalid() < idx1);
    }
}
