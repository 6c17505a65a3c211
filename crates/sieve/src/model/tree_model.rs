//! Hierarchical tree model implementation.
//!
//! `TreeModel` stores rows of [`ItemData`] cells in a parent-child structure.
//! Nodes live in a [`SlotMap`]; every index the model hands out carries its
//! node key as the internal ID, so an index keeps pointing at the same node
//! while siblings are inserted or removed around it.

use parking_lot::RwLock;
use slotmap::{Key, KeyData, SlotMap, new_key_type};

use sieve_core::logging::targets;

use super::index::ModelIndex;
use super::persistent::{PersistentIndexRegistry, PersistentModelIndex};
use super::role::{ItemData, ItemRole};
use super::traits::{ItemFlags, ItemModel, ModelSignals, Orientation};

new_key_type! {
    /// Identifier of a node in a [`TreeModel`].
    pub struct NodeId;
}

struct TreeNode {
    values: Vec<ItemData>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

struct TreeStorage {
    nodes: SlotMap<NodeId, TreeNode>,
    root_children: Vec<NodeId>,
}

impl TreeStorage {
    fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root_children: Vec::new(),
        }
    }

    fn children_of(&self, parent: Option<NodeId>) -> &[NodeId] {
        match parent {
            None => &self.root_children,
            Some(id) => self
                .nodes
                .get(id)
                .map(|n| n.children.as_slice())
                .unwrap_or(&[]),
        }
    }

    fn children_mut(&mut self, parent: Option<NodeId>) -> Option<&mut Vec<NodeId>> {
        match parent {
            None => Some(&mut self.root_children),
            Some(id) => self.nodes.get_mut(id).map(|n| &mut n.children),
        }
    }

    fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    fn row_of(&self, id: NodeId) -> Option<usize> {
        self.children_of(self.parent_of(id))
            .iter()
            .position(|&child| child == id)
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut node: Option<NodeId>) -> bool {
        while let Some(id) = node {
            if id == ancestor {
                return true;
            }
            node = self.parent_of(id);
        }
        false
    }

    fn remove_subtree(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(id) {
            for child in node.children {
                self.remove_subtree(child);
            }
        }
    }

    fn index_for(&self, id: NodeId, column: usize) -> ModelIndex {
        let Some(row) = self.row_of(id) else {
            return ModelIndex::invalid();
        };
        let parent = match self.parent_of(id) {
            Some(pid) => self.index_for(pid, 0),
            None => ModelIndex::invalid(),
        };
        ModelIndex::with_internal_id(row, column, parent, id.data().as_ffi())
    }
}

/// A hierarchical model whose nodes each hold one row of cells.
///
/// Children hang off column 0 of their parent row; querying any other
/// column as a parent yields no children.
///
/// # Example
///
/// ```
/// use sieve::model::{ItemModel, ItemRole, ModelIndex, TreeModel};
///
/// let model = TreeModel::new(1);
/// let docs = model.add_root(vec!["Documents".into()]);
/// model.add_child(docs, vec!["notes.txt".into()]);
///
/// let docs_index = model.index(0, 0, &ModelIndex::invalid());
/// assert_eq!(model.row_count(&docs_index), 1);
/// let file = model.index(0, 0, &docs_index);
/// assert_eq!(model.data(&file, ItemRole::Display).as_string(), Some("notes.txt"));
/// ```
pub struct TreeModel {
    storage: RwLock<TreeStorage>,
    column_count: usize,
    headers: RwLock<Vec<String>>,
    persistent: PersistentIndexRegistry,
    signals: ModelSignals,
}

static_assertions::assert_impl_all!(TreeModel: Send, Sync);

impl TreeModel {
    /// Creates an empty tree with `column_count` columns per row.
    pub fn new(column_count: usize) -> Self {
        Self {
            storage: RwLock::new(TreeStorage::new()),
            column_count,
            headers: RwLock::new(vec![String::new(); column_count]),
            persistent: PersistentIndexRegistry::new(),
            signals: ModelSignals::new(),
        }
    }

    /// Returns the number of columns.
    pub fn column_count_value(&self) -> usize {
        self.column_count
    }

    /// Sets the column headers.
    pub fn set_headers(&self, headers: Vec<String>) {
        *self.headers.write() = headers;
        if self.column_count > 0 {
            self.signals
                .header_data_changed
                .emit((Orientation::Horizontal, 0, self.column_count - 1));
        }
    }

    /// Appends a root-level row and returns its node.
    pub fn add_root(&self, values: Vec<ItemData>) -> NodeId {
        let row = self.root_count();
        self.insert_children(None, row, vec![values])
            .pop()
            .unwrap_or_default()
    }

    /// Appends a child row under `parent`.
    ///
    /// Returns `None` if the parent doesn't exist.
    pub fn add_child(&self, parent: NodeId, values: Vec<ItemData>) -> Option<NodeId> {
        let row = self.child_count(Some(parent))?;
        self.insert_children(Some(parent), row, vec![values]).pop()
    }

    /// Inserts `rows` as children of `parent` (the root when `None`) before
    /// `row`, as one structural change.
    ///
    /// Returns the new node ids, or an empty vector if the parent doesn't
    /// exist or `row` is past the end.
    pub fn insert_children(
        &self,
        parent: Option<NodeId>,
        row: usize,
        mut rows: Vec<Vec<ItemData>>,
    ) -> Vec<NodeId> {
        let (parent_index, existing) = {
            let storage = self.storage.read();
            if let Some(pid) = parent
                && !storage.nodes.contains_key(pid)
            {
                return Vec::new();
            }
            let index = parent.map_or_else(ModelIndex::invalid, |pid| storage.index_for(pid, 0));
            (index, storage.children_of(parent).len())
        };
        if rows.is_empty() || row > existing {
            return Vec::new();
        }
        for values in &mut rows {
            values.resize_with(self.column_count, ItemData::default);
        }

        let last = row + rows.len() - 1;
        let mut ids = Vec::with_capacity(rows.len());
        self.signals
            .emit_inserted(Orientation::Vertical, parent_index, row, last, || {
                {
                    let mut storage = self.storage.write();
                    for values in rows {
                        ids.push(storage.nodes.insert(TreeNode {
                            values,
                            children: Vec::new(),
                            parent,
                        }));
                    }
                    if let Some(children) = storage.children_mut(parent) {
                        children.splice(row..row, ids.iter().copied());
                    }
                }
                self.refresh_persistent();
            });
        ids
    }

    /// Removes a node and all its descendants.
    pub fn remove(&self, id: NodeId) -> bool {
        let located = {
            let storage = self.storage.read();
            storage.row_of(id).map(|row| (storage.parent_of(id), row))
        };
        match located {
            Some((parent, row)) => self.remove_children(parent, row, 1),
            None => false,
        }
    }

    /// Removes `count` children of `parent` starting at `first`, with their
    /// descendants, as one structural change.
    pub fn remove_children(&self, parent: Option<NodeId>, first: usize, count: usize) -> bool {
        let parent_index = {
            let storage = self.storage.read();
            if let Some(pid) = parent
                && !storage.nodes.contains_key(pid)
            {
                return false;
            }
            if count == 0 || first + count > storage.children_of(parent).len() {
                return false;
            }
            parent.map_or_else(ModelIndex::invalid, |pid| storage.index_for(pid, 0))
        };
        let last = first + count - 1;

        self.signals
            .emit_removed(Orientation::Vertical, parent_index, first, last, || {
                {
                    let mut storage = self.storage.write();
                    let removed: Vec<NodeId> = storage
                        .children_mut(parent)
                        .map(|children| children.drain(first..=last).collect())
                        .unwrap_or_default();
                    for id in removed {
                        storage.remove_subtree(id);
                    }
                }
                self.refresh_persistent();
            });
        true
    }

    /// Moves `count` children of `source_parent` starting at `first` so they
    /// sit before `destination_row` under `destination_parent`.
    ///
    /// `destination_row` is expressed in pre-move coordinates. Moving a node
    /// beneath itself, or onto its own position, is rejected.
    pub fn move_rows(
        &self,
        source_parent: Option<NodeId>,
        first: usize,
        count: usize,
        destination_parent: Option<NodeId>,
        destination_row: usize,
    ) -> bool {
        let (source_index, destination_index) = {
            let storage = self.storage.read();
            for parent in [source_parent, destination_parent].into_iter().flatten() {
                if !storage.nodes.contains_key(parent) {
                    return false;
                }
            }
            let siblings = storage.children_of(source_parent);
            if count == 0
                || first + count > siblings.len()
                || destination_row > storage.children_of(destination_parent).len()
            {
                return false;
            }
            let moved = &siblings[first..first + count];
            if moved
                .iter()
                .any(|&id| storage.is_ancestor_or_self(id, destination_parent))
            {
                return false;
            }
            if source_parent == destination_parent
                && (first..=first + count).contains(&destination_row)
            {
                return false;
            }
            (
                source_parent.map_or_else(ModelIndex::invalid, |pid| storage.index_for(pid, 0)),
                destination_parent.map_or_else(ModelIndex::invalid, |pid| storage.index_for(pid, 0)),
            )
        };
        let last = first + count - 1;

        self.signals.rows_about_to_be_moved.emit((
            source_index.clone(),
            first,
            last,
            destination_index.clone(),
            destination_row,
        ));
        {
            let mut storage = self.storage.write();
            let moved: Vec<NodeId> = storage
                .children_mut(source_parent)
                .map(|children| children.drain(first..=last).collect())
                .unwrap_or_default();
            let insert_at = if source_parent == destination_parent && destination_row > last {
                destination_row - count
            } else {
                destination_row
            };
            for &id in &moved {
                if let Some(node) = storage.nodes.get_mut(id) {
                    node.parent = destination_parent;
                }
            }
            if let Some(children) = storage.children_mut(destination_parent) {
                children.splice(insert_at..insert_at, moved);
            }
        }
        self.refresh_persistent();
        tracing::trace!(target: targets::MODEL, first, last, destination_row, "tree rows moved");
        self.signals.rows_moved.emit((
            source_index,
            first,
            last,
            destination_index,
            destination_row,
        ));
        true
    }

    /// Returns a copy of the cell of `id` at `column`.
    pub fn value(&self, id: NodeId, column: usize) -> ItemData {
        self.storage
            .read()
            .nodes
            .get(id)
            .and_then(|n| n.values.get(column))
            .cloned()
            .unwrap_or_default()
    }

    /// Sets the cell of `id` at `column` and emits `data_changed`.
    pub fn set_value(&self, id: NodeId, column: usize, value: ItemData) -> bool {
        let index = {
            let mut storage = self.storage.write();
            let Some(cell) = storage
                .nodes
                .get_mut(id)
                .and_then(|n| n.values.get_mut(column))
            else {
                return false;
            };
            *cell = value;
            storage.index_for(id, column)
        };
        self.signals
            .emit_data_changed_single(index, vec![ItemRole::Display, ItemRole::Edit]);
        true
    }

    /// Returns the current index of `id` at `column`, or an invalid index if
    /// the node no longer exists.
    pub fn index_of(&self, id: NodeId, column: usize) -> ModelIndex {
        if column >= self.column_count {
            return ModelIndex::invalid();
        }
        self.storage.read().index_for(id, column)
    }

    /// Returns the node an index refers to.
    pub fn node_id(&self, index: &ModelIndex) -> Option<NodeId> {
        if !index.is_valid() {
            return None;
        }
        let id = NodeId::from(KeyData::from_ffi(index.internal_id()));
        self.storage.read().nodes.contains_key(id).then_some(id)
    }

    /// Returns the number of children of `parent` (the root when `None`), or
    /// `None` if the parent doesn't exist.
    pub fn child_count(&self, parent: Option<NodeId>) -> Option<usize> {
        let storage = self.storage.read();
        match parent {
            Some(pid) if !storage.nodes.contains_key(pid) => None,
            _ => Some(storage.children_of(parent).len()),
        }
    }

    /// Returns the number of root-level rows.
    pub fn root_count(&self) -> usize {
        self.storage.read().root_children.len()
    }

    /// Returns `true` if the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.storage.read().root_children.is_empty()
    }

    /// Clears all nodes.
    pub fn clear(&self) {
        self.signals.emit_reset(|| {
            let mut storage = self.storage.write();
            storage.nodes.clear();
            storage.root_children.clear();
            self.persistent.invalidate_all();
        });
    }

    /// Re-resolves every persistent index through its node id.
    fn refresh_persistent(&self) {
        let storage = self.storage.read();
        self.persistent.remap(|index| {
            let id = NodeId::from(KeyData::from_ffi(index.internal_id()));
            if storage.nodes.contains_key(id) {
                storage.index_for(id, index.column())
            } else {
                ModelIndex::invalid()
            }
        });
    }

    fn parent_node(&self, storage: &TreeStorage, parent: &ModelIndex) -> Option<Option<NodeId>> {
        if !parent.is_valid() {
            return Some(None);
        }
        if parent.column() != 0 {
            return None;
        }
        let id = NodeId::from(KeyData::from_ffi(parent.internal_id()));
        storage.nodes.contains_key(id).then_some(Some(id))
    }
}

impl ItemModel for TreeModel {
    fn row_count(&self, parent: &ModelIndex) -> usize {
        let storage = self.storage.read();
        match self.parent_node(&storage, parent) {
            Some(node) => storage.children_of(node).len(),
            None => 0,
        }
    }

    fn column_count(&self, _parent: &ModelIndex) -> usize {
        self.column_count
    }

    fn data(&self, index: &ModelIndex, role: ItemRole) -> ItemData {
        if !index.is_valid() || !matches!(role, ItemRole::Display | ItemRole::Edit) {
            return ItemData::None;
        }
        match self.node_id(index) {
            Some(id) => self.value(id, index.column()),
            None => ItemData::None,
        }
    }

    fn set_data(&self, index: &ModelIndex, value: ItemData, role: ItemRole) -> bool {
        if !matches!(role, ItemRole::Display | ItemRole::Edit) {
            return false;
        }
        match self.node_id(index) {
            Some(id) => self.set_value(id, index.column(), value),
            None => false,
        }
    }

    fn flags(&self, index: &ModelIndex) -> ItemFlags {
        if self.node_id(index).is_some() {
            ItemFlags::editable()
        } else {
            ItemFlags::disabled()
        }
    }

    fn index(&self, row: usize, column: usize, parent: &ModelIndex) -> ModelIndex {
        if column >= self.column_count {
            return ModelIndex::invalid();
        }
        let storage = self.storage.read();
        let Some(parent_node) = self.parent_node(&storage, parent) else {
            return ModelIndex::invalid();
        };
        match storage.children_of(parent_node).get(row) {
            Some(&id) => ModelIndex::with_internal_id(row, column, parent.clone(), id.data().as_ffi()),
            None => ModelIndex::invalid(),
        }
    }

    fn parent(&self, index: &ModelIndex) -> ModelIndex {
        let Some(id) = self.node_id(index) else {
            return ModelIndex::invalid();
        };
        let storage = self.storage.read();
        match storage.parent_of(id) {
            Some(pid) => storage.index_for(pid, 0),
            None => ModelIndex::invalid(),
        }
    }

    fn signals(&self) -> &ModelSignals {
        &self.signals
    }

    fn header_data(&self, section: usize, orientation: Orientation, role: ItemRole) -> ItemData {
        if orientation != Orientation::Horizontal || role != ItemRole::Display {
            return ItemData::None;
        }
        self.headers
            .read()
            .get(section)
            .map(|h| ItemData::from(h.as_str()))
            .unwrap_or_default()
    }

    fn insert_rows(&self, row: usize, count: usize, parent: &ModelIndex) -> bool {
        let node = {
            let storage = self.storage.read();
            self.parent_node(&storage, parent)
        };
        match node {
            Some(node) if count > 0 => !self
                .insert_children(node, row, (0..count).map(|_| Vec::new()).collect())
                .is_empty(),
            _ => false,
        }
    }

    fn remove_rows(&self, row: usize, count: usize, parent: &ModelIndex) -> bool {
        let node = {
            let storage = self.storage.read();
            self.parent_node(&storage, parent)
        };
        match node {
            Some(node) => self.remove_children(node, row, count),
            None => false,
        }
    }

    fn persistent_index(&self, index: &ModelIndex) -> PersistentModelIndex {
        self.persistent.track(index.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn label(model: &TreeModel, index: &ModelIndex) -> String {
        model.data(index, ItemRole::Display).to_text()
    }

    fn files() -> (TreeModel, NodeId, NodeId) {
        let model = TreeModel::new(2);
        let docs = model.add_root(vec!["Documents".into(), 3.into()]);
        let music = model.add_root(vec!["Music".into(), 1.into()]);
        model.add_child(docs, vec!["a.txt".into(), 10.into()]);
        model.add_child(docs, vec!["b.txt".into(), 20.into()]);
        model.add_child(music, vec!["song.ogg".into(), 30.into()]);
        (model, docs, music)
    }

    #[test]
    fn test_tree_model_hierarchy() {
        let (model, docs, _) = files();
        let root = ModelIndex::invalid();

        assert_eq!(model.row_count(&root), 2);
        let docs_index = model.index(0, 0, &root);
        assert_eq!(model.node_id(&docs_index), Some(docs));
        assert_eq!(model.row_count(&docs_index), 2);

        let b = model.index(1, 0, &docs_index);
        assert_eq!(label(&model, &b), "b.txt");
        assert_eq!(model.data(&model.sibling(&b, 1, 1), ItemRole::Display).as_int(), Some(20));
        assert_eq!(model.parent(&b), docs_index);
        assert!(!model.parent(&docs_index).is_valid());
    }

    #[test]
    fn test_only_first_column_has_children() {
        let (model, _, _) = files();
        let docs_size = model.index(0, 1, &ModelIndex::invalid());
        assert!(docs_size.is_valid());
        assert_eq!(model.row_count(&docs_size), 0);
        assert!(!model.index(0, 0, &docs_size).is_valid());
        assert!(!model.index(0, 2, &ModelIndex::invalid()).is_valid());
    }

    #[test]
    fn test_insert_and_remove_children_emit_ranges() {
        let (model, docs, _) = files();
        let events = Arc::new(Mutex::new(Vec::new()));

        let ev = events.clone();
        model.signals().rows_inserted.connect(move |(parent, first, last)| {
            ev.lock().push(("inserted", parent.is_valid(), *first, *last));
        });
        let ev = events.clone();
        model.signals().rows_removed.connect(move |(parent, first, last)| {
            ev.lock().push(("removed", parent.is_valid(), *first, *last));
        });

        let ids = model.insert_children(Some(docs), 1, vec![vec!["x".into()], vec!["y".into()]]);
        assert_eq!(ids.len(), 2);
        assert_eq!(model.child_count(Some(docs)), Some(4));
        assert!(model.remove_children(Some(docs), 0, 2));
        assert_eq!(model.value(ids[1], 0).to_text(), "y");

        assert_eq!(
            *events.lock(),
            vec![("inserted", true, 1, 2), ("removed", true, 0, 1)]
        );
    }

    #[test]
    fn test_remove_drops_subtree() {
        let (model, docs, _) = files();
        let a = model.index(0, 0, &model.index_of(docs, 0));
        let a_id = model.node_id(&a);
        assert!(a_id.is_some());

        assert!(model.remove(docs));
        assert_eq!(model.root_count(), 1);
        assert!(model.node_id(&a).is_none());
        assert!(!model.remove(docs));
    }

    #[test]
    fn test_move_rows_between_parents() {
        let (model, docs, music) = files();
        let tracked = model.persistent_index(&model.index(1, 0, &model.index_of(docs, 0)));

        assert!(model.move_rows(Some(docs), 1, 1, Some(music), 0));
        assert_eq!(model.child_count(Some(docs)), Some(1));
        assert_eq!(model.child_count(Some(music)), Some(2));
        assert_eq!(label(&model, &tracked.index()), "b.txt");
        assert_eq!(tracked.row(), 0);
        assert_eq!(model.parent(&tracked.index()), model.index_of(music, 0));

        // A node cannot move beneath itself.
        assert!(!model.move_rows(None, 0, 1, Some(docs), 0));
        assert!(!model.move_rows(Some(music), 0, 1, Some(music), 1));
    }

    #[test]
    fn test_persistent_indexes_follow_node() {
        let (model, docs, music) = files();
        let music_index = model.persistent_index(&model.index_of(music, 1));
        let song = model.persistent_index(&model.index(0, 0, &model.index_of(music, 0)));

        model.insert_children(None, 0, vec![vec!["New".into()]]);
        assert_eq!(music_index.row(), 2);
        assert_eq!(music_index.column(), 1);
        assert_eq!(model.data(&music_index.index(), ItemRole::Display).as_int(), Some(1));

        model.remove(docs);
        assert_eq!(music_index.row(), 1);
        assert_eq!(label(&model, &song.index()), "song.ogg");

        model.remove(music);
        assert!(!music_index.is_valid());
        assert!(!song.is_valid());
    }

    #[test]
    fn test_set_data_emits_data_changed() {
        let (model, _, music) = files();
        let changed = Arc::new(Mutex::new(Vec::new()));
        let ch = changed.clone();
        model.signals().data_changed.connect(move |(top_left, _, _)| {
            ch.lock().push((top_left.row(), top_left.column()));
        });

        let index = model.index_of(music, 0);
        assert!(model.set_data(&index, "Audio".into(), ItemRole::Edit));
        assert_eq!(label(&model, &index), "Audio");
        assert!(!model.set_data(&index, "x".into(), ItemRole::ToolTip));
        assert_eq!(*changed.lock(), vec![(1, 0)]);
    }

    #[test]
    fn test_clear() {
        let (model, docs, _) = files();
        let tracked = model.persistent_index(&model.index_of(docs, 0));
        model.clear();
        assert!(model.is_empty());
        assert!(!tracked.is_valid());
        assert_eq!(model.child_count(Some(docs)), None);
    }
}
