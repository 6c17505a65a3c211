//! Core traits for item models.
//!
//! This module defines the interface every source model implements and the
//! change-notification vocabulary that both source models and the proxy
//! publish.

use sieve_core::Signal;

use super::index::ModelIndex;
use super::persistent::PersistentModelIndex;
use super::role::{CheckState, ItemData, ItemRole};

/// Flags indicating what operations are allowed on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemFlags {
    /// Item can be selected.
    pub selectable: bool,
    /// Item can be edited.
    pub editable: bool,
    /// Item has a checkbox.
    pub checkable: bool,
    /// Item is enabled (can interact).
    pub enabled: bool,
    /// Item should never have children.
    pub never_has_children: bool,
}

impl ItemFlags {
    /// Creates flags with all defaults (selectable and enabled only).
    pub fn new() -> Self {
        Self {
            selectable: true,
            enabled: true,
            ..Default::default()
        }
    }

    /// Creates flags for a disabled item.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Creates flags for an editable item.
    pub fn editable() -> Self {
        Self {
            selectable: true,
            editable: true,
            enabled: true,
            ..Default::default()
        }
    }

    /// Sets the editable flag.
    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    /// Sets the checkable flag.
    pub fn with_checkable(mut self, checkable: bool) -> Self {
        self.checkable = checkable;
        self
    }

    /// Sets the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// The core trait for hierarchical tabular item models.
///
/// `ItemModel` represents a tree whose every node owns a table of children
/// (rows by columns). Consumers navigate it with [`ModelIndex`] values and
/// subscribe to [`ModelSignals`] to follow changes.
///
/// # Implementation Requirements
///
/// At minimum, you must implement:
/// - [`row_count`](ItemModel::row_count) - Number of rows under a parent
/// - [`column_count`](ItemModel::column_count) - Number of columns
/// - [`data`](ItemModel::data) - Data for a given index and role
/// - [`index`](ItemModel::index) - Create an index for a position
/// - [`parent`](ItemModel::parent) - Get the parent of an index
/// - [`signals`](ItemModel::signals) - The model's notification signals
///
/// Every structural change must be bracketed by the matching
/// "about to" and "done" signals, with the model's state unchanged when the
/// first is emitted and fully updated when the second is emitted.
///
/// # Example
///
/// ```
/// use sieve::model::{ItemData, ItemModel, ItemRole, ModelIndex, ModelSignals};
///
/// struct Words {
///     items: Vec<String>,
///     signals: ModelSignals,
/// }
///
/// impl ItemModel for Words {
///     fn row_count(&self, parent: &ModelIndex) -> usize {
///         if parent.is_valid() { 0 } else { self.items.len() }
///     }
///
///     fn column_count(&self, _parent: &ModelIndex) -> usize {
///         1
///     }
///
///     fn data(&self, index: &ModelIndex, role: ItemRole) -> ItemData {
///         match (self.items.get(index.row()), role) {
///             (Some(item), ItemRole::Display) if index.is_valid() => ItemData::from(item.as_str()),
///             _ => ItemData::None,
///         }
///     }
///
///     fn index(&self, row: usize, column: usize, parent: &ModelIndex) -> ModelIndex {
///         if parent.is_valid() || row >= self.items.len() || column > 0 {
///             ModelIndex::invalid()
///         } else {
///             ModelIndex::new(row, column, ModelIndex::invalid())
///         }
///     }
///
///     fn parent(&self, _index: &ModelIndex) -> ModelIndex {
///         ModelIndex::invalid()
///     }
///
///     fn signals(&self) -> &ModelSignals {
///         &self.signals
///     }
/// }
/// ```
pub trait ItemModel: Send + Sync {
    /// Returns the number of rows under the given parent.
    fn row_count(&self, parent: &ModelIndex) -> usize;

    /// Returns the number of columns for children of the given parent.
    fn column_count(&self, parent: &ModelIndex) -> usize;

    /// Returns the data stored under the given role for the item at index.
    ///
    /// Return `ItemData::None` if the index is invalid, the role is not
    /// supported, or there's no data for that role.
    fn data(&self, index: &ModelIndex, role: ItemRole) -> ItemData;

    /// Creates a model index for the given row and column under parent.
    ///
    /// Return `ModelIndex::invalid()` if the position is out of bounds.
    fn index(&self, row: usize, column: usize, parent: &ModelIndex) -> ModelIndex;

    /// Returns the parent of the given index.
    ///
    /// Return `ModelIndex::invalid()` for root-level items, invalid indices
    /// and flat models.
    fn parent(&self, index: &ModelIndex) -> ModelIndex;

    /// Returns the signals for this model.
    fn signals(&self) -> &ModelSignals;

    // -------------------------------------------------------------------------
    // Optional methods with default implementations
    // -------------------------------------------------------------------------

    /// Sets the data for the given index and role.
    ///
    /// Returns `true` if the data was successfully set.
    /// Implementations should emit `data_changed` after modifying data.
    fn set_data(&self, _index: &ModelIndex, _value: ItemData, _role: ItemRole) -> bool {
        false
    }

    /// Returns the flags for the item at the given index.
    fn flags(&self, _index: &ModelIndex) -> ItemFlags {
        ItemFlags::new()
    }

    /// Returns `true` if the item at parent has any children.
    fn has_children(&self, parent: &ModelIndex) -> bool {
        self.row_count(parent) > 0
    }

    /// Returns header data for the given section (row or column header).
    fn header_data(&self, _section: usize, _orientation: Orientation, _role: ItemRole) -> ItemData {
        ItemData::None
    }

    /// Sets header data for the given section.
    fn set_header_data(
        &self,
        _section: usize,
        _orientation: Orientation,
        _value: ItemData,
        _role: ItemRole,
    ) -> bool {
        false
    }

    /// Returns `true` if more data can be fetched for the given parent.
    fn can_fetch_more(&self, _parent: &ModelIndex) -> bool {
        false
    }

    /// Fetches more data for the given parent.
    fn fetch_more(&self, _parent: &ModelIndex) {}

    /// Inserts `count` empty rows before `row` under `parent`.
    ///
    /// Returns `true` on success. Read-only models keep the default.
    fn insert_rows(&self, _row: usize, _count: usize, _parent: &ModelIndex) -> bool {
        false
    }

    /// Removes `count` rows starting at `row` under `parent`.
    fn remove_rows(&self, _row: usize, _count: usize, _parent: &ModelIndex) -> bool {
        false
    }

    /// Inserts `count` empty columns before `column` under `parent`.
    fn insert_columns(&self, _column: usize, _count: usize, _parent: &ModelIndex) -> bool {
        false
    }

    /// Removes `count` columns starting at `column` under `parent`.
    fn remove_columns(&self, _column: usize, _count: usize, _parent: &ModelIndex) -> bool {
        false
    }

    /// Returns a persistent reference to `index`.
    ///
    /// Models that keep a [`PersistentIndexRegistry`](super::PersistentIndexRegistry)
    /// return a tracked handle that follows structural changes. The default
    /// returns a detached handle that never moves.
    fn persistent_index(&self, index: &ModelIndex) -> PersistentModelIndex {
        PersistentModelIndex::detached(index.clone())
    }

    // -------------------------------------------------------------------------
    // Convenience methods
    // -------------------------------------------------------------------------

    /// Returns the display text for an item (convenience for `data(index, Display)`).
    fn display_text(&self, index: &ModelIndex) -> Option<String> {
        self.data(index, ItemRole::Display).into_string()
    }

    /// Returns the check state for an item.
    fn check_state(&self, index: &ModelIndex) -> Option<CheckState> {
        self.data(index, ItemRole::CheckState).as_check_state()
    }

    /// Creates a sibling index at the given row and column.
    ///
    /// This validates against the model, unlike `ModelIndex::sibling`.
    fn sibling(&self, index: &ModelIndex, row: usize, column: usize) -> ModelIndex {
        if !index.is_valid() {
            return ModelIndex::invalid();
        }
        self.index(row, column, &self.parent(index))
    }
}

/// Orientation of headers and of structural changes.
///
/// `Vertical` addresses rows, `Horizontal` addresses columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Horizontal header (column headers).
    Horizontal,
    /// Vertical header (row headers).
    Vertical,
}

impl Orientation {
    /// Returns the other orientation.
    pub fn orthogonal(self) -> Self {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }
}

/// Hint attached to layout change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayoutChangeHint {
    /// Anything may have changed.
    #[default]
    NoHint,
    /// Rows were reordered; the row and column counts are unchanged.
    VerticalSort,
    /// Columns were reordered; the row and column counts are unchanged.
    HorizontalSort,
}

/// Arguments of insert/remove notifications: (parent index, first, last).
pub type RangeArgs = (ModelIndex, usize, usize);

/// Arguments of move notifications:
/// (source parent, source first, source last, dest parent, dest position).
pub type MoveArgs = (ModelIndex, usize, usize, ModelIndex, usize);

/// Arguments of layout notifications: (affected parents, hint).
///
/// An empty parent list means the whole model may be affected.
pub type LayoutArgs = (Vec<ModelIndex>, LayoutChangeHint);

/// Collection of signals emitted by item models.
///
/// # Signal Usage
///
/// - **Before modifications**: Emit `*_about_to_be_*` or `layout_about_to_change`
/// - **After modifications**: Emit the matching completion signal
/// - **Data changes**: Emit `data_changed` for value modifications
/// - **Major restructuring**: Emit `model_reset` signals
pub struct ModelSignals {
    // -------------------------------------------------------------------------
    // Row modification signals
    // -------------------------------------------------------------------------
    /// Emitted just before rows are inserted.
    pub rows_about_to_be_inserted: Signal<RangeArgs>,

    /// Emitted after rows have been inserted.
    pub rows_inserted: Signal<RangeArgs>,

    /// Emitted just before rows are removed.
    pub rows_about_to_be_removed: Signal<RangeArgs>,

    /// Emitted after rows have been removed.
    pub rows_removed: Signal<RangeArgs>,

    /// Emitted just before rows are moved.
    pub rows_about_to_be_moved: Signal<MoveArgs>,

    /// Emitted after rows have been moved.
    pub rows_moved: Signal<MoveArgs>,

    // -------------------------------------------------------------------------
    // Column modification signals
    // -------------------------------------------------------------------------
    /// Emitted just before columns are inserted.
    pub columns_about_to_be_inserted: Signal<RangeArgs>,

    /// Emitted after columns have been inserted.
    pub columns_inserted: Signal<RangeArgs>,

    /// Emitted just before columns are removed.
    pub columns_about_to_be_removed: Signal<RangeArgs>,

    /// Emitted after columns have been removed.
    pub columns_removed: Signal<RangeArgs>,

    /// Emitted just before columns are moved.
    pub columns_about_to_be_moved: Signal<MoveArgs>,

    /// Emitted after columns have been moved.
    pub columns_moved: Signal<MoveArgs>,

    // -------------------------------------------------------------------------
    // Data change signals
    // -------------------------------------------------------------------------
    /// Emitted when data in existing items changes.
    /// Args: (top-left index, bottom-right index, changed roles)
    pub data_changed: Signal<(ModelIndex, ModelIndex, Vec<ItemRole>)>,

    /// Emitted when header data changes.
    /// Args: (orientation, first section, last section)
    pub header_data_changed: Signal<(Orientation, usize, usize)>,

    // -------------------------------------------------------------------------
    // Layout signals
    // -------------------------------------------------------------------------
    /// Emitted before a layout change (e.g., sorting).
    pub layout_about_to_change: Signal<LayoutArgs>,

    /// Emitted after a layout change.
    pub layout_changed: Signal<LayoutArgs>,

    // -------------------------------------------------------------------------
    // Reset signals
    // -------------------------------------------------------------------------
    /// Emitted before the model is reset.
    pub model_about_to_reset: Signal<()>,

    /// Emitted after the model has been reset.
    pub model_reset: Signal<()>,
}

impl Default for ModelSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModelSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSignals").finish_non_exhaustive()
    }
}

impl ModelSignals {
    /// Creates a new set of model signals.
    pub fn new() -> Self {
        Self {
            rows_about_to_be_inserted: Signal::new(),
            rows_inserted: Signal::new(),
            rows_about_to_be_removed: Signal::new(),
            rows_removed: Signal::new(),
            rows_about_to_be_moved: Signal::new(),
            rows_moved: Signal::new(),
            columns_about_to_be_inserted: Signal::new(),
            columns_inserted: Signal::new(),
            columns_about_to_be_removed: Signal::new(),
            columns_removed: Signal::new(),
            columns_about_to_be_moved: Signal::new(),
            columns_moved: Signal::new(),
            data_changed: Signal::new(),
            header_data_changed: Signal::new(),
            layout_about_to_change: Signal::new(),
            layout_changed: Signal::new(),
            model_about_to_reset: Signal::new(),
            model_reset: Signal::new(),
        }
    }

    /// The "about to be inserted" signal for rows or columns.
    pub fn about_to_be_inserted(&self, orientation: Orientation) -> &Signal<RangeArgs> {
        match orientation {
            Orientation::Vertical => &self.rows_about_to_be_inserted,
            Orientation::Horizontal => &self.columns_about_to_be_inserted,
        }
    }

    /// The "inserted" signal for rows or columns.
    pub fn inserted(&self, orientation: Orientation) -> &Signal<RangeArgs> {
        match orientation {
            Orientation::Vertical => &self.rows_inserted,
            Orientation::Horizontal => &self.columns_inserted,
        }
    }

    /// The "about to be removed" signal for rows or columns.
    pub fn about_to_be_removed(&self, orientation: Orientation) -> &Signal<RangeArgs> {
        match orientation {
            Orientation::Vertical => &self.rows_about_to_be_removed,
            Orientation::Horizontal => &self.columns_about_to_be_removed,
        }
    }

    /// The "removed" signal for rows or columns.
    pub fn removed(&self, orientation: Orientation) -> &Signal<RangeArgs> {
        match orientation {
            Orientation::Vertical => &self.rows_removed,
            Orientation::Horizontal => &self.columns_removed,
        }
    }

    // -------------------------------------------------------------------------
    // Convenience methods for emitting signals
    // -------------------------------------------------------------------------

    /// Emits signals for row or column insertion.
    ///
    /// Calls the provided function between the about-to and done signals.
    pub fn emit_inserted<F>(
        &self,
        orientation: Orientation,
        parent: ModelIndex,
        first: usize,
        last: usize,
        insert_fn: F,
    ) where
        F: FnOnce(),
    {
        self.about_to_be_inserted(orientation)
            .emit((parent.clone(), first, last));
        insert_fn();
        self.inserted(orientation).emit((parent, first, last));
    }

    /// Emits signals for row or column removal.
    ///
    /// Calls the provided function between the about-to and done signals.
    pub fn emit_removed<F>(
        &self,
        orientation: Orientation,
        parent: ModelIndex,
        first: usize,
        last: usize,
        remove_fn: F,
    ) where
        F: FnOnce(),
    {
        self.about_to_be_removed(orientation)
            .emit((parent.clone(), first, last));
        remove_fn();
        self.removed(orientation).emit((parent, first, last));
    }

    /// Emits the data_changed signal for a single item.
    pub fn emit_data_changed_single(&self, index: ModelIndex, roles: Vec<ItemRole>) {
        self.data_changed.emit((index.clone(), index, roles));
    }

    /// Emits signals for a model reset.
    ///
    /// Calls the provided function between the about_to_reset and reset signals.
    pub fn emit_reset<F>(&self, reset_fn: F)
    where
        F: FnOnce(),
    {
        self.model_about_to_reset.emit(());
        reset_fn();
        self.model_reset.emit(());
    }

    /// Emits signals for a layout change.
    ///
    /// Calls the provided function between the about_to_change and changed signals.
    pub fn emit_layout_changed<F>(&self, parents: Vec<ModelIndex>, hint: LayoutChangeHint, change_fn: F)
    where
        F: FnOnce(),
    {
        self.layout_about_to_change.emit((parents.clone(), hint));
        change_fn();
        self.layout_changed.emit((parents, hint));
    }
}
