//! Table model implementation for 2D grid data.
//!
//! `TableModel` stores a flat grid of [`ItemData`] cells with optional column
//! headers. It supports every structural edit the proxy forwards (row and
//! column insertion and removal, row moves) and keeps the persistent indexes
//! it hands out up to date.

use parking_lot::RwLock;

use sieve_core::logging::targets;

use super::index::ModelIndex;
use super::persistent::{PersistentIndexRegistry, PersistentModelIndex};
use super::role::{ItemData, ItemRole};
use super::traits::{ItemFlags, ItemModel, ModelSignals, Orientation};

/// A table model that stores data in a 2D vector.
///
/// The Display and Edit roles both read and write the stored cell.
///
/// # Example
///
/// ```
/// use sieve::model::{ItemData, ItemModel, ItemRole, ModelIndex, TableModel};
///
/// let model = TableModel::from_rows(vec![
///     vec![ItemData::from("Alice"), ItemData::from(34)],
///     vec![ItemData::from("Bob"), ItemData::from(27)],
/// ]);
///
/// let index = model.index(1, 0, &ModelIndex::invalid());
/// assert_eq!(model.data(&index, ItemRole::Display).as_string(), Some("Bob"));
/// ```
pub struct TableModel {
    data: RwLock<Vec<Vec<ItemData>>>,
    column_count: RwLock<usize>,
    headers: RwLock<Vec<String>>,
    persistent: PersistentIndexRegistry,
    signals: ModelSignals,
}

static_assertions::assert_impl_all!(TableModel: Send, Sync);

impl TableModel {
    /// Creates an empty table model with the specified column count.
    pub fn new(column_count: usize) -> Self {
        Self {
            data: RwLock::new(Vec::new()),
            column_count: RwLock::new(column_count),
            headers: RwLock::new(vec![String::new(); column_count]),
            persistent: PersistentIndexRegistry::new(),
            signals: ModelSignals::new(),
        }
    }

    /// Creates a table model from 2D data.
    ///
    /// The column count is the widest row; shorter rows are padded.
    pub fn from_rows(mut rows: Vec<Vec<ItemData>>) -> Self {
        let column_count = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize_with(column_count, ItemData::default);
        }
        let model = Self::new(column_count);
        *model.data.write() = rows;
        model
    }

    /// Creates a single-column table from display strings.
    pub fn from_strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_rows(
            items
                .into_iter()
                .map(|s| vec![ItemData::String(s.into())])
                .collect(),
        )
    }

    /// Sets the column headers.
    pub fn set_headers(&self, headers: Vec<String>) {
        *self.headers.write() = headers;
        let columns = self.column_count_value();
        if columns > 0 {
            self.signals
                .header_data_changed
                .emit((Orientation::Horizontal, 0, columns - 1));
        }
    }

    /// Sets a single header.
    pub fn set_header(&self, column: usize, header: impl Into<String>) -> bool {
        let mut headers = self.headers.write();
        if column >= headers.len() {
            return false;
        }
        headers[column] = header.into();
        drop(headers);
        self.signals
            .header_data_changed
            .emit((Orientation::Horizontal, column, column));
        true
    }

    /// Returns a copy of the cell at `(row, column)`.
    pub fn cell(&self, row: usize, column: usize) -> ItemData {
        self.data
            .read()
            .get(row)
            .and_then(|r| r.get(column))
            .cloned()
            .unwrap_or_default()
    }

    /// Sets the data at the specified cell and emits `data_changed`.
    pub fn set_cell(&self, row: usize, column: usize, value: ItemData) -> bool {
        let mut data = self.data.write();
        let Some(cell) = data.get_mut(row).and_then(|r| r.get_mut(column)) else {
            return false;
        };
        *cell = value;
        drop(data);
        let index = ModelIndex::new(row, column, ModelIndex::invalid());
        self.signals
            .emit_data_changed_single(index, vec![ItemRole::Display, ItemRole::Edit]);
        true
    }

    /// Appends a row.
    pub fn append_row(&self, row: Vec<ItemData>) {
        let index = self.row_count_value();
        self.insert_row(index, row);
    }

    /// Inserts a row before `index` (appends when `index` is past the end).
    pub fn insert_row(&self, index: usize, row: Vec<ItemData>) {
        self.insert_row_values(index, vec![row]);
    }

    /// Inserts several rows before `index` as one structural change.
    pub fn insert_row_values(&self, index: usize, mut rows: Vec<Vec<ItemData>>) {
        if rows.is_empty() {
            return;
        }
        let index = index.min(self.row_count_value());
        let columns = self.column_count_value();
        for row in &mut rows {
            row.resize_with(columns, ItemData::default);
        }
        let last = index + rows.len() - 1;
        let update = self.persistent.begin_insert(
            &ModelIndex::invalid(),
            Orientation::Vertical,
            index,
            rows.len(),
            &|_| ModelIndex::invalid(),
        );
        self.signals
            .emit_inserted(Orientation::Vertical, ModelIndex::invalid(), index, last, || {
                self.data.write().splice(index..index, rows);
                update.apply();
            });
    }

    /// Removes a row, returning its cells.
    pub fn remove_row(&self, index: usize) -> Option<Vec<ItemData>> {
        self.remove_row_range(index, 1).into_iter().next()
    }

    /// Removes `count` rows starting at `first` as one structural change.
    pub fn remove_row_range(&self, first: usize, count: usize) -> Vec<Vec<ItemData>> {
        if count == 0 || first + count > self.row_count_value() {
            return Vec::new();
        }
        let last = first + count - 1;
        let mut removed = Vec::new();
        let update = self.persistent.begin_remove(
            &ModelIndex::invalid(),
            Orientation::Vertical,
            first,
            last,
            &|_| ModelIndex::invalid(),
        );
        self.signals
            .emit_removed(Orientation::Vertical, ModelIndex::invalid(), first, last, || {
                removed = self.data.write().drain(first..=last).collect();
                update.apply();
            });
        removed
    }

    /// Moves `count` rows starting at `first` so they sit before `destination`.
    ///
    /// `destination` is expressed in pre-move coordinates and must not fall
    /// inside `first..=first + count`.
    pub fn move_rows(&self, first: usize, count: usize, destination: usize) -> bool {
        let rows = self.row_count_value();
        if count == 0
            || first + count > rows
            || destination > rows
            || (first..=first + count).contains(&destination)
        {
            return false;
        }
        let last = first + count - 1;
        let root = ModelIndex::invalid();
        self.signals
            .rows_about_to_be_moved
            .emit((root.clone(), first, last, root.clone(), destination));
        {
            let mut data = self.data.write();
            let moved: Vec<_> = data.drain(first..=last).collect();
            let insert_at = if destination > last {
                destination - count
            } else {
                destination
            };
            data.splice(insert_at..insert_at, moved);
        }
        self.persistent.remap(|index| {
            let row = moved_row(index.row(), first, last, destination);
            index.relocated(row, index.column())
        });
        tracing::trace!(target: targets::MODEL, first, last, destination, "table rows moved");
        self.signals
            .rows_moved
            .emit((root.clone(), first, last, root, destination));
        true
    }

    /// Inserts `count` empty columns before `column`.
    pub fn insert_column_range(&self, column: usize, count: usize, header: &str) -> bool {
        let columns = self.column_count_value();
        if count == 0 || column > columns {
            return false;
        }
        let update = self.persistent.begin_insert(
            &ModelIndex::invalid(),
            Orientation::Horizontal,
            column,
            count,
            &|_| ModelIndex::invalid(),
        );
        self.signals.emit_inserted(
            Orientation::Horizontal,
            ModelIndex::invalid(),
            column,
            column + count - 1,
            || {
                for row in self.data.write().iter_mut() {
                    row.splice(column..column, (0..count).map(|_| ItemData::None));
                }
                let mut headers = self.headers.write();
                headers.resize(columns, String::new());
                headers.splice(column..column, (0..count).map(|_| header.to_string()));
                *self.column_count.write() = columns + count;
                update.apply();
            },
        );
        true
    }

    /// Removes `count` columns starting at `column`.
    pub fn remove_column_range(&self, column: usize, count: usize) -> bool {
        let columns = self.column_count_value();
        if count == 0 || column + count > columns {
            return false;
        }
        let last = column + count - 1;
        let update = self.persistent.begin_remove(
            &ModelIndex::invalid(),
            Orientation::Horizontal,
            column,
            last,
            &|_| ModelIndex::invalid(),
        );
        self.signals.emit_removed(
            Orientation::Horizontal,
            ModelIndex::invalid(),
            column,
            last,
            || {
                for row in self.data.write().iter_mut() {
                    row.drain(column..=last);
                }
                let mut headers = self.headers.write();
                headers.resize(columns, String::new());
                headers.drain(column..=last);
                *self.column_count.write() = columns - count;
                update.apply();
            },
        );
        true
    }

    /// Clears all data.
    pub fn clear(&self) {
        self.set_rows(Vec::new());
    }

    /// Replaces all rows, keeping the column count.
    pub fn set_rows(&self, mut rows: Vec<Vec<ItemData>>) {
        let columns = self.column_count_value();
        for row in &mut rows {
            row.resize_with(columns, ItemData::default);
        }
        self.signals.emit_reset(|| {
            *self.data.write() = rows;
            self.persistent.invalidate_all();
        });
    }

    /// Returns the number of rows.
    pub fn row_count_value(&self) -> usize {
        self.data.read().len()
    }

    /// Returns the number of columns.
    pub fn column_count_value(&self) -> usize {
        *self.column_count.read()
    }
}

/// New position of `row` after moving `first..=last` before `destination`.
fn moved_row(row: usize, first: usize, last: usize, destination: usize) -> usize {
    let count = last - first + 1;
    if (first..=last).contains(&row) {
        if destination > last {
            destination - count + (row - first)
        } else {
            destination + (row - first)
        }
    } else if destination > last && row > last && row < destination {
        row - count
    } else if destination < first && row >= destination && row < first {
        row + count
    } else {
        row
    }
}

impl ItemModel for TableModel {
    fn row_count(&self, parent: &ModelIndex) -> usize {
        if parent.is_valid() {
            0
        } else {
            self.data.read().len()
        }
    }

    fn column_count(&self, parent: &ModelIndex) -> usize {
        if parent.is_valid() {
            0
        } else {
            self.column_count_value()
        }
    }

    fn data(&self, index: &ModelIndex, role: ItemRole) -> ItemData {
        if !index.is_valid() || !matches!(role, ItemRole::Display | ItemRole::Edit) {
            return ItemData::None;
        }
        self.cell(index.row(), index.column())
    }

    fn set_data(&self, index: &ModelIndex, value: ItemData, role: ItemRole) -> bool {
        if !index.is_valid() || !matches!(role, ItemRole::Display | ItemRole::Edit) {
            return false;
        }
        self.set_cell(index.row(), index.column(), value)
    }

    fn flags(&self, index: &ModelIndex) -> ItemFlags {
        if index.is_valid() {
            ItemFlags::editable()
        } else {
            ItemFlags::new()
        }
    }

    fn index(&self, row: usize, column: usize, parent: &ModelIndex) -> ModelIndex {
        if parent.is_valid() || row >= self.row_count_value() || column >= self.column_count_value() {
            return ModelIndex::invalid();
        }
        ModelIndex::new(row, column, ModelIndex::invalid())
    }

    fn parent(&self, _index: &ModelIndex) -> ModelIndex {
        ModelIndex::invalid()
    }

    fn has_children(&self, parent: &ModelIndex) -> bool {
        !parent.is_valid() && self.row_count_value() > 0
    }

    fn signals(&self) -> &ModelSignals {
        &self.signals
    }

    fn header_data(&self, section: usize, orientation: Orientation, role: ItemRole) -> ItemData {
        if role != ItemRole::Display {
            return ItemData::None;
        }
        match orientation {
            Orientation::Horizontal => self
                .headers
                .read()
                .get(section)
                .map(|h| ItemData::from(h.as_str()))
                .unwrap_or_default(),
            Orientation::Vertical if section < self.row_count_value() => {
                ItemData::from((section + 1) as i64)
            }
            Orientation::Vertical => ItemData::None,
        }
    }

    fn set_header_data(
        &self,
        section: usize,
        orientation: Orientation,
        value: ItemData,
        role: ItemRole,
    ) -> bool {
        if orientation != Orientation::Horizontal || role != ItemRole::Display {
            return false;
        }
        self.set_header(section, value.to_text())
    }

    fn insert_rows(&self, row: usize, count: usize, parent: &ModelIndex) -> bool {
        if parent.is_valid() || count == 0 || row > self.row_count_value() {
            return false;
        }
        self.insert_row_values(row, (0..count).map(|_| Vec::new()).collect());
        true
    }

    fn remove_rows(&self, row: usize, count: usize, parent: &ModelIndex) -> bool {
        !parent.is_valid() && !self.remove_row_range(row, count).is_empty()
    }

    fn insert_columns(&self, column: usize, count: usize, parent: &ModelIndex) -> bool {
        !parent.is_valid() && self.insert_column_range(column, count, "")
    }

    fn remove_columns(&self, column: usize, count: usize, parent: &ModelIndex) -> bool {
        !parent.is_valid() && self.remove_column_range(column, count)
    }

    fn persistent_index(&self, index: &ModelIndex) -> PersistentModelIndex {
        self.persistent.track(index.clone())
    }
}
