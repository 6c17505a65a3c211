//! Mapping state and the pure parts of the engine.
//!
//! [`ProxyState`] owns the mapping cache and the filter and sort settings.
//! Everything here is synchronous and silent: no method emits a signal, so
//! the proxy can call into it while holding its state lock and notify
//! observers only after the lock is released.

use std::cmp::Ordering;
use std::sync::Arc;

use sieve_core::logging::targets;

use super::config::{CaseSensitivity, FilterColumn, SortFilterConfig, SortOrder};
use super::filter::FilterPattern;
use super::intervals::{build_source_to_proxy, proxy_intervals_for_insertion};
use super::mapping::{Mapping, MappingCache, MappingId};
use super::sort::is_item_data_less_than;
use crate::model::{ItemModel, ItemRole, ModelIndex, Orientation, PersistentModelIndex};

/// Custom row acceptance: `(source, source_row, source_parent) -> accepted`.
pub type FilterFn<S> = Arc<dyn Fn(&S, usize, &ModelIndex) -> bool + Send + Sync>;

/// Custom column acceptance: `(source, source_column, source_parent) -> accepted`.
pub type ColumnFilterFn<S> = Arc<dyn Fn(&S, usize, &ModelIndex) -> bool + Send + Sync>;

/// Custom ordering of two source cells in the sort column.
///
/// Must be a strict weak ordering that only depends on source data.
pub type LessThanFn<S> = Arc<dyn Fn(&S, &ModelIndex, &ModelIndex) -> bool + Send + Sync>;

/// Rows the source announced it is about to remove.
#[derive(Debug, Clone)]
pub(crate) struct PendingRemoval {
    pub parent: ModelIndex,
    pub start: usize,
    pub end: usize,
}

pub(crate) struct ProxyState<S: ItemModel> {
    pub source: Arc<S>,
    pub cache: MappingCache,

    pub filter: FilterPattern,
    pub filter_column: FilterColumn,
    pub filter_role: ItemRole,
    pub recursive_filtering: bool,
    pub auto_accept_children: bool,
    pub dynamic_sort_filter: bool,

    pub proxy_sort_column: Option<usize>,
    pub source_sort_column: Option<usize>,
    pub sort_order: SortOrder,
    pub sort_role: ItemRole,
    pub sort_case: CaseSensitivity,
    pub sort_locale_aware: bool,

    pub row_filter: Option<FilterFn<S>>,
    pub column_filter: Option<ColumnFilterFn<S>>,
    pub less_than: Option<LessThanFn<S>>,

    pub pending_removal: Option<PendingRemoval>,
    /// Set between rows-about-to-be-inserted and rows-inserted when the
    /// parent was accepted under recursive filtering.
    pub complete_insert: bool,
    /// Topmost rejected ancestor of a pending insertion.
    pub last_top_source: Option<ModelIndex>,

    /// `(proxy handle, source handle)` pairs held across a layout change.
    pub saved_persistent: Vec<(PersistentModelIndex, PersistentModelIndex)>,
    pub saved_layout_parents: Vec<PersistentModelIndex>,
}

impl<S: ItemModel> ProxyState<S> {
    pub fn new(source: Arc<S>) -> Self {
        let defaults = SortFilterConfig::default();
        Self {
            source,
            cache: MappingCache::new(),
            filter: FilterPattern::default(),
            filter_column: defaults.filter_key_column,
            filter_role: defaults.filter_role,
            recursive_filtering: defaults.recursive_filtering,
            auto_accept_children: defaults.auto_accept_children,
            dynamic_sort_filter: defaults.dynamic_sort_filter,
            proxy_sort_column: defaults.sort_column,
            source_sort_column: None,
            sort_order: defaults.sort_order,
            sort_role: defaults.sort_role,
            sort_case: defaults.sort_case_sensitivity,
            sort_locale_aware: defaults.sort_locale_aware,
            row_filter: None,
            column_filter: None,
            less_than: None,
            pending_removal: None,
            complete_insert: false,
            last_top_source: None,
            saved_persistent: Vec::new(),
            saved_layout_parents: Vec::new(),
        }
    }

    /// Reads the plain-data settings back.
    pub fn config(&self) -> SortFilterConfig {
        SortFilterConfig {
            sort_column: self.proxy_sort_column,
            sort_order: self.sort_order,
            sort_role: self.sort_role,
            sort_case_sensitivity: self.sort_case,
            sort_locale_aware: self.sort_locale_aware,
            filter_pattern: self.filter.pattern().to_owned(),
            filter_syntax: self.filter.syntax(),
            filter_case_sensitivity: self.filter.case_sensitivity(),
            filter_key_column: self.filter_column,
            filter_role: self.filter_role,
            dynamic_sort_filter: self.dynamic_sort_filter,
            recursive_filtering: self.recursive_filtering,
            auto_accept_children: self.auto_accept_children,
        }
    }

    /// Applies every field of `config`. `filter` must be its compiled pattern.
    pub fn apply_config(&mut self, config: &SortFilterConfig, filter: FilterPattern) {
        self.proxy_sort_column = config.sort_column;
        self.sort_order = config.sort_order;
        self.sort_role = config.sort_role;
        self.sort_case = config.sort_case_sensitivity;
        self.sort_locale_aware = config.sort_locale_aware;
        self.filter = filter;
        self.filter_column = config.filter_key_column;
        self.filter_role = config.filter_role;
        self.dynamic_sort_filter = config.dynamic_sort_filter;
        self.recursive_filtering = config.recursive_filtering;
        self.auto_accept_children = config.auto_accept_children;
    }

    // =========================================================================
    // Filtering
    // =========================================================================

    /// The configured row predicate, without the recursive relaxations.
    pub fn filter_accepts_row(&self, source_row: usize, source_parent: &ModelIndex) -> bool {
        if let Some(filter) = &self.row_filter {
            return filter(&*self.source, source_row, source_parent);
        }
        if self.filter.is_empty() {
            return true;
        }
        let matches = |column: usize| {
            let index = self.source.index(source_row, column, source_parent);
            self.filter
                .matches(&self.source.data(&index, self.filter_role).to_text())
        };
        match self.filter_column {
            FilterColumn::All => (0..self.source.column_count(source_parent)).any(matches),
            FilterColumn::Column(column) => {
                column >= self.source.column_count(source_parent) || matches(column)
            }
        }
    }

    pub fn filter_accepts_column(&self, source_column: usize, source_parent: &ModelIndex) -> bool {
        match &self.column_filter {
            Some(filter) => filter(&*self.source, source_column, source_parent),
            None => true,
        }
    }

    /// Row acceptance including the auto-accept and recursive relaxations.
    pub fn accepts_row_internal(&self, source_row: usize, source_parent: &ModelIndex) -> bool {
        self.filter_accepts_row(source_row, source_parent)
            || (self.auto_accept_children && self.ancestor_accepted(source_parent))
            || (self.recursive_filtering && self.descendant_accepted(source_row, source_parent))
    }

    pub fn accepts(&self, orientation: Orientation, item: usize, source_parent: &ModelIndex) -> bool {
        match orientation {
            Orientation::Vertical => self.accepts_row_internal(item, source_parent),
            Orientation::Horizontal => self.filter_accepts_column(item, source_parent),
        }
    }

    fn ancestor_accepted(&self, source_parent: &ModelIndex) -> bool {
        let mut current = source_parent.clone();
        while current.is_valid() {
            let grandparent = self.source.parent(&current);
            if self.filter_accepts_row(current.row(), &grandparent) {
                return true;
            }
            current = grandparent;
        }
        false
    }

    fn descendant_accepted(&self, source_row: usize, source_parent: &ModelIndex) -> bool {
        if self.source.column_count(source_parent) == 0 {
            return false;
        }
        let index = self.source.index(source_row, 0, source_parent);
        (0..self.source.row_count(&index)).any(|child| {
            self.filter_accepts_row(child, &index) || self.descendant_accepted(child, &index)
        })
    }

    /// Returns `true` if `row` under `parent` lies inside the pending removal.
    pub fn is_being_removed(&self, parent: &ModelIndex, row: usize) -> bool {
        let Some(removal) = &self.pending_removal else {
            return false;
        };
        let (mut parent, mut row) = (parent.clone(), row);
        loop {
            if parent == removal.parent {
                return (removal.start..=removal.end).contains(&row);
            }
            if !parent.is_valid() {
                return false;
            }
            row = parent.row();
            parent = self.source.parent(&parent);
        }
    }

    // =========================================================================
    // Sorting
    // =========================================================================

    pub fn less_than(&self, left: &ModelIndex, right: &ModelIndex) -> bool {
        if let Some(less_than) = &self.less_than {
            return less_than(&*self.source, left, right);
        }
        is_item_data_less_than(
            &self.source.data(left, self.sort_role),
            &self.source.data(right, self.sort_role),
            self.sort_case,
            self.sort_locale_aware,
        )
    }

    /// Stable-sorts source rows into proxy order.
    pub fn sort_source_rows(&self, rows: &mut [usize], source_parent: &ModelIndex) {
        let Some(column) = self.source_sort_column else {
            match self.sort_order {
                SortOrder::Ascending => rows.sort_unstable(),
                SortOrder::Descending => rows.sort_unstable_by(|a, b| b.cmp(a)),
            }
            return;
        };
        let mut keyed: Vec<(usize, ModelIndex)> = rows
            .iter()
            .map(|&row| (row, self.source.index(row, column, source_parent)))
            .collect();
        keyed.sort_by(|(_, a), (_, b)| {
            let (first, second) = match self.sort_order {
                SortOrder::Ascending => (a, b),
                SortOrder::Descending => (b, a),
            };
            if self.less_than(first, second) {
                Ordering::Less
            } else if self.less_than(second, first) {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        });
        for (slot, (row, _)) in rows.iter_mut().zip(keyed) {
            *slot = row;
        }
    }

    /// The source column behind the proxy sort column, by counting accepted
    /// root columns.
    pub fn find_source_sort_column(&self) -> Option<usize> {
        let proxy_column = self.proxy_sort_column?;
        let root = ModelIndex::invalid();
        (0..self.source.column_count(&root))
            .filter(|&column| self.filter_accepts_column(column, &root))
            .nth(proxy_column)
    }

    /// Re-derives the source sort column through the root mapping. Returns
    /// `true` if it changed.
    pub fn update_source_sort_column(&mut self) -> bool {
        let previous = self.source_sort_column;
        self.source_sort_column = match self.proxy_sort_column {
            None => None,
            Some(proxy_column) => {
                let root = self.create_mapping(&ModelIndex::invalid());
                self.cache
                    .get(root)
                    .and_then(|mapping| mapping.source_columns.get(proxy_column).copied())
            }
        };
        previous != self.source_sort_column
    }

    /// Checks whether any of `source_rows` now violates the order against
    /// its proxy neighbours.
    pub fn needs_reorder(&self, id: MappingId, source_rows: &[usize]) -> bool {
        let (Some(column), Some(mapping)) = (self.source_sort_column, self.cache.get(id)) else {
            return false;
        };
        let parent = &mapping.source_parent;
        let index = |row: usize| self.source.index(row, column, parent);
        let ascending = self.sort_order == SortOrder::Ascending;
        source_rows.iter().any(|&row| {
            let Some(proxy_row) = mapping.proxy_rows.get(row).copied().flatten() else {
                return false;
            };
            let current = index(row);
            let before = proxy_row
                .checked_sub(1)
                .map(|previous| index(mapping.source_rows[previous]))
                .is_some_and(|previous| {
                    if ascending {
                        self.less_than(&current, &previous)
                    } else {
                        self.less_than(&previous, &current)
                    }
                });
            let after = mapping
                .source_rows
                .get(proxy_row + 1)
                .map(|&next| index(next))
                .is_some_and(|next| {
                    if ascending {
                        self.less_than(&next, &current)
                    } else {
                        self.less_than(&current, &next)
                    }
                });
            before || after
        })
    }

    /// Re-sorts the rows of every mapping.
    pub fn sort_all_mappings(&mut self) {
        for id in self.cache.ids() {
            let Some(mapping) = self.cache.get_mut(id) else {
                continue;
            };
            let parent = mapping.source_parent.clone();
            // Sorted on a copy so the mapping stays whole if a comparator panics.
            let mut rows = mapping.source_rows.clone();
            self.sort_source_rows(&mut rows, &parent);
            if let Some(mapping) = self.cache.get_mut(id) {
                build_source_to_proxy(&rows, &mut mapping.proxy_rows, 0);
                mapping.source_rows = rows;
                debug_assert!(mapping.is_consistent());
            }
        }
        tracing::debug!(target: targets::SORT, mappings = self.cache.len(), "mappings sorted");
    }

    /// Splits `source_items` into insertion runs for the mapping `id`.
    pub fn insertion_intervals(
        &self,
        id: MappingId,
        orientation: Orientation,
        source_items: &[usize],
    ) -> Vec<(usize, Vec<usize>)> {
        let Some(mapping) = self.cache.get(id) else {
            return Vec::new();
        };
        let (_, proxy_to_source) = mapping.axis(orientation);
        let sort_column = self
            .source_sort_column
            .filter(|_| orientation == Orientation::Vertical && self.dynamic_sort_filter);
        match sort_column {
            Some(column) => {
                let parent = &mapping.source_parent;
                let ascending = self.sort_order == SortOrder::Ascending;
                proxy_intervals_for_insertion(proxy_to_source, source_items, |a, b| {
                    let a = self.source.index(a, column, parent);
                    let b = self.source.index(b, column, parent);
                    if ascending {
                        self.less_than(&a, &b)
                    } else {
                        self.less_than(&b, &a)
                    }
                })
            }
            None => proxy_intervals_for_insertion(proxy_to_source, source_items, |a, b| a < b),
        }
    }

    // =========================================================================
    // Mappings
    // =========================================================================

    /// Returns the mapping for `source_parent`, building it (and its
    /// ancestors) if needed.
    pub fn create_mapping(&mut self, source_parent: &ModelIndex) -> MappingId {
        if let Some(id) = self.cache.find(source_parent) {
            return id;
        }

        let mut mapping = Mapping::new(source_parent.clone());
        let rows = self.source.row_count(source_parent);
        let columns = self.source.column_count(source_parent);
        mapping.source_rows = (0..rows)
            .filter(|&row| self.accepts_row_internal(row, source_parent))
            .collect();
        mapping.source_columns = (0..columns)
            .filter(|&column| self.filter_accepts_column(column, source_parent))
            .collect();
        self.sort_source_rows(&mut mapping.source_rows, source_parent);
        mapping.proxy_rows = vec![None; rows];
        mapping.proxy_columns = vec![None; columns];
        build_source_to_proxy(&mapping.source_rows, &mut mapping.proxy_rows, 0);
        build_source_to_proxy(&mapping.source_columns, &mut mapping.proxy_columns, 0);
        debug_assert!(mapping.is_consistent());

        if source_parent.is_valid() {
            let grandparent = self.source.parent(source_parent);
            let parent_id = self.create_mapping(&grandparent);
            if let Some(parent_mapping) = self.cache.get_mut(parent_id) {
                parent_mapping.mapped_children.push(source_parent.clone());
            }
        }
        self.cache.insert(mapping)
    }

    /// Like [`create_mapping`](Self::create_mapping), but refuses when
    /// `source_parent` or one of its ancestors is filtered out.
    pub fn create_mapping_recursive(&mut self, source_parent: &ModelIndex) -> Option<MappingId> {
        if source_parent.is_valid() {
            let grandparent = self.source.parent(source_parent);
            let parent_id = match self.cache.find(&grandparent) {
                Some(id) => id,
                None => self.create_mapping_recursive(&grandparent)?,
            };
            let parent_mapping = self.cache.get(parent_id)?;
            if !is_mapped(&parent_mapping.proxy_rows, source_parent.row())
                || !is_mapped(&parent_mapping.proxy_columns, source_parent.column())
            {
                return None;
            }
        }
        Some(self.create_mapping(source_parent))
    }

    /// Returns `true` if the grandparent mapping exists and maps
    /// `source_parent`.
    pub fn can_create_mapping(&self, source_parent: &ModelIndex) -> bool {
        if !source_parent.is_valid() {
            return true;
        }
        let grandparent = self.source.parent(source_parent);
        self.cache
            .find(&grandparent)
            .and_then(|id| self.cache.get(id))
            .is_some_and(|mapping| {
                is_mapped(&mapping.proxy_rows, source_parent.row())
                    && is_mapped(&mapping.proxy_columns, source_parent.column())
            })
    }

    /// Drops every mapping and re-derives the sort column when dynamic.
    pub fn clear_mapping(&mut self) {
        self.cache.clear();
        if self.dynamic_sort_filter {
            self.source_sort_column = self.find_source_sort_column();
        }
        tracing::debug!(target: targets::MAPPING, "mapping cache cleared");
    }

    /// Moves or drops the mapped children of `id` after `start..=end` was
    /// inserted (`remove == false`) or removed along `orientation`.
    pub fn update_children_mapping(
        &mut self,
        id: MappingId,
        orientation: Orientation,
        start: usize,
        end: usize,
        remove: bool,
    ) {
        let Some(mapping) = self.cache.get(id) else {
            return;
        };
        let source_parent = mapping.source_parent.clone();
        let children = mapping.mapped_children.clone();
        let delta = end - start + 1;

        let mut kept = Vec::with_capacity(children.len());
        let mut moved = Vec::new();
        for child in children {
            let position = match orientation {
                Orientation::Vertical => child.row(),
                Orientation::Horizontal => child.column(),
            };
            if position < start {
                kept.push(child);
                continue;
            }
            let new_position = if remove {
                if position <= end {
                    self.cache.remove_subtree(&child);
                    continue;
                }
                position - delta
            } else {
                position + delta
            };
            let new_index = match orientation {
                Orientation::Vertical => {
                    self.source.index(new_position, child.column(), &source_parent)
                }
                Orientation::Horizontal => {
                    self.source.index(child.row(), new_position, &source_parent)
                }
            };
            // Detach everything first: a new key may equal an old one.
            match self.cache.detach(&child) {
                Some(child_id) if new_index.is_valid() => {
                    moved.push((new_index.clone(), child_id));
                    kept.push(new_index);
                }
                Some(child_id) => self.cache.remove_by_id(child_id),
                None => {}
            }
        }
        for (index, child_id) in moved {
            self.cache.attach(index, child_id);
        }
        if let Some(mapping) = self.cache.get_mut(id) {
            mapping.mapped_children = kept;
        }
    }

    // =========================================================================
    // Index translation
    // =========================================================================

    /// The mapping a proxy index belongs to, if it still exists.
    pub fn mapping_of(&self, proxy_index: &ModelIndex) -> Option<MappingId> {
        if !proxy_index.is_valid() {
            return None;
        }
        let id = MappingId::from_internal_id(proxy_index.internal_id());
        self.cache.get(id).map(|_| id)
    }

    pub fn proxy_to_source(&self, proxy_index: &ModelIndex) -> ModelIndex {
        let Some(mapping) = self.mapping_of(proxy_index).and_then(|id| self.cache.get(id)) else {
            return ModelIndex::invalid();
        };
        match (
            mapping.source_rows.get(proxy_index.row()),
            mapping.source_columns.get(proxy_index.column()),
        ) {
            (Some(&row), Some(&column)) => self.source.index(row, column, &mapping.source_parent),
            _ => ModelIndex::invalid(),
        }
    }

    pub fn source_to_proxy(&mut self, source_index: &ModelIndex) -> ModelIndex {
        if !source_index.is_valid() {
            return ModelIndex::invalid();
        }
        let source_parent = self.source.parent(source_index);
        let Some(id) = self.create_mapping_recursive(&source_parent) else {
            return ModelIndex::invalid();
        };
        let Some(mapping) = self.cache.get(id) else {
            return ModelIndex::invalid();
        };
        match (
            mapping.proxy_rows.get(source_index.row()).copied().flatten(),
            mapping.proxy_columns.get(source_index.column()).copied().flatten(),
        ) {
            (Some(row), Some(column)) => self.create_index(row, column, id),
            _ => ModelIndex::invalid(),
        }
    }

    /// The mapping holding the children of a proxy parent, built if needed.
    /// `None` when a valid `proxy_parent` no longer maps to the source.
    pub fn mapping_under(&mut self, proxy_parent: &ModelIndex) -> Option<MappingId> {
        let source_parent = self.proxy_to_source(proxy_parent);
        if proxy_parent.is_valid() && !source_parent.is_valid() {
            return None;
        }
        Some(self.create_mapping(&source_parent))
    }

    /// Builds the proxy index at `(row, column)` inside mapping `id`.
    pub fn create_index(&self, row: usize, column: usize, id: MappingId) -> ModelIndex {
        ModelIndex::with_internal_id(row, column, self.proxy_parent_of_mapping(id), id.to_internal_id())
    }

    /// The proxy parent of a proxy index, without building mappings.
    pub fn proxy_parent(&self, proxy_index: &ModelIndex) -> ModelIndex {
        match self.mapping_of(proxy_index) {
            Some(id) => self.proxy_parent_of_mapping(id),
            None => ModelIndex::invalid(),
        }
    }

    /// The proxy index of the source parent of mapping `id`.
    pub fn proxy_parent_of_mapping(&self, id: MappingId) -> ModelIndex {
        let Some(mapping) = self.cache.get(id) else {
            return ModelIndex::invalid();
        };
        let source_parent = &mapping.source_parent;
        if !source_parent.is_valid() {
            return ModelIndex::invalid();
        }
        let grandparent = self.source.parent(source_parent);
        let Some(parent_id) = self.cache.find(&grandparent) else {
            return ModelIndex::invalid();
        };
        let Some(parent_mapping) = self.cache.get(parent_id) else {
            return ModelIndex::invalid();
        };
        match (
            parent_mapping.proxy_rows.get(source_parent.row()).copied().flatten(),
            parent_mapping.proxy_columns.get(source_parent.column()).copied().flatten(),
        ) {
            (Some(row), Some(column)) => self.create_index(row, column, parent_id),
            _ => ModelIndex::invalid(),
        }
    }
}

fn is_mapped(table: &[Option<usize>], item: usize) -> bool {
    table.get(item).is_some_and(Option::is_some)
}
