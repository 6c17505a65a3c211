//! Sorting and filtering proxy models.
//!
//! [`SortFilterProxyModel`] wraps any [`ItemModel`] and presents a filtered,
//! sorted view of it. The proxy keeps a lazily built translation table
//! (a *mapping*) per source parent and updates those tables incrementally as
//! the source changes, so observers of the proxy see fine-grained
//! insert/remove/data notifications instead of resets.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use sieve::model::{ItemModel, ModelIndex, TableModel};
//! use sieve::proxy::{SortFilterProxyModel, SortOrder};
//!
//! let source = Arc::new(TableModel::from_strings(["pear", "apple", "plum", "fig"]));
//! let proxy = SortFilterProxyModel::new(source.clone());
//! proxy.sort(Some(0), SortOrder::Ascending);
//! proxy.set_filter_regular_expression("^p").unwrap();
//!
//! fn visible(proxy: &SortFilterProxyModel<TableModel>) -> Vec<String> {
//!     let root = ModelIndex::invalid();
//!     (0..proxy.row_count(&root))
//!         .filter_map(|row| proxy.display_text(&proxy.index(row, 0, &root)))
//!         .collect()
//! }
//! assert_eq!(visible(&proxy), ["pear", "plum"]);
//!
//! // New source rows land in sorted position.
//! source.append_row(vec!["peach".into()]);
//! assert_eq!(visible(&proxy), ["peach", "pear", "plum"]);
//! ```
//!
//! # Re-entrancy
//!
//! The proxy never holds its internal lock while notifying observers, so a
//! slot connected to one of its signals may query it, or change its filter
//! or sort settings, from inside the notification.

mod config;
mod diagnostic;
mod filter;
mod handlers;
mod intervals;
mod mapping;
mod sort;
mod state;

use std::sync::Arc;

use parking_lot::Mutex;
use sieve_core::Signal;
use sieve_core::logging::targets;

pub use config::{CaseSensitivity, FilterColumn, PatternSyntax, SortFilterConfig, SortOrder};
pub use diagnostic::{DiagnosticKind, ProxyDiagnostic};
pub use filter::{FilterPattern, wildcard_to_regex};
pub use mapping::MappingSnapshot;
pub use sort::is_item_data_less_than;
pub use state::{ColumnFilterFn, FilterFn, LessThanFn};

use handlers::{FilterDirection, SourceConnections};
use intervals::contiguous_runs;
use state::ProxyState;

use crate::error::Result;
use crate::model::{
    ItemData, ItemFlags, ItemModel, ItemRole, LayoutChangeHint, ModelIndex, ModelSignals,
    Orientation, PersistentIndexRegistry, PersistentModelIndex,
};

/// A sorted and filtered view of a source model.
///
/// Created behind an [`Arc`] because it subscribes to the source's signals;
/// the subscriptions hold only a weak reference and are removed on drop.
///
/// Proxy indexes are only meaningful to the proxy that produced them. An
/// index whose mapping has since been discarded resolves to
/// [`ModelIndex::invalid()`] everywhere.
pub struct SortFilterProxyModel<S: ItemModel> {
    state: Mutex<ProxyState<S>>,
    connections: Mutex<Option<SourceConnections>>,
    persistent: PersistentIndexRegistry,
    signals: ModelSignals,
    diagnostics: Signal<ProxyDiagnostic>,
}

static_assertions::assert_impl_all!(SortFilterProxyModel<crate::model::TableModel>: Send, Sync);

/// Builder for [`SortFilterProxyModel`] with strategies and initial settings.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use sieve::model::{ItemModel, ModelIndex, TableModel};
/// use sieve::proxy::{SortFilterConfig, SortFilterProxyModel};
///
/// let source = Arc::new(TableModel::from_strings(["b", "", "a"]));
/// let proxy = SortFilterProxyModel::builder(source)
///     .filter_fn(|model: &TableModel, row, _parent: &ModelIndex| !model.cell(row, 0).to_text().is_empty())
///     .config(SortFilterConfig { sort_column: Some(0), ..Default::default() })
///     .build()
///     .unwrap();
///
/// let first = proxy.index(0, 0, &ModelIndex::invalid());
/// assert_eq!(proxy.row_count(&ModelIndex::invalid()), 2);
/// assert_eq!(proxy.display_text(&first).as_deref(), Some("a"));
/// ```
pub struct SortFilterProxyModelBuilder<S: ItemModel> {
    source: Arc<S>,
    config: SortFilterConfig,
    row_filter: Option<FilterFn<S>>,
    column_filter: Option<ColumnFilterFn<S>>,
    less_than: Option<LessThanFn<S>>,
}

impl<S: ItemModel + 'static> SortFilterProxyModelBuilder<S> {
    fn new(source: Arc<S>) -> Self {
        Self {
            source,
            config: SortFilterConfig::default(),
            row_filter: None,
            column_filter: None,
            less_than: None,
        }
    }

    /// Initial settings.
    pub fn config(mut self, config: SortFilterConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the pattern-based row filter.
    pub fn filter_fn(
        mut self,
        filter: impl Fn(&S, usize, &ModelIndex) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.row_filter = Some(Arc::new(filter));
        self
    }

    /// Replaces the accept-all column filter.
    pub fn column_filter_fn(
        mut self,
        filter: impl Fn(&S, usize, &ModelIndex) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.column_filter = Some(Arc::new(filter));
        self
    }

    /// Replaces the default comparison. Must be a strict weak ordering.
    pub fn less_than_fn(
        mut self,
        less_than: impl Fn(&S, &ModelIndex, &ModelIndex) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.less_than = Some(Arc::new(less_than));
        self
    }

    /// Builds the proxy and connects it to the source.
    ///
    /// Fails if the configured filter pattern does not compile.
    pub fn build(self) -> Result<Arc<SortFilterProxyModel<S>>> {
        let filter = FilterPattern::new(
            self.config.filter_pattern.as_str(),
            self.config.filter_syntax,
            self.config.filter_case_sensitivity,
        )?;
        let mut state = ProxyState::new(self.source);
        state.apply_config(&self.config, filter);
        state.row_filter = self.row_filter;
        state.column_filter = self.column_filter;
        state.less_than = self.less_than;
        Ok(SortFilterProxyModel::from_state(state))
    }
}

impl<S: ItemModel + 'static> SortFilterProxyModel<S> {
    /// Creates a proxy with default settings: no sorting, no filtering,
    /// dynamic updates on.
    pub fn new(source: Arc<S>) -> Arc<Self> {
        Self::from_state(ProxyState::new(source))
    }

    /// Starts a builder for a proxy over `source`.
    pub fn builder(source: Arc<S>) -> SortFilterProxyModelBuilder<S> {
        SortFilterProxyModelBuilder::new(source)
    }

    fn from_state(mut state: ProxyState<S>) -> Arc<Self> {
        state.source_sort_column = state.find_source_sort_column();
        let source = state.source.clone();
        let proxy = Arc::new(Self {
            state: Mutex::new(state),
            connections: Mutex::new(None),
            persistent: PersistentIndexRegistry::new(),
            signals: ModelSignals::new(),
            diagnostics: Signal::new(),
        });
        *proxy.connections.lock() = Some(proxy.connect_source(source.signals()));
        tracing::debug!(target: targets::PROXY, "proxy created");
        proxy
    }

    /// The wrapped model.
    pub fn source_model(&self) -> Arc<S> {
        self.state.lock().source.clone()
    }

    /// Replaces the wrapped model. Observers see a reset.
    pub fn set_source_model(self: &Arc<Self>, source: Arc<S>) {
        let previous = self.source_model();
        if Arc::ptr_eq(&previous, &source) {
            return;
        }
        self.signals.model_about_to_reset.emit(());
        if let Some(connections) = self.connections.lock().take() {
            connections.disconnect(previous.signals());
        }
        self.persistent.invalidate_all();
        {
            let mut state = self.state.lock();
            state.source = source.clone();
            state.pending_removal = None;
            state.complete_insert = false;
            state.last_top_source = None;
            state.clear_mapping();
        }
        *self.connections.lock() = Some(self.connect_source(source.signals()));
        self.signals.model_reset.emit(());

        let resort = {
            let mut state = self.state.lock();
            state.update_source_sort_column() && state.dynamic_sort_filter
        };
        if resort {
            self.sort_all();
        }
    }

    // =========================================================================
    // Translation
    // =========================================================================

    /// The source index behind a proxy index, or invalid.
    pub fn map_to_source(&self, proxy_index: &ModelIndex) -> ModelIndex {
        self.state.lock().proxy_to_source(proxy_index)
    }

    /// The proxy index showing a source index, or invalid if it is filtered
    /// out (itself or any ancestor).
    pub fn map_from_source(&self, source_index: &ModelIndex) -> ModelIndex {
        self.state.lock().source_to_proxy(source_index)
    }

    /// Copies of every materialised mapping, parents before children.
    pub fn mapping_snapshot(&self) -> Vec<MappingSnapshot> {
        self.state.lock().cache.snapshot()
    }

    /// Reports of source-model contract violations the proxy recovered from.
    pub fn diagnostics(&self) -> &Signal<ProxyDiagnostic> {
        &self.diagnostics
    }

    // =========================================================================
    // Sorting
    // =========================================================================

    /// Sorts by proxy `column`, or restores source order with `None`.
    pub fn sort(&self, column: Option<usize>, order: SortOrder) {
        {
            let mut state = self.state.lock();
            if state.dynamic_sort_filter
                && state.proxy_sort_column == column
                && state.sort_order == order
            {
                return;
            }
            state.sort_order = order;
            state.proxy_sort_column = column;
            state.update_source_sort_column();
        }
        self.sort_all();
    }

    pub fn sort_column(&self) -> Option<usize> {
        self.state.lock().proxy_sort_column
    }

    pub fn sort_order(&self) -> SortOrder {
        self.state.lock().sort_order
    }

    pub fn sort_role(&self) -> ItemRole {
        self.state.lock().sort_role
    }

    pub fn set_sort_role(&self, role: ItemRole) {
        let changed = std::mem::replace(&mut self.state.lock().sort_role, role) != role;
        if changed {
            self.sort_all();
        }
    }

    pub fn sort_case_sensitivity(&self) -> CaseSensitivity {
        self.state.lock().sort_case
    }

    pub fn set_sort_case_sensitivity(&self, case: CaseSensitivity) {
        let changed = std::mem::replace(&mut self.state.lock().sort_case, case) != case;
        if changed {
            self.sort_all();
        }
    }

    pub fn is_sort_locale_aware(&self) -> bool {
        self.state.lock().sort_locale_aware
    }

    pub fn set_sort_locale_aware(&self, on: bool) {
        let changed = std::mem::replace(&mut self.state.lock().sort_locale_aware, on) != on;
        if changed {
            self.sort_all();
        }
    }

    pub fn dynamic_sort_filter(&self) -> bool {
        self.state.lock().dynamic_sort_filter
    }

    /// Turns automatic re-filtering and re-sorting on source changes on or
    /// off. Enabling re-sorts immediately.
    pub fn set_dynamic_sort_filter(&self, enable: bool) {
        let changed = std::mem::replace(&mut self.state.lock().dynamic_sort_filter, enable) != enable;
        if changed && enable {
            self.sort_all();
        }
    }

    /// Replaces the comparison used for sorting.
    pub fn set_less_than_fn(
        &self,
        less_than: impl Fn(&S, &ModelIndex, &ModelIndex) -> bool + Send + Sync + 'static,
    ) {
        let sorted = {
            let mut state = self.state.lock();
            state.less_than = Some(Arc::new(less_than));
            state.source_sort_column.is_some()
        };
        if sorted {
            self.sort_all();
        }
    }

    // =========================================================================
    // Filtering
    // =========================================================================

    pub fn filter_pattern(&self) -> FilterPattern {
        self.state.lock().filter.clone()
    }

    /// Replaces the row filter pattern.
    pub fn set_filter_pattern(&self, pattern: FilterPattern) {
        if self.state.lock().filter != pattern {
            self.change_filter(FilterDirection::Rows, |state| state.filter = pattern);
        }
    }

    /// Filters rows by a regular expression, keeping the case sensitivity.
    ///
    /// An invalid expression leaves the current filter in place.
    pub fn set_filter_regular_expression(&self, pattern: &str) -> Result<()> {
        self.set_filter_string(pattern, PatternSyntax::RegularExpression)
    }

    /// Filters rows by a wildcard pattern, keeping the case sensitivity.
    pub fn set_filter_wildcard(&self, pattern: &str) -> Result<()> {
        self.set_filter_string(pattern, PatternSyntax::Wildcard)
    }

    /// Filters rows by a literal substring, keeping the case sensitivity.
    pub fn set_filter_fixed_string(&self, pattern: &str) -> Result<()> {
        self.set_filter_string(pattern, PatternSyntax::FixedString)
    }

    fn set_filter_string(&self, pattern: &str, syntax: PatternSyntax) -> Result<()> {
        let case = self.state.lock().filter.case_sensitivity();
        let compiled = FilterPattern::new(pattern, syntax, case).inspect_err(|err| {
            tracing::warn!(target: targets::FILTER, error = %err, "filter pattern rejected");
        })?;
        self.set_filter_pattern(compiled);
        Ok(())
    }

    pub fn filter_case_sensitivity(&self) -> CaseSensitivity {
        self.state.lock().filter.case_sensitivity()
    }

    /// Recompiles the current pattern with `case`.
    pub fn set_filter_case_sensitivity(&self, case: CaseSensitivity) -> Result<()> {
        let current = self.filter_pattern();
        if current.case_sensitivity() == case {
            return Ok(());
        }
        self.set_filter_pattern(current.with_case_sensitivity(case)?);
        Ok(())
    }

    pub fn filter_key_column(&self) -> FilterColumn {
        self.state.lock().filter_column
    }

    /// Chooses the column (or all columns) the pattern is matched against.
    pub fn set_filter_key_column(&self, column: FilterColumn) {
        if self.state.lock().filter_column != column {
            self.change_filter(FilterDirection::Rows, |state| state.filter_column = column);
        }
    }

    pub fn filter_role(&self) -> ItemRole {
        self.state.lock().filter_role
    }

    pub fn set_filter_role(&self, role: ItemRole) {
        if self.state.lock().filter_role != role {
            self.change_filter(FilterDirection::Rows, |state| state.filter_role = role);
        }
    }

    pub fn is_recursive_filtering_enabled(&self) -> bool {
        self.state.lock().recursive_filtering
    }

    /// Accept rows that have an accepted descendant.
    pub fn set_recursive_filtering_enabled(&self, enabled: bool) {
        if self.state.lock().recursive_filtering != enabled {
            self.change_filter(FilterDirection::Rows, |state| state.recursive_filtering = enabled);
        }
    }

    pub fn auto_accept_child_rows(&self) -> bool {
        self.state.lock().auto_accept_children
    }

    /// Accept rows that have an accepted ancestor.
    pub fn set_auto_accept_child_rows(&self, accept: bool) {
        if self.state.lock().auto_accept_children != accept {
            self.change_filter(FilterDirection::Rows, |state| state.auto_accept_children = accept);
        }
    }

    /// Replaces the pattern-based row filter with `filter`.
    pub fn set_filter_fn(
        &self,
        filter: impl Fn(&S, usize, &ModelIndex) -> bool + Send + Sync + 'static,
    ) {
        self.begin_filter_change();
        self.state.lock().row_filter = Some(Arc::new(filter));
        self.invalidate_rows_filter();
    }

    /// Restores the pattern-based row filter.
    pub fn clear_filter_fn(&self) {
        self.begin_filter_change();
        self.state.lock().row_filter = None;
        self.invalidate_rows_filter();
    }

    /// Replaces the accept-all column filter with `filter`.
    pub fn set_column_filter_fn(
        &self,
        filter: impl Fn(&S, usize, &ModelIndex) -> bool + Send + Sync + 'static,
    ) {
        self.begin_filter_change();
        self.state.lock().column_filter = Some(Arc::new(filter));
        self.invalidate_columns_filter();
    }

    fn change_filter(&self, direction: FilterDirection, update: impl FnOnce(&mut ProxyState<S>)) {
        self.filter_about_to_be_changed();
        update(&mut self.state.lock());
        self.filter_changed(direction, &ModelIndex::invalid());
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Rebuilds every mapping from scratch inside one layout change.
    pub fn invalidate(&self) {
        self.signals
            .layout_about_to_change
            .emit((Vec::new(), LayoutChangeHint::NoHint));
        self.clear_mapping();
        self.signals
            .layout_changed
            .emit((Vec::new(), LayoutChangeHint::NoHint));
    }

    /// Re-evaluates the row and column filters incrementally.
    pub fn invalidate_filter(&self) {
        self.filter_changed(FilterDirection::All, &ModelIndex::invalid());
    }

    pub fn invalidate_rows_filter(&self) {
        self.filter_changed(FilterDirection::Rows, &ModelIndex::invalid());
    }

    pub fn invalidate_columns_filter(&self) {
        self.filter_changed(FilterDirection::Columns, &ModelIndex::invalid());
    }

    /// Call before changing state a custom filter depends on, then call one
    /// of the `invalidate_*_filter` methods.
    pub fn begin_filter_change(&self) {
        self.state.lock().create_mapping(&ModelIndex::invalid());
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// The current plain-data settings.
    pub fn config(&self) -> SortFilterConfig {
        self.state.lock().config()
    }

    /// Applies every setting in `config` and rebuilds the view.
    ///
    /// The filter pattern is compiled first; if it is invalid nothing
    /// changes.
    pub fn apply_config(&self, config: &SortFilterConfig) -> Result<()> {
        let filter = FilterPattern::new(
            config.filter_pattern.as_str(),
            config.filter_syntax,
            config.filter_case_sensitivity,
        )
        .inspect_err(|err| {
            tracing::warn!(target: targets::PROXY, error = %err, "configuration rejected");
        })?;

        self.signals
            .layout_about_to_change
            .emit((Vec::new(), LayoutChangeHint::NoHint));
        let saved = self.store_persistent();
        {
            let mut state = self.state.lock();
            state.apply_config(config, filter);
            state.cache.clear();
            state.source_sort_column = state.find_source_sort_column();
        }
        self.update_persistent(saved);
        self.signals
            .layout_changed
            .emit((Vec::new(), LayoutChangeHint::NoHint));
        Ok(())
    }

    // =========================================================================
    // Structural edits
    // =========================================================================

    fn insert_items(
        &self,
        orientation: Orientation,
        position: usize,
        count: usize,
        parent: &ModelIndex,
    ) -> bool {
        if count == 0 {
            return false;
        }
        let (source, source_parent, source_position) = {
            let mut state = self.state.lock();
            let Some(id) = state.mapping_under(parent) else {
                return false;
            };
            let Some(mapping) = state.cache.get(id) else {
                return false;
            };
            let (source_to_proxy, proxy_to_source) = mapping.axis(orientation);
            if position > proxy_to_source.len() {
                return false;
            }
            let source_position = proxy_to_source
                .get(position)
                .copied()
                .unwrap_or(source_to_proxy.len());
            (state.source.clone(), mapping.source_parent.clone(), source_position)
        };
        match orientation {
            Orientation::Vertical => source.insert_rows(source_position, count, &source_parent),
            Orientation::Horizontal => {
                source.insert_columns(source_position, count, &source_parent)
            }
        }
    }

    fn remove_items(
        &self,
        orientation: Orientation,
        position: usize,
        count: usize,
        parent: &ModelIndex,
    ) -> bool {
        if count == 0 {
            return false;
        }
        let (source, source_parent, mut items, direct) = {
            let mut state = self.state.lock();
            let Some(id) = state.mapping_under(parent) else {
                return false;
            };
            let Some(mapping) = state.cache.get(id) else {
                return false;
            };
            let (source_to_proxy, proxy_to_source) = mapping.axis(orientation);
            if position + count > proxy_to_source.len() {
                return false;
            }
            let unsorted = orientation == Orientation::Horizontal || state.source_sort_column.is_none();
            let direct = count == 1 || (unsorted && source_to_proxy.len() == proxy_to_source.len());
            (
                state.source.clone(),
                mapping.source_parent.clone(),
                proxy_to_source[position..position + count].to_vec(),
                direct,
            )
        };

        let remove = |first: usize, count: usize| match orientation {
            Orientation::Vertical => source.remove_rows(first, count, &source_parent),
            Orientation::Horizontal => source.remove_columns(first, count, &source_parent),
        };
        if direct {
            return remove(items[0], count);
        }
        items.sort_unstable();
        let mut ok = true;
        for (first, last) in contiguous_runs(&items).into_iter().rev() {
            ok = ok && remove(first, last - first + 1);
        }
        ok
    }

    /// The source model and the source index behind `proxy_index`.
    fn source_and_index(&self, proxy_index: &ModelIndex) -> (Arc<S>, ModelIndex) {
        let state = self.state.lock();
        (state.source.clone(), state.proxy_to_source(proxy_index))
    }

    fn header_source(&self, section: usize, orientation: Orientation) -> Option<(Arc<S>, usize)> {
        let mut state = self.state.lock();
        let root = state.create_mapping(&ModelIndex::invalid());
        let source_section = state.cache.get(root)?.axis(orientation).1.get(section).copied()?;
        Some((state.source.clone(), source_section))
    }
}

impl<S: ItemModel + 'static> ItemModel for SortFilterProxyModel<S> {
    fn row_count(&self, parent: &ModelIndex) -> usize {
        let mut state = self.state.lock();
        state
            .mapping_under(parent)
            .and_then(|id| state.cache.get(id))
            .map_or(0, |mapping| mapping.source_rows.len())
    }

    fn column_count(&self, parent: &ModelIndex) -> usize {
        let mut state = self.state.lock();
        state
            .mapping_under(parent)
            .and_then(|id| state.cache.get(id))
            .map_or(0, |mapping| mapping.source_columns.len())
    }

    fn data(&self, index: &ModelIndex, role: ItemRole) -> ItemData {
        let (source, source_index) = self.source_and_index(index);
        if !source_index.is_valid() {
            return ItemData::None;
        }
        source.data(&source_index, role)
    }

    fn index(&self, row: usize, column: usize, parent: &ModelIndex) -> ModelIndex {
        let mut state = self.state.lock();
        let Some(id) = state.mapping_under(parent) else {
            return ModelIndex::invalid();
        };
        match state.cache.get(id) {
            Some(mapping)
                if row < mapping.source_rows.len() && column < mapping.source_columns.len() =>
            {
                state.create_index(row, column, id)
            }
            _ => ModelIndex::invalid(),
        }
    }

    fn parent(&self, index: &ModelIndex) -> ModelIndex {
        self.state.lock().proxy_parent(index)
    }

    fn signals(&self) -> &ModelSignals {
        &self.signals
    }

    fn set_data(&self, index: &ModelIndex, value: ItemData, role: ItemRole) -> bool {
        let (source, source_index) = self.source_and_index(index);
        source_index.is_valid() && source.set_data(&source_index, value, role)
    }

    fn flags(&self, index: &ModelIndex) -> ItemFlags {
        let (source, source_index) = self.source_and_index(index);
        source.flags(&source_index)
    }

    fn has_children(&self, parent: &ModelIndex) -> bool {
        let (source, source_parent) = self.source_and_index(parent);
        if parent.is_valid() && !source_parent.is_valid() {
            return false;
        }
        if !source.has_children(&source_parent) {
            return false;
        }
        if source.can_fetch_more(&source_parent) {
            return true;
        }
        let mut state = self.state.lock();
        let id = state.create_mapping(&source_parent);
        state
            .cache
            .get(id)
            .is_some_and(|mapping| !mapping.source_rows.is_empty() && !mapping.source_columns.is_empty())
    }

    fn header_data(&self, section: usize, orientation: Orientation, role: ItemRole) -> ItemData {
        match self.header_source(section, orientation) {
            Some((source, source_section)) => source.header_data(source_section, orientation, role),
            None => ItemData::None,
        }
    }

    fn set_header_data(
        &self,
        section: usize,
        orientation: Orientation,
        value: ItemData,
        role: ItemRole,
    ) -> bool {
        self.header_source(section, orientation)
            .is_some_and(|(source, source_section)| {
                source.set_header_data(source_section, orientation, value, role)
            })
    }

    fn can_fetch_more(&self, parent: &ModelIndex) -> bool {
        let (source, source_parent) = self.source_and_index(parent);
        source.can_fetch_more(&source_parent)
    }

    fn fetch_more(&self, parent: &ModelIndex) {
        let (source, source_parent) = self.source_and_index(parent);
        source.fetch_more(&source_parent);
    }

    fn insert_rows(&self, row: usize, count: usize, parent: &ModelIndex) -> bool {
        self.insert_items(Orientation::Vertical, row, count, parent)
    }

    fn remove_rows(&self, row: usize, count: usize, parent: &ModelIndex) -> bool {
        self.remove_items(Orientation::Vertical, row, count, parent)
    }

    fn insert_columns(&self, column: usize, count: usize, parent: &ModelIndex) -> bool {
        self.insert_items(Orientation::Horizontal, column, count, parent)
    }

    fn remove_columns(&self, column: usize, count: usize, parent: &ModelIndex) -> bool {
        self.remove_items(Orientation::Horizontal, column, count, parent)
    }

    fn persistent_index(&self, index: &ModelIndex) -> PersistentModelIndex {
        self.persistent.track(index.clone())
    }

    fn sibling(&self, index: &ModelIndex, row: usize, column: usize) -> ModelIndex {
        let state = self.state.lock();
        let Some(id) = state.mapping_of(index) else {
            return ModelIndex::invalid();
        };
        match state.cache.get(id) {
            Some(mapping)
                if row < mapping.source_rows.len() && column < mapping.source_columns.len() =>
            {
                state.create_index(row, column, id)
            }
            _ => ModelIndex::invalid(),
        }
    }
}

impl<S: ItemModel> Drop for SortFilterProxyModel<S> {
    fn drop(&mut self) {
        if let Some(connections) = self.connections.get_mut().take() {
            connections.disconnect(self.state.get_mut().source.signals());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TableModel;

    fn table(values: &[&str]) -> Arc<TableModel> {
        Arc::new(TableModel::from_strings(values.iter().copied()))
    }

    fn column(proxy: &SortFilterProxyModel<TableModel>) -> Vec<String> {
        let root = ModelIndex::invalid();
        (0..proxy.row_count(&root))
            .map(|row| proxy.data(&proxy.index(row, 0, &root), ItemRole::Display).to_text())
            .collect()
    }

    #[test]
    fn test_passthrough_by_default() {
        let proxy = SortFilterProxyModel::new(table(&["c", "a", "b"]));
        assert_eq!(column(&proxy), ["c", "a", "b"]);
        assert_eq!(proxy.column_count(&ModelIndex::invalid()), 1);
    }

    #[test]
    fn test_sort_and_restore_source_order() {
        let proxy = SortFilterProxyModel::new(table(&["c", "a", "b"]));
        proxy.sort(Some(0), SortOrder::Ascending);
        assert_eq!(column(&proxy), ["a", "b", "c"]);
        proxy.sort(Some(0), SortOrder::Descending);
        assert_eq!(column(&proxy), ["c", "b", "a"]);
        proxy.sort(None, SortOrder::Ascending);
        assert_eq!(column(&proxy), ["c", "a", "b"]);
    }

    #[test]
    fn test_invalid_pattern_keeps_previous_filter() {
        let proxy = SortFilterProxyModel::new(table(&["apple", "banana"]));
        proxy.set_filter_fixed_string("an").unwrap();
        assert_eq!(column(&proxy), ["banana"]);
        assert!(proxy.set_filter_regular_expression("(").is_err());
        assert_eq!(proxy.filter_pattern().pattern(), "an");
        assert_eq!(column(&proxy), ["banana"]);
    }

    #[test]
    fn test_index_bounds() {
        let proxy = SortFilterProxyModel::new(table(&["a"]));
        let root = ModelIndex::invalid();
        assert!(proxy.index(0, 0, &root).is_valid());
        assert!(!proxy.index(1, 0, &root).is_valid());
        assert!(!proxy.index(0, 1, &root).is_valid());
        assert!(!proxy.sibling(&proxy.index(0, 0, &root), 1, 0).is_valid());
    }

    #[test]
    fn test_set_data_through_proxy() {
        let source = table(&["b", "a"]);
        let proxy = SortFilterProxyModel::new(source.clone());
        proxy.sort(Some(0), SortOrder::Ascending);
        let first = proxy.index(0, 0, &ModelIndex::invalid());
        assert!(proxy.set_data(&first, ItemData::from("c"), ItemRole::Display));
        assert_eq!(source.cell(1, 0).to_text(), "c");
        assert_eq!(column(&proxy), ["b", "c"]);
    }

    #[test]
    fn test_remove_rows_maps_sorted_positions() {
        let source = table(&["d", "a", "c", "b"]);
        let proxy = SortFilterProxyModel::new(source.clone());
        proxy.sort(Some(0), SortOrder::Ascending);
        // Proxy rows 1..=2 are "b" and "c", source rows 3 and 2.
        assert!(proxy.remove_rows(1, 2, &ModelIndex::invalid()));
        assert_eq!(source.row_count_value(), 2);
        assert_eq!(column(&proxy), ["a", "d"]);
    }

    #[test]
    fn test_insert_rows_appends_at_end() {
        let source = table(&["a", "b"]);
        let proxy = SortFilterProxyModel::new(source.clone());
        assert!(proxy.insert_rows(2, 1, &ModelIndex::invalid()));
        assert!(!proxy.insert_rows(5, 1, &ModelIndex::invalid()));
        assert_eq!(source.row_count_value(), 3);
        assert_eq!(proxy.row_count(&ModelIndex::invalid()), 3);
    }

    #[test]
    fn test_header_follows_column_filter() {
        let source = Arc::new(TableModel::new(3));
        source.set_headers(vec!["Name".into(), "Size".into(), "Kind".into()]);
        let proxy = SortFilterProxyModel::new(source);
        proxy.set_column_filter_fn(|_, column, _| column != 1);
        assert_eq!(
            proxy.header_data(1, Orientation::Horizontal, ItemRole::Display).to_text(),
            "Kind"
        );
        assert!(proxy.header_data(2, Orientation::Horizontal, ItemRole::Display).is_none());
    }

    #[test]
    fn test_drop_disconnects_from_source() {
        let source = table(&["a"]);
        let before = source.signals().rows_inserted.connection_count();
        let proxy = SortFilterProxyModel::new(source.clone());
        assert_eq!(source.signals().rows_inserted.connection_count(), before + 1);
        drop(proxy);
        assert_eq!(source.signals().rows_inserted.connection_count(), before);
        source.append_row(vec!["b".into()]);
    }

    #[test]
    fn test_set_source_model_resets() {
        let proxy = SortFilterProxyModel::new(table(&["a", "b"]));
        let resets = Arc::new(Mutex::new(0));
        let counter = resets.clone();
        proxy.signals().model_reset.connect(move |_| *counter.lock() += 1);

        let replacement = table(&["x", "y", "z"]);
        proxy.set_source_model(replacement.clone());
        proxy.set_source_model(replacement);
        assert_eq!(*resets.lock(), 1);
        assert_eq!(column(&proxy), ["x", "y", "z"]);
    }
}
