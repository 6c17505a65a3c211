//! Change propagation.
//!
//! The proxy listens to every structural and data signal of its source and
//! replays each change in proxy coordinates. Handlers follow one rule: the
//! state lock is never held while a proxy signal is emitted, and the cache is
//! consistent every time it is released. Observers may therefore query the
//! proxy (and even change its settings) from inside any notification.

use std::collections::HashSet;
use std::sync::Arc;

use sieve_core::logging::targets;
use sieve_core::{ConnectionId, PerfSpan, Signal};

use super::SortFilterProxyModel;
use super::diagnostic::{DiagnosticKind, ProxyDiagnostic};
use super::intervals::{build_source_to_proxy, contiguous_runs, proxy_intervals_for_removal};
use super::mapping::MappingId;
use super::state::PendingRemoval;
use crate::model::{
    ItemModel, ItemRole, LayoutChangeHint, ModelIndex, ModelSignals, MoveArgs, Orientation,
    PersistentModelIndex, RangeArgs,
};

/// Which axes a filter change touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FilterDirection {
    Rows,
    Columns,
    All,
}

impl FilterDirection {
    fn rows(self) -> bool {
        matches!(self, FilterDirection::Rows | FilterDirection::All)
    }

    fn columns(self) -> bool {
        matches!(self, FilterDirection::Columns | FilterDirection::All)
    }
}

type PersistentPairs = Vec<(PersistentModelIndex, PersistentModelIndex)>;

/// The proxy's connections to its source model's signals.
#[derive(Debug)]
pub(crate) struct SourceConnections {
    data_changed: ConnectionId,
    header_data_changed: ConnectionId,
    rows_about_to_be_inserted: ConnectionId,
    rows_inserted: ConnectionId,
    rows_about_to_be_removed: ConnectionId,
    rows_removed: ConnectionId,
    rows_about_to_be_moved: ConnectionId,
    rows_moved: ConnectionId,
    columns_about_to_be_inserted: ConnectionId,
    columns_inserted: ConnectionId,
    columns_about_to_be_removed: ConnectionId,
    columns_removed: ConnectionId,
    columns_about_to_be_moved: ConnectionId,
    columns_moved: ConnectionId,
    layout_about_to_change: ConnectionId,
    layout_changed: ConnectionId,
    model_about_to_reset: ConnectionId,
    model_reset: ConnectionId,
}

impl SourceConnections {
    pub(crate) fn disconnect(self, signals: &ModelSignals) {
        signals.data_changed.disconnect(self.data_changed);
        signals.header_data_changed.disconnect(self.header_data_changed);
        signals.rows_about_to_be_inserted.disconnect(self.rows_about_to_be_inserted);
        signals.rows_inserted.disconnect(self.rows_inserted);
        signals.rows_about_to_be_removed.disconnect(self.rows_about_to_be_removed);
        signals.rows_removed.disconnect(self.rows_removed);
        signals.rows_about_to_be_moved.disconnect(self.rows_about_to_be_moved);
        signals.rows_moved.disconnect(self.rows_moved);
        signals.columns_about_to_be_inserted.disconnect(self.columns_about_to_be_inserted);
        signals.columns_inserted.disconnect(self.columns_inserted);
        signals.columns_about_to_be_removed.disconnect(self.columns_about_to_be_removed);
        signals.columns_removed.disconnect(self.columns_removed);
        signals.columns_about_to_be_moved.disconnect(self.columns_about_to_be_moved);
        signals.columns_moved.disconnect(self.columns_moved);
        signals.layout_about_to_change.disconnect(self.layout_about_to_change);
        signals.layout_changed.disconnect(self.layout_changed);
        signals.model_about_to_reset.disconnect(self.model_about_to_reset);
        signals.model_reset.disconnect(self.model_reset);
    }
}

fn move_parents((source_parent, _, _, destination_parent, _): &MoveArgs) -> Vec<ModelIndex> {
    if source_parent == destination_parent {
        vec![source_parent.clone()]
    } else {
        vec![source_parent.clone(), destination_parent.clone()]
    }
}

impl<S: ItemModel + 'static> SortFilterProxyModel<S> {
    // =========================================================================
    // Wiring
    // =========================================================================

    /// Connects a slot that forwards to `handler` while the proxy is alive.
    fn forward<A: 'static>(
        self: &Arc<Self>,
        signal: &Signal<A>,
        handler: impl Fn(&Self, &A) + Send + Sync + 'static,
    ) -> ConnectionId {
        let proxy = Arc::downgrade(self);
        signal.connect(move |args| {
            if let Some(proxy) = proxy.upgrade() {
                handler(&proxy, args);
            }
        })
    }

    pub(crate) fn connect_source(self: &Arc<Self>, signals: &ModelSignals) -> SourceConnections {
        SourceConnections {
            data_changed: self.forward(&signals.data_changed, |proxy, (top_left, bottom_right, roles)| {
                proxy.source_data_changed(top_left, bottom_right, roles)
            }),
            header_data_changed: self.forward(
                &signals.header_data_changed,
                |proxy, &(orientation, first, last)| {
                    proxy.source_header_data_changed(orientation, first, last)
                },
            ),
            rows_about_to_be_inserted: self.forward(
                &signals.rows_about_to_be_inserted,
                |proxy, (parent, _, _): &RangeArgs| proxy.source_rows_about_to_be_inserted(parent),
            ),
            rows_inserted: self.forward(&signals.rows_inserted, |proxy, (parent, first, last)| {
                proxy.source_rows_inserted(parent, *first, *last)
            }),
            rows_about_to_be_removed: self.forward(
                &signals.rows_about_to_be_removed,
                |proxy, (parent, first, last)| {
                    proxy.source_rows_about_to_be_removed(parent, *first, *last)
                },
            ),
            rows_removed: self.forward(&signals.rows_removed, |proxy, (parent, first, last)| {
                proxy.source_rows_removed(parent, *first, *last)
            }),
            rows_about_to_be_moved: self.forward(&signals.rows_about_to_be_moved, |proxy, args| {
                proxy.source_layout_about_to_change(&move_parents(args))
            }),
            rows_moved: self.forward(&signals.rows_moved, |proxy, args| {
                proxy.source_layout_changed(&move_parents(args))
            }),
            columns_about_to_be_inserted: self.forward(
                &signals.columns_about_to_be_inserted,
                |proxy, (parent, _, _): &RangeArgs| proxy.ensure_mapping(parent),
            ),
            columns_inserted: self.forward(&signals.columns_inserted, |proxy, (parent, first, last)| {
                proxy.source_columns_inserted(parent, *first, *last)
            }),
            columns_about_to_be_removed: self.forward(
                &signals.columns_about_to_be_removed,
                |proxy, (parent, first, last)| {
                    proxy.source_items_about_to_be_removed(parent, *first, *last, Orientation::Horizontal)
                },
            ),
            columns_removed: self.forward(&signals.columns_removed, |proxy, (parent, first, last)| {
                proxy.source_columns_removed(parent, *first, *last)
            }),
            columns_about_to_be_moved: self.forward(
                &signals.columns_about_to_be_moved,
                |proxy, args| proxy.source_layout_about_to_change(&move_parents(args)),
            ),
            columns_moved: self.forward(&signals.columns_moved, |proxy, args| {
                proxy.source_layout_changed(&move_parents(args))
            }),
            layout_about_to_change: self.forward(
                &signals.layout_about_to_change,
                |proxy, (parents, _)| proxy.source_layout_about_to_change(parents),
            ),
            layout_changed: self.forward(&signals.layout_changed, |proxy, (parents, _)| {
                proxy.source_layout_changed(parents)
            }),
            model_about_to_reset: self.forward(&signals.model_about_to_reset, |proxy, _| {
                proxy.signals.model_about_to_reset.emit(())
            }),
            model_reset: self.forward(&signals.model_reset, |proxy, _| proxy.source_reset()),
        }
    }

    // =========================================================================
    // Emission helpers
    // =========================================================================

    fn proxy_parent_of(&self, index: &ModelIndex) -> ModelIndex {
        self.state.lock().proxy_parent(index)
    }

    /// Removes `source_items` from mapping `id`, one proxy run at a time,
    /// highest run first.
    pub(crate) fn remove_source_items(
        &self,
        id: MappingId,
        orientation: Orientation,
        source_items: &[usize],
        emit: bool,
    ) {
        let (proxy_parent, intervals) = {
            let mut state = self.state.lock();
            let Some(source_parent) = state.cache.get(id).map(|m| m.source_parent.clone()) else {
                return;
            };
            let proxy_parent = state.source_to_proxy(&source_parent);
            let Some(mapping) = state.cache.get_mut(id) else {
                return;
            };
            let (source_to_proxy, proxy_to_source) = mapping.axis_mut(orientation);
            if !proxy_parent.is_valid() && source_parent.is_valid() {
                // The parent itself is hidden; nobody can see these items.
                proxy_to_source.clear();
                source_to_proxy.fill(None);
                return;
            }
            (proxy_parent, proxy_intervals_for_removal(source_to_proxy, source_items))
        };
        for &(start, end) in intervals.iter().rev() {
            self.remove_proxy_interval(id, orientation, start, end, &proxy_parent, emit);
        }
    }

    fn remove_proxy_interval(
        &self,
        id: MappingId,
        orientation: Orientation,
        start: usize,
        end: usize,
        proxy_parent: &ModelIndex,
        emit: bool,
    ) {
        let pending = emit.then(|| {
            self.signals
                .about_to_be_removed(orientation)
                .emit((proxy_parent.clone(), start, end));
            self.persistent
                .begin_remove(proxy_parent, orientation, start, end, &|index: &ModelIndex| {
                    self.proxy_parent_of(index)
                })
        });

        if let Some(mapping) = self.state.lock().cache.get_mut(id) {
            let (source_to_proxy, proxy_to_source) = mapping.axis_mut(orientation);
            if end < proxy_to_source.len() {
                for &source_item in &proxy_to_source[start..=end] {
                    source_to_proxy[source_item] = None;
                }
                proxy_to_source.drain(start..=end);
                build_source_to_proxy(proxy_to_source, source_to_proxy, start);
            }
            debug_assert!(mapping.is_consistent());
        }

        if let Some(pending) = pending {
            pending.apply();
            self.signals
                .removed(orientation)
                .emit((proxy_parent.clone(), start, end));
        }
    }

    /// Inserts the sorted `source_items` into mapping `id`, one proxy run at
    /// a time, front to back.
    pub(crate) fn insert_source_items(
        &self,
        id: MappingId,
        orientation: Orientation,
        source_items: Vec<usize>,
        emit: bool,
    ) {
        if source_items.is_empty() {
            return;
        }
        let (proxy_parent, intervals) = {
            let mut state = self.state.lock();
            let Some(source_parent) = state.cache.get(id).map(|m| m.source_parent.clone()) else {
                return;
            };
            let proxy_parent = state.source_to_proxy(&source_parent);
            if !proxy_parent.is_valid() && source_parent.is_valid() {
                return;
            }
            (proxy_parent, state.insertion_intervals(id, orientation, &source_items))
        };

        let mut offset = 0;
        for (position, items) in intervals {
            let start = position + offset;
            let count = items.len();
            let end = start + count - 1;
            let pending = emit.then(|| {
                self.signals
                    .about_to_be_inserted(orientation)
                    .emit((proxy_parent.clone(), start, end));
                self.persistent
                    .begin_insert(&proxy_parent, orientation, start, count, &|index: &ModelIndex| {
                        self.proxy_parent_of(index)
                    })
            });

            if let Some(mapping) = self.state.lock().cache.get_mut(id) {
                let (source_to_proxy, proxy_to_source) = mapping.axis_mut(orientation);
                let at = start.min(proxy_to_source.len());
                proxy_to_source.splice(at..at, items);
                build_source_to_proxy(proxy_to_source, source_to_proxy, at);
                debug_assert!(mapping.is_consistent());
            }

            if let Some(pending) = pending {
                pending.apply();
                self.signals
                    .inserted(orientation)
                    .emit((proxy_parent.clone(), start, end));
            }
            offset += count;
        }
    }

    /// Pairs every live persistent proxy index with a persistent index of
    /// its source item.
    pub(crate) fn store_persistent(&self) -> PersistentPairs {
        let handles = self.persistent.handles();
        if handles.is_empty() {
            return Vec::new();
        }
        let state = self.state.lock();
        handles
            .into_iter()
            .map(|handle| {
                let source_index = state.proxy_to_source(&handle.index());
                let source_handle = state.source.persistent_index(&source_index);
                (handle, source_handle)
            })
            .collect()
    }

    /// Points each stored proxy handle at the current position of its
    /// source item, or invalidates it.
    pub(crate) fn update_persistent(&self, saved: PersistentPairs) {
        if saved.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        for (proxy_handle, source_handle) in saved {
            let proxy_index = state.source_to_proxy(&source_handle.index());
            proxy_handle.set(proxy_index);
        }
    }

    /// Invalidates persistent indexes whose mapping no longer exists.
    fn drop_stale_persistent(&self) {
        let handles = self.persistent.handles();
        let state = self.state.lock();
        for handle in handles {
            if state.mapping_of(&handle.index()).is_none() {
                handle.set(ModelIndex::invalid());
            }
        }
    }

    /// Re-sorts every mapping inside one vertical-sort layout change.
    pub(crate) fn sort_all(&self) {
        let _perf = PerfSpan::new("SortFilterProxyModel::sort");
        self.signals
            .layout_about_to_change
            .emit((Vec::new(), LayoutChangeHint::VerticalSort));
        let saved = self.store_persistent();
        self.state.lock().sort_all_mappings();
        self.update_persistent(saved);
        self.signals
            .layout_changed
            .emit((Vec::new(), LayoutChangeHint::VerticalSort));
    }

    /// Drops every mapping, keeping persistent indexes attached to their
    /// source items.
    pub(crate) fn clear_mapping(&self) {
        let saved = self.store_persistent();
        self.state.lock().clear_mapping();
        self.update_persistent(saved);
    }

    fn report(&self, kind: DiagnosticKind, source_parent: &ModelIndex, message: String) {
        tracing::warn!(
            target: targets::PROXY,
            kind = %kind,
            parent_row = source_parent.row(),
            "source model contract violation: {message}"
        );
        self.diagnostics
            .emit(ProxyDiagnostic::new(kind, source_parent.clone(), message));
    }

    // =========================================================================
    // Insertion and removal
    // =========================================================================

    /// Builds the mapping for `source_parent` if its grandparent maps it.
    fn ensure_mapping(&self, source_parent: &ModelIndex) {
        let mut state = self.state.lock();
        if state.can_create_mapping(source_parent) {
            state.create_mapping(source_parent);
        }
    }

    fn source_items_inserted(
        &self,
        source_parent: &ModelIndex,
        start: usize,
        end: usize,
        orientation: Orientation,
    ) {
        if end < start {
            return;
        }
        let mut state = self.state.lock();

        let Some(id) = state.cache.find(source_parent) else {
            // First sight of this parent: everything it has is new.
            if !state.can_create_mapping(source_parent) {
                return;
            }
            let id = state.create_mapping(source_parent);
            let proxy_parent = state.source_to_proxy(source_parent);
            let Some(mapping) = state.cache.get(id) else {
                return;
            };
            let (rows, columns) = (mapping.source_rows.len(), mapping.source_columns.len());
            drop(state);
            if rows > 0 {
                self.signals
                    .rows_about_to_be_inserted
                    .emit((proxy_parent.clone(), 0, rows - 1));
                self.signals.rows_inserted.emit((proxy_parent.clone(), 0, rows - 1));
            }
            if columns > 0 {
                self.signals
                    .columns_about_to_be_inserted
                    .emit((proxy_parent.clone(), 0, columns - 1));
                self.signals.columns_inserted.emit((proxy_parent, 0, columns - 1));
            }
            return;
        };

        let delta = end - start + 1;
        state.update_children_mapping(id, orientation, start, end, false);

        let Some(mapping) = state.cache.get_mut(id) else {
            return;
        };
        let (source_to_proxy, proxy_to_source) = mapping.axis_mut(orientation);
        let old_len = source_to_proxy.len();
        if start > old_len {
            state.cache.remove(source_parent);
            drop(state);
            self.drop_stale_persistent();
            self.report(
                DiagnosticKind::InvalidInsertion,
                source_parent,
                format!("insertion at {start} is past the end of {old_len} items"),
            );
            return;
        }
        source_to_proxy.splice(start..start, std::iter::repeat_n(None, delta));
        if start < old_len {
            for source_item in proxy_to_source.iter_mut().filter(|item| **item >= start) {
                *source_item += delta;
            }
            build_source_to_proxy(proxy_to_source, source_to_proxy, 0);
        }

        let mut items: Vec<usize> = (start..=end)
            .filter(|&item| state.accepts(orientation, item, source_parent))
            .collect();

        // A parent that had no items along this axis had nothing to show
        // along the other axis either.
        let count = match orientation {
            Orientation::Vertical => state.source.row_count(source_parent),
            Orientation::Horizontal => state.source.column_count(source_parent),
        };
        if count == delta {
            let orthogonal = orientation.orthogonal();
            let orthogonal_count = match orthogonal {
                Orientation::Vertical => state.source.row_count(source_parent),
                Orientation::Horizontal => state.source.column_count(source_parent),
            };
            let needs_fill = state
                .cache
                .get(id)
                .is_some_and(|mapping| mapping.axis(orthogonal).0.is_empty());
            if needs_fill {
                let mut accepted: Vec<usize> = (0..orthogonal_count)
                    .filter(|&item| state.accepts(orthogonal, item, source_parent))
                    .collect();
                if orthogonal == Orientation::Vertical {
                    state.sort_source_rows(&mut accepted, source_parent);
                }
                if let Some(mapping) = state.cache.get_mut(id) {
                    let (source_to_proxy, proxy_to_source) = mapping.axis_mut(orthogonal);
                    *source_to_proxy = vec![None; orthogonal_count];
                    build_source_to_proxy(&accepted, source_to_proxy, 0);
                    *proxy_to_source = accepted;
                }
            }
        }

        if orientation == Orientation::Vertical {
            state.sort_source_rows(&mut items, source_parent);
        }
        drop(state);
        self.insert_source_items(id, orientation, items, true);
    }

    fn source_items_about_to_be_removed(
        &self,
        source_parent: &ModelIndex,
        start: usize,
        end: usize,
        orientation: Orientation,
    ) {
        let (id, items) = {
            let state = self.state.lock();
            let Some(id) = state.cache.find(source_parent) else {
                return;
            };
            let Some(mapping) = state.cache.get(id) else {
                return;
            };
            let items: Vec<usize> = mapping
                .axis(orientation)
                .1
                .iter()
                .copied()
                .filter(|item| (start..=end).contains(item))
                .collect();
            (id, items)
        };
        self.remove_source_items(id, orientation, &items, true);
    }

    fn source_items_removed(
        &self,
        source_parent: &ModelIndex,
        start: usize,
        end: usize,
        orientation: Orientation,
    ) {
        let mut state = self.state.lock();
        let Some(id) = state.cache.find(source_parent) else {
            return;
        };
        let Some(mapping) = state.cache.get_mut(id) else {
            return;
        };
        let (source_to_proxy, proxy_to_source) = mapping.axis_mut(orientation);
        let len = source_to_proxy.len();

        let problem = if start >= len || end < start {
            Some(format!("removal of {start}..={end} from {len} items"))
        } else {
            let end = end.min(len - 1);
            let removed = end - start + 1;
            if source_to_proxy[start..=end].iter().any(Option::is_some) {
                Some(format!("removed items {start}..={end} are still mapped"))
            } else if proxy_to_source.len() > len - removed {
                Some(format!(
                    "{} proxy items left for {} source items",
                    proxy_to_source.len(),
                    len - removed
                ))
            } else {
                None
            }
        };
        if let Some(message) = problem {
            drop(state);
            self.signals.model_about_to_reset.emit(());
            self.state.lock().cache.remove(source_parent);
            self.persistent.invalidate_all();
            self.signals.model_reset.emit(());
            self.report(DiagnosticKind::InconsistentRemoval, source_parent, message);
            return;
        }

        let end = end.min(len - 1);
        let delta = end - start + 1;
        source_to_proxy.drain(start..=end);
        for source_item in proxy_to_source.iter_mut().filter(|item| **item > end) {
            *source_item -= delta;
        }
        build_source_to_proxy(proxy_to_source, source_to_proxy, 0);
        debug_assert!(mapping.is_consistent());

        state.update_children_mapping(id, orientation, start, end, true);
    }

    // =========================================================================
    // Source signal handlers
    // =========================================================================

    fn source_rows_about_to_be_inserted(&self, source_parent: &ModelIndex) {
        let mut state = self.state.lock();
        let top_level = !source_parent.is_valid();
        let parent_accepted = !top_level && {
            let grandparent = state.source.parent(source_parent);
            state.accepts_row_internal(source_parent.row(), &grandparent)
        };
        if !state.recursive_filtering || top_level || parent_accepted {
            // Observers may query the proxy while it announces the insertion.
            if state.can_create_mapping(source_parent) {
                state.create_mapping(source_parent);
            }
            if state.recursive_filtering {
                state.complete_insert = true;
            }
        } else {
            // The new rows may make a hidden branch visible. Remember the
            // topmost hidden ancestor to re-evaluate afterwards.
            let mut top = source_parent.clone();
            let mut parent = state.source.parent(source_parent);
            while parent.is_valid() {
                let grandparent = state.source.parent(&parent);
                if state.accepts_row_internal(parent.row(), &grandparent) {
                    break;
                }
                top = parent;
                parent = grandparent;
            }
            state.last_top_source = Some(top);
        }
    }

    fn source_rows_inserted(&self, source_parent: &ModelIndex, start: usize, end: usize) {
        let (recursive, complete) = {
            let mut state = self.state.lock();
            let complete = std::mem::take(&mut state.complete_insert);
            (state.recursive_filtering, complete)
        };
        if !recursive || complete {
            self.source_items_inserted(source_parent, start, end, Orientation::Vertical);
            let resort = {
                let mut state = self.state.lock();
                state.update_source_sort_column() && state.dynamic_sort_filter
            };
            if resort {
                self.sort_all();
            }
            return;
        }

        let top = {
            let mut state = self.state.lock();
            let accepted = (start..=end).any(|row| state.accepts_row_internal(row, source_parent));
            let top = state.last_top_source.take();
            top.filter(|_| accepted)
        };
        if let Some(top) = top {
            self.source_data_changed(&top, &top, &[]);
        }
    }

    fn source_rows_about_to_be_removed(&self, source_parent: &ModelIndex, start: usize, end: usize) {
        self.state.lock().pending_removal = Some(PendingRemoval {
            parent: source_parent.clone(),
            start,
            end,
        });
        self.source_items_about_to_be_removed(source_parent, start, end, Orientation::Vertical);
    }

    fn source_rows_removed(&self, source_parent: &ModelIndex, start: usize, end: usize) {
        self.state.lock().pending_removal = None;
        self.source_items_removed(source_parent, start, end, Orientation::Vertical);

        // An ancestor kept visible only by the removed rows must go.
        let to_hide = {
            let state = self.state.lock();
            if !state.recursive_filtering {
                return;
            }
            let mut to_hide = None;
            let mut ancestor = source_parent.clone();
            while ancestor.is_valid() {
                let grandparent = state.source.parent(&ancestor);
                if state.accepts_row_internal(ancestor.row(), &grandparent) {
                    break;
                }
                to_hide = Some(ancestor);
                ancestor = grandparent;
            }
            to_hide
        };
        if let Some(to_hide) = to_hide {
            self.source_data_changed(&to_hide, &to_hide, &[]);
        }
    }

    fn source_columns_inserted(&self, source_parent: &ModelIndex, start: usize, end: usize) {
        self.source_items_inserted(source_parent, start, end, Orientation::Horizontal);
        if source_parent.is_valid() {
            // Only root columns drive sorting.
            return;
        }
        let resort = {
            let mut state = self.state.lock();
            let current = state.source_sort_column;
            match current {
                None => state.update_source_sort_column() && state.dynamic_sort_filter,
                Some(column) => {
                    let column = if start <= column { column + (end - start + 1) } else { column };
                    state.source_sort_column = Some(column);
                    state.proxy_sort_column = root_proxy_column(&mut *state, column);
                    false
                }
            }
        };
        if resort {
            self.sort_all();
        }
    }

    fn source_columns_removed(&self, source_parent: &ModelIndex, start: usize, end: usize) {
        self.source_items_removed(source_parent, start, end, Orientation::Horizontal);
        if source_parent.is_valid() {
            return;
        }
        let mut state = self.state.lock();
        let current = state.source_sort_column;
        let column = match current {
            Some(column) if start <= column && end < column => Some(column - (end - start + 1)),
            Some(column) if start <= column => None,
            other => other,
        };
        state.source_sort_column = column;
        state.proxy_sort_column = match column {
            Some(column) => root_proxy_column(&mut *state, column),
            None => None,
        };
    }

    fn source_header_data_changed(&self, orientation: Orientation, start: usize, end: usize) {
        let runs = {
            let mut state = self.state.lock();
            let root = state.create_mapping(&ModelIndex::invalid());
            let Some(mapping) = state.cache.get(root) else {
                return;
            };
            let (source_to_proxy, _) = mapping.axis(orientation);
            let mut positions: Vec<usize> = source_to_proxy
                .iter()
                .skip(start)
                .take(end.saturating_sub(start) + 1)
                .filter_map(|proxy| *proxy)
                .collect();
            positions.sort_unstable();
            contiguous_runs(&positions)
        };
        for (first, last) in runs {
            self.signals
                .header_data_changed
                .emit((orientation, first, last));
        }
    }

    pub(crate) fn source_data_changed(
        &self,
        top_left: &ModelIndex,
        bottom_right: &ModelIndex,
        roles: &[ItemRole],
    ) {
        if !top_left.is_valid() || !bottom_right.is_valid() {
            return;
        }
        let mut ranges = vec![(top_left.clone(), bottom_right.clone())];
        {
            let state = self.state.lock();
            if state.recursive_filtering && (roles.is_empty() || roles.contains(&state.filter_role)) {
                // An ancestor may now be shown or hidden because of this change.
                let mut ancestor = state.source.parent(top_left);
                while ancestor.is_valid() {
                    ranges.push((ancestor.clone(), ancestor.clone()));
                    ancestor = state.source.parent(&ancestor);
                }
            }
        }
        for (top_left, bottom_right) in ranges {
            self.handle_data_changed(&top_left, &bottom_right, roles);
        }
    }

    fn handle_data_changed(&self, top_left: &ModelIndex, bottom_right: &ModelIndex, roles: &[ItemRole]) {
        let mut to_remove = Vec::new();
        let mut to_insert = Vec::new();
        let mut to_resort = Vec::new();
        let mut to_change = Vec::new();

        let (id, source_parent) = {
            let mut state = self.state.lock();
            let source_parent = state.source.parent(top_left);
            let (id, newly_mapped) = match state.cache.find(&source_parent) {
                Some(id) => (id, false),
                None => match state.create_mapping_recursive(&source_parent) {
                    Some(id) => (id, true),
                    None => return,
                },
            };
            let Some(mapping) = state.cache.get(id) else {
                return;
            };
            let Some(last) = mapping.proxy_rows.len().checked_sub(1) else {
                return;
            };
            let last = bottom_right.row().min(last);
            let sort_key_changed = state
                .source_sort_column
                .is_some_and(|column| (top_left.column()..=bottom_right.column()).contains(&column));

            for row in top_left.row()..=last {
                let mapped = mapping.proxy_rows[row].is_some();
                if state.dynamic_sort_filter && !newly_mapped {
                    if mapped {
                        if !state.accepts_row_internal(row, &source_parent) {
                            to_remove.push(row);
                        } else if sort_key_changed {
                            to_resort.push(row);
                        } else {
                            to_change.push(row);
                        }
                    } else if !state.is_being_removed(&source_parent, row)
                        && state.accepts_row_internal(row, &source_parent)
                    {
                        to_insert.push(row);
                    }
                } else if mapped {
                    to_change.push(row);
                }
            }
            (id, source_parent)
        };

        if !to_remove.is_empty() {
            self.remove_source_items(id, Orientation::Vertical, &to_remove, true);
            let mut state = self.state.lock();
            let removed: HashSet<usize> = to_remove.iter().copied().collect();
            let hidden: Vec<ModelIndex> = state
                .cache
                .get(id)
                .map(|mapping| {
                    mapping
                        .mapped_children
                        .iter()
                        .filter(|child| removed.contains(&child.row()))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            for child in &hidden {
                state.cache.remove_subtree(child);
            }
            if let Some(mapping) = state.cache.get_mut(id) {
                mapping.mapped_children.retain(|child| !removed.contains(&child.row()));
            }
        }

        if !to_resort.is_empty() {
            let reorder = self.state.lock().needs_reorder(id, &to_resort);
            if reorder {
                let proxy_parent = self.state.lock().source_to_proxy(&source_parent);
                tracing::trace!(
                    target: targets::SORT,
                    rows = to_resort.len(),
                    "changed rows out of order, re-sorting"
                );
                self.signals
                    .layout_about_to_change
                    .emit((vec![proxy_parent.clone()], LayoutChangeHint::VerticalSort));
                let saved = self.store_persistent();
                self.remove_source_items(id, Orientation::Vertical, &to_resort, false);
                let mut resorted = to_resort.clone();
                self.state.lock().sort_source_rows(&mut resorted, &source_parent);
                self.insert_source_items(id, Orientation::Vertical, resorted, false);
                self.update_persistent(saved);
                self.signals
                    .layout_changed
                    .emit((vec![proxy_parent], LayoutChangeHint::VerticalSort));
            }
            to_change.extend(to_resort);
        }

        if !to_change.is_empty() {
            let changed = {
                let state = self.state.lock();
                state.cache.get(id).and_then(|mapping| {
                    let (first_row, last_row) =
                        super::intervals::proxy_item_range(&mapping.proxy_rows, &to_change)?;
                    let columns = &mapping.proxy_columns;
                    let mapped_column = |column: usize| columns.get(column).copied().flatten();
                    let mut left = top_left.column();
                    while left < bottom_right.column() && mapped_column(left).is_none() {
                        left += 1;
                    }
                    let mut right = bottom_right.column();
                    while right > top_left.column() && mapped_column(right).is_none() {
                        right -= 1;
                    }
                    let (left, right) = (mapped_column(left)?, mapped_column(right)?);
                    Some((
                        state.create_index(first_row, left, id),
                        state.create_index(last_row, right, id),
                    ))
                })
            };
            if let Some((proxy_top_left, proxy_bottom_right)) = changed {
                self.signals
                    .data_changed
                    .emit((proxy_top_left, proxy_bottom_right, roles.to_vec()));
            }
        }

        if !to_insert.is_empty() {
            self.state.lock().sort_source_rows(&mut to_insert, &source_parent);
            self.insert_source_items(id, Orientation::Vertical, to_insert, true);
        }
    }

    fn source_layout_about_to_change(&self, source_parents: &[ModelIndex]) {
        let proxy_parents = {
            let mut state = self.state.lock();
            state.saved_persistent.clear();
            let mut saved = Vec::new();
            for parent in source_parents {
                if !parent.is_valid() {
                    saved.push(PersistentModelIndex::detached(ModelIndex::invalid()));
                    continue;
                }
                let mapped = state.source_to_proxy(parent);
                if mapped.is_valid() {
                    saved.push(self.persistent.track(mapped));
                }
            }
            let proxy_parents: Vec<ModelIndex> = saved.iter().map(PersistentModelIndex::index).collect();
            state.saved_layout_parents = saved;
            if !source_parents.is_empty() && proxy_parents.is_empty() {
                // Every parent is filtered out.
                return;
            }
            proxy_parents
        };

        self.signals
            .layout_about_to_change
            .emit((proxy_parents, LayoutChangeHint::NoHint));
        let saved = self.store_persistent();
        self.state.lock().saved_persistent = saved;
    }

    fn source_layout_changed(&self, source_parents: &[ModelIndex]) {
        let (saved, layout_parents) = {
            let mut state = self.state.lock();
            let layout_parents = std::mem::take(&mut state.saved_layout_parents);
            if !source_parents.is_empty() && layout_parents.is_empty() {
                // Every parent is filtered out; nothing visible moved.
                tracing::trace!(target: targets::PROXY, "layout change under hidden parents ignored");
                return;
            }
            state.cache.clear();
            (std::mem::take(&mut state.saved_persistent), layout_parents)
        };
        self.update_persistent(saved);

        let proxy_parents = {
            let mut state = self.state.lock();
            if state.dynamic_sort_filter {
                state.source_sort_column = state.find_source_sort_column();
            }
            layout_parents
                .iter()
                .map(PersistentModelIndex::index)
                .collect::<Vec<_>>()
        };
        tracing::debug!(target: targets::PROXY, parents = proxy_parents.len(), "source layout changed");
        self.signals
            .layout_changed
            .emit((proxy_parents, LayoutChangeHint::NoHint));
    }

    fn source_reset(&self) {
        self.persistent.invalidate_all();
        self.clear_mapping();
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
    // Filter changes
    // =========================================================================

    /// Materialises the root mapping so a following filter change has
    /// something to diff against.
    pub(crate) fn filter_about_to_be_changed(&self) {
        let mut state = self.state.lock();
        if !state.filter.is_empty() && state.cache.find(&ModelIndex::invalid()).is_none() {
            state.create_mapping(&ModelIndex::invalid());
        }
    }

    /// Re-filters the mapping of `source_parent` and everything below it.
    pub(crate) fn filter_changed(&self, direction: FilterDirection, source_parent: &ModelIndex) {
        let _perf = (!source_parent.is_valid()).then(|| PerfSpan::new("SortFilterProxyModel::filter"));
        let Some(id) = self.state.lock().cache.find(source_parent) else {
            return;
        };

        let removed_rows = if direction.rows() {
            self.handle_filter_changed(id, Orientation::Vertical)
        } else {
            HashSet::new()
        };
        let removed_columns = if direction.columns() {
            self.handle_filter_changed(id, Orientation::Horizontal)
        } else {
            HashSet::new()
        };

        let children = match self.state.lock().cache.get(id) {
            Some(mapping) => mapping.mapped_children.clone(),
            None => return,
        };
        let mut dropped = Vec::new();
        for (position, child) in children.iter().enumerate() {
            if removed_rows.contains(&child.row()) || removed_columns.contains(&child.column()) {
                self.state.lock().cache.remove_subtree(child);
                dropped.push(position);
            } else {
                self.filter_changed(direction, child);
            }
        }
        if let Some(mapping) = self.state.lock().cache.get_mut(id) {
            for position in dropped.into_iter().rev() {
                if position < mapping.mapped_children.len() {
                    mapping.mapped_children.remove(position);
                }
            }
        }
    }

    /// Removes newly rejected and inserts newly accepted items along one
    /// axis. Returns the removed source items.
    fn handle_filter_changed(&self, id: MappingId, orientation: Orientation) -> HashSet<usize> {
        let (to_remove, mut to_insert, source_parent) = {
            let state = self.state.lock();
            let Some(mapping) = state.cache.get(id) else {
                return HashSet::new();
            };
            let parent = mapping.source_parent.clone();
            let (source_to_proxy, proxy_to_source) = mapping.axis(orientation);
            let to_remove: Vec<usize> = proxy_to_source
                .iter()
                .copied()
                .filter(|&item| !state.accepts(orientation, item, &parent))
                .collect();
            let to_insert: Vec<usize> = (0..source_to_proxy.len())
                .filter(|&item| source_to_proxy[item].is_none() && state.accepts(orientation, item, &parent))
                .collect();
            (to_remove, to_insert, parent)
        };
        tracing::trace!(
            target: targets::FILTER,
            ?orientation,
            removed = to_remove.len(),
            inserted = to_insert.len(),
            "filter re-evaluated"
        );

        if !to_remove.is_empty() || !to_insert.is_empty() {
            self.remove_source_items(id, orientation, &to_remove, true);
            if orientation == Orientation::Vertical {
                self.state.lock().sort_source_rows(&mut to_insert, &source_parent);
            }
            self.insert_source_items(id, orientation, to_insert, true);
        }
        to_remove.into_iter().collect()
    }
}

/// The proxy column showing `source_column` at the root.
fn root_proxy_column<S: ItemModel>(
    state: &mut super::state::ProxyState<S>,
    source_column: usize,
) -> Option<usize> {
    let root = state.create_mapping(&ModelIndex::invalid());
    state
        .cache
        .get(root)
        .and_then(|mapping| mapping.proxy_columns.get(source_column).copied().flatten())
}
