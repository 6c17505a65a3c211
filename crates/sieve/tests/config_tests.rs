//! Tests for configuration, source replacement and contract-violation
//! diagnostics.

mod common;

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sieve::Error;
use sieve::model::{ItemData, ItemModel, ItemRole, LayoutChangeHint, ModelIndex, ModelSignals, TableModel};
use sieve::proxy::{
    CaseSensitivity, DiagnosticKind, FilterColumn, PatternSyntax, ProxyDiagnostic, SortFilterConfig,
    SortFilterProxyModel, SortOrder,
};

use common::{Event, Recorder, assert_consistent, init_tracing, root_texts};

fn root() -> ModelIndex {
    ModelIndex::invalid()
}

fn letters(values: &[&str]) -> Arc<TableModel> {
    Arc::new(TableModel::from_strings(values.iter().copied()))
}

/// A flat list whose notifications are sent by hand, so tests can make it
/// lie about its changes.
struct ScriptedList {
    items: RwLock<Vec<String>>,
    signals: ModelSignals,
}

impl ScriptedList {
    fn new(items: &[&str]) -> Self {
        Self {
            items: RwLock::new(items.iter().map(|item| item.to_string()).collect()),
            signals: ModelSignals::new(),
        }
    }
}

impl ItemModel for ScriptedList {
    fn row_count(&self, parent: &ModelIndex) -> usize {
        if parent.is_valid() { 0 } else { self.items.read().len() }
    }

    fn column_count(&self, _parent: &ModelIndex) -> usize {
        1
    }

    fn data(&self, index: &ModelIndex, role: ItemRole) -> ItemData {
        match (self.items.read().get(index.row()), role) {
            (Some(item), ItemRole::Display) if index.is_valid() => ItemData::from(item.as_str()),
            _ => ItemData::None,
        }
    }

    fn index(&self, row: usize, column: usize, parent: &ModelIndex) -> ModelIndex {
        if parent.is_valid() || row >= self.items.read().len() || column > 0 {
            ModelIndex::invalid()
        } else {
            ModelIndex::new(row, column, ModelIndex::invalid())
        }
    }

    fn parent(&self, _index: &ModelIndex) -> ModelIndex {
        ModelIndex::invalid()
    }

    fn signals(&self) -> &ModelSignals {
        &self.signals
    }
}

fn collect_diagnostics<S: ItemModel + 'static>(
    proxy: &SortFilterProxyModel<S>,
) -> Arc<Mutex<Vec<ProxyDiagnostic>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    proxy
        .diagnostics()
        .connect(move |diagnostic| sink.lock().push(diagnostic.clone()));
    seen
}

#[test]
fn test_apply_config_from_toml() {
    init_tracing();
    let source = letters(&["d", "a", "c", "b", "e"]);
    let proxy = SortFilterProxyModel::new(source);
    assert_eq!(proxy.row_count(&root()), 5);
    let recorder = Recorder::attach(&*proxy);

    let config = SortFilterConfig::from_toml_str(
        r#"
sort_column = 0
sort_order = "Descending"
filter_pattern = "^[a-c]"
"#,
    )
    .unwrap();
    proxy.apply_config(&config).unwrap();

    assert_eq!(
        recorder.take(),
        vec![
            Event::LayoutAboutToChange(Vec::new(), LayoutChangeHint::NoHint),
            Event::LayoutChanged(Vec::new(), LayoutChangeHint::NoHint),
        ]
    );
    assert_eq!(root_texts(&*proxy), ["c", "b", "a"]);
    assert_eq!(proxy.sort_column(), Some(0));
    assert_eq!(proxy.sort_order(), SortOrder::Descending);
    assert_eq!(proxy.config(), config);
    assert_consistent(&proxy);
}

#[test]
fn test_invalid_config_changes_nothing() {
    let source = letters(&["b", "a"]);
    let proxy = SortFilterProxyModel::new(source);
    let before = proxy.config();
    let recorder = Recorder::attach(&*proxy);

    let config = SortFilterConfig {
        sort_column: Some(0),
        filter_pattern: "(".into(),
        ..Default::default()
    };
    let err = proxy.apply_config(&config).unwrap_err();

    assert!(matches!(err, Error::InvalidPattern { .. }));
    assert_eq!(recorder.len(), 0);
    assert_eq!(proxy.config(), before);
    assert_eq!(root_texts(&*proxy), ["b", "a"]);
}

#[test]
fn test_config_reflects_setters() {
    let source = letters(&["x"]);
    let proxy = SortFilterProxyModel::new(source);
    proxy.sort(Some(0), SortOrder::Descending);
    proxy.set_filter_wildcard("x*").unwrap();
    proxy.set_filter_case_sensitivity(CaseSensitivity::Insensitive).unwrap();
    proxy.set_filter_key_column(FilterColumn::All);
    proxy.set_sort_role(ItemRole::Edit);
    proxy.set_recursive_filtering_enabled(true);

    let config = proxy.config();
    assert_eq!(config.sort_column, Some(0));
    assert_eq!(config.sort_order, SortOrder::Descending);
    assert_eq!(config.filter_pattern, "x*");
    assert_eq!(config.filter_syntax, PatternSyntax::Wildcard);
    assert_eq!(config.filter_case_sensitivity, CaseSensitivity::Insensitive);
    assert_eq!(config.filter_key_column, FilterColumn::All);
    assert_eq!(config.sort_role, ItemRole::Edit);
    assert!(config.recursive_filtering);
    assert!(config.dynamic_sort_filter);
}

#[test]
fn test_config_survives_toml_round_trip_between_proxies() {
    let source = letters(&["Pear", "apple", "Plum", "fig"]);
    let first = SortFilterProxyModel::new(source.clone());
    first.set_sort_case_sensitivity(CaseSensitivity::Insensitive);
    first.sort(Some(0), SortOrder::Ascending);
    first.set_filter_fixed_string("p").unwrap();
    first.set_filter_case_sensitivity(CaseSensitivity::Insensitive).unwrap();

    let text = first.config().to_toml_string().unwrap();
    let config = SortFilterConfig::from_toml_str(&text).unwrap();
    let second = SortFilterProxyModel::builder(source).config(config).build().unwrap();

    assert_eq!(root_texts(&*first), ["apple", "Pear", "Plum"]);
    assert_eq!(root_texts(&*second), root_texts(&*first));
}

#[test]
fn test_builder_rejects_invalid_pattern() {
    let config = SortFilterConfig {
        filter_pattern: "[".into(),
        ..Default::default()
    };
    let result = SortFilterProxyModel::builder(letters(&["a"])).config(config).build();
    assert!(matches!(result, Err(Error::InvalidPattern { .. })));
}

#[test]
fn test_builder_strategies() {
    let source = letters(&["ccc", "a", "bb", "dddd"]);
    let proxy = SortFilterProxyModel::builder(source)
        .filter_fn(|model: &TableModel, row, _parent: &ModelIndex| model.cell(row, 0).to_text().len() < 4)
        .less_than_fn(|model: &TableModel, left: &ModelIndex, right: &ModelIndex| {
            model.cell(left.row(), 0).to_text().len() > model.cell(right.row(), 0).to_text().len()
        })
        .config(SortFilterConfig {
            sort_column: Some(0),
            ..Default::default()
        })
        .build()
        .unwrap();

    assert_eq!(root_texts(&*proxy), ["ccc", "bb", "a"]);
}

#[test]
fn test_set_source_model_keeps_settings() {
    let first = letters(&["b", "a", "x"]);
    let proxy = SortFilterProxyModel::new(first.clone());
    proxy.set_filter_regular_expression("^[a-c]$").unwrap();
    proxy.sort(Some(0), SortOrder::Ascending);
    assert_eq!(root_texts(&*proxy), ["a", "b"]);
    let recorder = Recorder::attach(&*proxy);

    let second = letters(&["c", "y", "a"]);
    proxy.set_source_model(second.clone());

    assert_eq!(recorder.take(), vec![Event::ModelAboutToReset, Event::ModelReset]);
    assert_eq!(root_texts(&*proxy), ["a", "c"]);
    assert!(Arc::ptr_eq(&proxy.source_model(), &second));

    // The old source is no longer observed.
    first.append_row(vec![ItemData::from("b2")]);
    assert_eq!(recorder.len(), 0);
    second.append_row(vec![ItemData::from("b")]);
    assert_eq!(root_texts(&*proxy), ["a", "b", "c"]);
}

#[test]
fn test_insertion_past_end_is_reported() {
    init_tracing();
    let source = Arc::new(ScriptedList::new(&["a", "b", "c"]));
    let proxy = SortFilterProxyModel::new(source.clone());
    assert_eq!(proxy.row_count(&root()), 3);
    let handle = proxy.persistent_index(&proxy.index(1, 0, &root()));
    let diagnostics = collect_diagnostics(&proxy);

    source.signals.rows_inserted.emit((root(), 10, 10));

    let diagnostics = diagnostics.lock();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::InvalidInsertion);
    assert_eq!(diagnostics[0].source_parent, root());
    assert!(!handle.is_valid());
    assert_eq!(root_texts(&*proxy), ["a", "b", "c"]);
    assert_consistent(&proxy);
}

#[test]
fn test_inconsistent_removal_resets() {
    let source = Arc::new(ScriptedList::new(&["a", "b", "c"]));
    let proxy = SortFilterProxyModel::new(source.clone());
    assert_eq!(proxy.row_count(&root()), 3);
    let handle = proxy.persistent_index(&proxy.index(0, 0, &root()));
    let diagnostics = collect_diagnostics(&proxy);
    let recorder = Recorder::attach(&*proxy);

    // Claims row 1 is gone without announcing it or removing it.
    source.signals.rows_removed.emit((root(), 1, 1));

    assert_eq!(recorder.take(), vec![Event::ModelAboutToReset, Event::ModelReset]);
    let diagnostics = diagnostics.lock();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::InconsistentRemoval);
    assert!(!handle.is_valid());
    assert_eq!(root_texts(&*proxy), ["a", "b", "c"]);
}

#[test]
fn test_well_behaved_source_reports_nothing() {
    let source = letters(&["a", "b", "c"]);
    let proxy = SortFilterProxyModel::new(source.clone());
    proxy.sort(Some(0), SortOrder::Descending);
    assert_eq!(proxy.row_count(&root()), 3);
    let diagnostics = collect_diagnostics(&proxy);

    source.append_row(vec![ItemData::from("d")]);
    source.remove_row(0);
    source.set_cell(0, 0, ItemData::from("z"));
    source.move_rows(0, 1, 3);

    assert!(diagnostics.lock().is_empty());
    assert_eq!(root_texts(&*proxy), ["z", "d", "c"]);
}
