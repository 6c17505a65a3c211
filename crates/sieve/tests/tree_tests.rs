//! Tests for proxies over hierarchical sources.

mod common;

use std::sync::Arc;

use sieve::model::{ItemData, ItemModel, ModelIndex, NodeId, TreeModel};
use sieve::proxy::{SortFilterProxyModel, SortOrder};

use common::{Event, Recorder, assert_consistent, init_tracing, root_texts, texts};

fn root() -> ModelIndex {
    ModelIndex::invalid()
}

fn cell(text: &str) -> Vec<ItemData> {
    vec![ItemData::from(text)]
}

struct Pantry {
    model: Arc<TreeModel>,
    fruits: NodeId,
    apple: NodeId,
    vegetables: NodeId,
    carrot: NodeId,
}

/// fruits { apple, banana }, vegetables { carrot }, nuts
fn pantry() -> Pantry {
    let model = Arc::new(TreeModel::new(1));
    let fruits = model.add_root(cell("fruits"));
    let apple = model.add_child(fruits, cell("apple")).unwrap();
    model.add_child(fruits, cell("banana")).unwrap();
    let vegetables = model.add_root(cell("vegetables"));
    let carrot = model.add_child(vegetables, cell("carrot")).unwrap();
    model.add_root(cell("nuts"));
    Pantry {
        model,
        fruits,
        apple,
        vegetables,
        carrot,
    }
}

/// Proxy index of the root row showing `text`.
fn find_root(proxy: &SortFilterProxyModel<TreeModel>, text: &str) -> ModelIndex {
    (0..proxy.row_count(&root()))
        .map(|row| proxy.index(row, 0, &root()))
        .find(|index| proxy.display_text(index).as_deref() == Some(text))
        .unwrap_or_else(ModelIndex::invalid)
}

#[test]
fn test_plain_filter_hides_whole_branches() {
    let pantry = pantry();
    let proxy = SortFilterProxyModel::new(pantry.model.clone());
    proxy.set_filter_regular_expression("an").unwrap();

    // Only root rows are tested; none of them contain "an".
    assert!(root_texts(&*proxy).is_empty());
}

#[test]
fn test_recursive_filter_keeps_ancestors_of_matches() {
    init_tracing();
    let pantry = pantry();
    let proxy = SortFilterProxyModel::new(pantry.model.clone());
    proxy.set_recursive_filtering_enabled(true);
    proxy.set_filter_regular_expression("an").unwrap();

    assert_eq!(root_texts(&*proxy), ["fruits"]);
    let fruits = proxy.index(0, 0, &root());
    assert_eq!(texts(&*proxy, &fruits), ["banana"]);
    assert!(proxy.has_children(&fruits));
    assert_eq!(proxy.parent(&proxy.index(0, 0, &fruits)), fruits);
    assert_consistent(&proxy);
}

#[test]
fn test_auto_accept_shows_children_of_matches() {
    let pantry = pantry();
    let proxy = SortFilterProxyModel::new(pantry.model.clone());
    proxy.set_auto_accept_child_rows(true);
    proxy.set_filter_regular_expression("^fruits$").unwrap();

    assert_eq!(root_texts(&*proxy), ["fruits"]);
    let fruits = proxy.index(0, 0, &root());
    assert_eq!(texts(&*proxy, &fruits), ["apple", "banana"]);
}

#[test]
fn test_recursive_insert_reveals_hidden_branch() {
    let pantry = pantry();
    let proxy = SortFilterProxyModel::new(pantry.model.clone());
    proxy.set_recursive_filtering_enabled(true);
    proxy.set_filter_regular_expression("an").unwrap();
    assert_eq!(root_texts(&*proxy), ["fruits"]);
    let recorder = Recorder::attach(&*proxy);

    let mango = pantry.model.add_child(pantry.vegetables, cell("mango")).unwrap();

    assert_eq!(
        recorder.take(),
        vec![
            Event::RowsAboutToBeInserted(root(), 1, 1),
            Event::RowsInserted(root(), 1, 1),
        ]
    );
    assert_eq!(root_texts(&*proxy), ["fruits", "vegetables"]);
    let vegetables = proxy.index(1, 0, &root());
    assert_eq!(texts(&*proxy, &vegetables), ["mango"]);

    pantry.model.remove(mango);

    assert_eq!(
        recorder.take(),
        vec![
            Event::RowsAboutToBeRemoved(vegetables.clone(), 0, 0),
            Event::RowsRemoved(vegetables, 0, 0),
            Event::RowsAboutToBeRemoved(root(), 1, 1),
            Event::RowsRemoved(root(), 1, 1),
        ]
    );
    assert_eq!(root_texts(&*proxy), ["fruits"]);
    assert_consistent(&proxy);
}

#[test]
fn test_recursive_data_change_reveals_ancestor() {
    let pantry = pantry();
    let proxy = SortFilterProxyModel::new(pantry.model.clone());
    proxy.set_recursive_filtering_enabled(true);
    proxy.set_filter_regular_expression("an").unwrap();
    assert_eq!(root_texts(&*proxy), ["fruits"]);

    pantry
        .model
        .set_value(pantry.carrot, 0, ItemData::from("banana split"));

    assert_eq!(root_texts(&*proxy), ["fruits", "vegetables"]);
    let vegetables = find_root(&proxy, "vegetables");
    assert_eq!(texts(&*proxy, &vegetables), ["banana split"]);

    pantry.model.set_value(pantry.carrot, 0, ItemData::from("carrot"));
    assert_eq!(root_texts(&*proxy), ["fruits"]);
    assert_consistent(&proxy);
}

#[test]
fn test_sort_applies_at_every_level() {
    let model = Arc::new(TreeModel::new(1));
    let b = model.add_root(cell("b"));
    model.add_child(b, cell("z")).unwrap();
    model.add_child(b, cell("y")).unwrap();
    model.add_root(cell("a"));
    let proxy = SortFilterProxyModel::new(model.clone());
    proxy.sort(Some(0), SortOrder::Ascending);

    assert_eq!(root_texts(&*proxy), ["a", "b"]);
    let b_proxy = proxy.index(1, 0, &root());
    assert_eq!(texts(&*proxy, &b_proxy), ["y", "z"]);

    let z = proxy.persistent_index(&proxy.index(1, 0, &b_proxy));
    proxy.sort(Some(0), SortOrder::Descending);
    assert_eq!(root_texts(&*proxy), ["b", "a"]);
    assert_eq!(z.row(), 0);
    assert_eq!(proxy.display_text(&z.index()).as_deref(), Some("z"));
    assert_eq!(proxy.parent(&z.index()), proxy.index(0, 0, &root()));
}

#[test]
fn test_child_mapping_follows_parent_row_shift() {
    let model = Arc::new(TreeModel::new(1));
    model.add_root(cell("r0"));
    let r1 = model.add_root(cell("r1"));
    model.add_child(r1, cell("r1-child")).unwrap();
    let proxy = SortFilterProxyModel::new(model.clone());

    let r1_proxy = proxy.index(1, 0, &root());
    let child = proxy.index(0, 0, &r1_proxy);
    assert_eq!(proxy.display_text(&child).as_deref(), Some("r1-child"));

    model.insert_children(None, 0, vec![cell("r-new")]);

    assert_eq!(root_texts(&*proxy), ["r-new", "r0", "r1"]);
    assert_eq!(proxy.display_text(&child).as_deref(), Some("r1-child"));
    assert_eq!(proxy.parent(&child).row(), 2);
    let source_child = model.index(0, 0, &model.index(2, 0, &root()));
    assert_eq!(proxy.map_to_source(&child), source_child);
    assert_consistent(&proxy);
}

#[test]
fn test_removing_parent_drops_child_mappings() {
    let pantry = pantry();
    let proxy = SortFilterProxyModel::new(pantry.model.clone());
    let fruits = proxy.index(0, 0, &root());
    assert_eq!(texts(&*proxy, &fruits), ["apple", "banana"]);
    assert_eq!(proxy.mapping_snapshot().len(), 2);
    let apple = proxy.persistent_index(&proxy.index(0, 0, &fruits));
    let recorder = Recorder::attach(&*proxy);

    pantry.model.remove(pantry.fruits);

    assert_eq!(
        recorder.take(),
        vec![
            Event::RowsAboutToBeRemoved(root(), 0, 0),
            Event::RowsRemoved(root(), 0, 0),
        ]
    );
    assert!(!apple.is_valid());
    assert_eq!(proxy.mapping_snapshot().len(), 1);
    assert_eq!(root_texts(&*proxy), ["vegetables", "nuts"]);
    assert_consistent(&proxy);
}

#[test]
fn test_source_move_keeps_persistent_indexes() {
    let pantry = pantry();
    let proxy = SortFilterProxyModel::new(pantry.model.clone());
    let fruits = proxy.persistent_index(&proxy.index(0, 0, &root()));
    let apple = proxy.persistent_index(&proxy.index(0, 0, &fruits.index()));
    let recorder = Recorder::attach(&*proxy);

    assert!(pantry.model.move_rows(None, 0, 1, None, 3));

    let events = recorder.take();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(Event::is_layout));
    assert_eq!(root_texts(&*proxy), ["vegetables", "nuts", "fruits"]);
    assert_eq!(fruits.row(), 2);
    assert_eq!(proxy.display_text(&apple.index()).as_deref(), Some("apple"));
    assert_eq!(proxy.parent(&apple.index()), fruits.index());
}

#[test]
fn test_move_under_hidden_parent_keeps_visible_indexes() {
    let model = Arc::new(TreeModel::new(1));
    let hidden = model.add_root(cell("hidden"));
    model.add_child(hidden, cell("a")).unwrap();
    model.add_child(hidden, cell("b")).unwrap();
    let shown = model.add_root(cell("shown"));
    let proxy = SortFilterProxyModel::new(model.clone());
    proxy.set_filter_fixed_string("shown").unwrap();
    assert_eq!(root_texts(&*proxy), ["shown"]);
    let index = proxy.index(0, 0, &root());
    let handle = proxy.persistent_index(&index);
    let snapshot = proxy.mapping_snapshot();
    let recorder = Recorder::attach(&*proxy);

    assert!(model.move_rows(Some(hidden), 0, 1, Some(hidden), 2));

    assert_eq!(recorder.len(), 0);
    assert_eq!(proxy.mapping_snapshot(), snapshot);
    let shown_source = model.index_of(shown, 0);
    assert!(handle.is_valid());
    assert_eq!(proxy.map_to_source(&handle.index()), shown_source);
    assert_eq!(proxy.map_to_source(&index), shown_source);
    assert_consistent(&proxy);
}

#[test]
fn test_move_between_parents() {
    let pantry = pantry();
    let proxy = SortFilterProxyModel::new(pantry.model.clone());
    let vegetables = proxy.index(1, 0, &root());
    assert_eq!(texts(&*proxy, &vegetables), ["carrot"]);

    // apple moves under vegetables, after carrot.
    assert!(pantry.model.move_rows(Some(pantry.fruits), 0, 1, Some(pantry.vegetables), 1));

    let fruits = proxy.index(0, 0, &root());
    let vegetables = proxy.index(1, 0, &root());
    assert_eq!(texts(&*proxy, &fruits), ["banana"]);
    assert_eq!(texts(&*proxy, &vegetables), ["carrot", "apple"]);
    let apple = proxy.map_from_source(&pantry.model.index_of(pantry.apple, 0));
    assert_eq!(proxy.parent(&apple), vegetables);
    assert_consistent(&proxy);
}

#[test]
fn test_clear_resets_proxy() {
    let pantry = pantry();
    let proxy = SortFilterProxyModel::new(pantry.model.clone());
    assert_eq!(proxy.row_count(&root()), 3);
    let recorder = Recorder::attach(&*proxy);

    pantry.model.clear();

    assert_eq!(recorder.take(), vec![Event::ModelAboutToReset, Event::ModelReset]);
    assert_eq!(proxy.row_count(&root()), 0);
    assert!(proxy.mapping_snapshot().iter().all(|snapshot| snapshot.source_rows.is_empty()));
}
