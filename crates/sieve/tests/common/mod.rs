//! Shared helpers for proxy integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use sieve::model::{ItemModel, LayoutChangeHint, ModelIndex, Orientation};
use sieve::proxy::SortFilterProxyModel;

/// A notification observed on a model, with proxy parents compared by
/// `(row, column, internal id)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    RowsAboutToBeInserted(ModelIndex, usize, usize),
    RowsInserted(ModelIndex, usize, usize),
    RowsAboutToBeRemoved(ModelIndex, usize, usize),
    RowsRemoved(ModelIndex, usize, usize),
    ColumnsAboutToBeInserted(ModelIndex, usize, usize),
    ColumnsInserted(ModelIndex, usize, usize),
    ColumnsAboutToBeRemoved(ModelIndex, usize, usize),
    ColumnsRemoved(ModelIndex, usize, usize),
    DataChanged(ModelIndex, ModelIndex),
    HeaderDataChanged(Orientation, usize, usize),
    LayoutAboutToChange(Vec<ModelIndex>, LayoutChangeHint),
    LayoutChanged(Vec<ModelIndex>, LayoutChangeHint),
    ModelAboutToReset,
    ModelReset,
}

impl Event {
    pub fn is_layout(&self) -> bool {
        matches!(self, Event::LayoutAboutToChange(..) | Event::LayoutChanged(..))
    }
}

/// Records every signal a model emits.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn attach(model: &impl ItemModel) -> Self {
        let recorder = Self::default();
        let signals = model.signals();

        macro_rules! record_range {
            ($signal:ident, $variant:ident) => {{
                let events = recorder.events.clone();
                signals.$signal.connect(move |(parent, first, last)| {
                    events.lock().push(Event::$variant(parent.clone(), *first, *last));
                });
            }};
        }

        record_range!(rows_about_to_be_inserted, RowsAboutToBeInserted);
        record_range!(rows_inserted, RowsInserted);
        record_range!(rows_about_to_be_removed, RowsAboutToBeRemoved);
        record_range!(rows_removed, RowsRemoved);
        record_range!(columns_about_to_be_inserted, ColumnsAboutToBeInserted);
        record_range!(columns_inserted, ColumnsInserted);
        record_range!(columns_about_to_be_removed, ColumnsAboutToBeRemoved);
        record_range!(columns_removed, ColumnsRemoved);

        let events = recorder.events.clone();
        signals.data_changed.connect(move |(top_left, bottom_right, _)| {
            events
                .lock()
                .push(Event::DataChanged(top_left.clone(), bottom_right.clone()));
        });
        let events = recorder.events.clone();
        signals.header_data_changed.connect(move |&(orientation, first, last)| {
            events
                .lock()
                .push(Event::HeaderDataChanged(orientation, first, last));
        });
        let events = recorder.events.clone();
        signals.layout_about_to_change.connect(move |(parents, hint)| {
            events
                .lock()
                .push(Event::LayoutAboutToChange(parents.clone(), *hint));
        });
        let events = recorder.events.clone();
        signals.layout_changed.connect(move |(parents, hint)| {
            events.lock().push(Event::LayoutChanged(parents.clone(), *hint));
        });
        let events = recorder.events.clone();
        signals
            .model_about_to_reset
            .connect(move |_| events.lock().push(Event::ModelAboutToReset));
        let events = recorder.events.clone();
        signals
            .model_reset
            .connect(move |_| events.lock().push(Event::ModelReset));

        recorder
    }

    /// Returns and clears the recorded events.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }
}

/// Display texts of column 0 under `parent`, in model order.
pub fn texts<M: ItemModel>(model: &M, parent: &ModelIndex) -> Vec<String> {
    (0..model.row_count(parent))
        .map(|row| model.display_text(&model.index(row, 0, parent)).unwrap_or_default())
        .collect()
}

/// Display texts of column 0 at the root.
pub fn root_texts<M: ItemModel>(model: &M) -> Vec<String> {
    texts(model, &ModelIndex::invalid())
}

/// Asserts every materialised mapping is an inverse permutation.
pub fn assert_consistent<S: ItemModel + 'static>(proxy: &SortFilterProxyModel<S>) {
    for snapshot in proxy.mapping_snapshot() {
        assert!(snapshot.is_consistent(), "inconsistent mapping: {snapshot:?}");
    }
}

/// Installs a test log subscriber once; set `RUST_LOG` to see proxy logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
