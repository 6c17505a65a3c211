//! Item model vocabulary for Sieve.
//!
//! This module provides the types a source model implements and the proxy
//! re-exposes:
//!
//! - `ModelIndex`: Identifies an item's position in a model
//! - `ItemRole`: Specifies what type of data to access
//! - `ItemData`: Container for item data
//! - `ItemModel`: The trait that models implement
//! - `ModelSignals`: Signals for change notifications
//! - `PersistentModelIndex`: A reference that follows structural changes
//!
//! # Model Implementations
//!
//! - `TableModel`: 2D grid with rows and columns, supports headers
//! - `TreeModel`: Hierarchical tree structure with parent-child relationships
//!
//! # Example
//!
//! ```
//! use sieve::model::{ItemModel, ModelIndex, TableModel};
//!
//! let model = TableModel::from_strings(["Apple", "Banana"]);
//!
//! let root = ModelIndex::invalid();
//! let first_item = model.index(0, 0, &root);
//! assert_eq!(model.display_text(&first_item).as_deref(), Some("Apple"));
//!
//! model.signals().data_changed.connect(|(top_left, bottom_right, _roles)| {
//!     println!("Data changed from {:?} to {:?}", top_left, bottom_right);
//! });
//! ```

mod index;
mod persistent;
mod role;
mod table_model;
mod traits;
mod tree_model;

pub use index::ModelIndex;
pub use persistent::{PendingPersistentUpdate, PersistentIndexRegistry, PersistentModelIndex};
pub use role::{CheckState, ItemData, ItemRole};
pub use table_model::TableModel;
pub use traits::{
    ItemFlags, ItemModel, LayoutArgs, LayoutChangeHint, ModelSignals, MoveArgs, Orientation,
    RangeArgs,
};
pub use tree_model::{NodeId, TreeModel};
