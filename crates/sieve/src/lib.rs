//! Sieve - incremental sort/filter proxies over hierarchical item models.
//!
//! A [`SortFilterProxyModel`](proxy::SortFilterProxyModel) sits between a
//! source [`ItemModel`](model::ItemModel) and its observers and presents a
//! filtered, sorted view. Source changes are translated into minimal proxy
//! notifications instead of full resets.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use sieve::model::{ItemModel, ModelIndex, TableModel};
//! use sieve::proxy::{CaseSensitivity, SortFilterProxyModel, SortOrder};
//!
//! let source = Arc::new(TableModel::from_strings(["Delta", "alpha", "Charlie", "bravo"]));
//! let proxy = SortFilterProxyModel::new(source);
//! proxy.set_sort_case_sensitivity(CaseSensitivity::Insensitive);
//! proxy.sort(Some(0), SortOrder::Ascending);
//!
//! let root = ModelIndex::invalid();
//! let first = proxy.index(0, 0, &root);
//! assert_eq!(proxy.display_text(&first).as_deref(), Some("alpha"));
//! assert_eq!(proxy.map_to_source(&first).row(), 1);
//! ```

pub mod error;
pub mod model;
pub mod proxy;

pub use error::{Error, Result};
pub use proxy::SortFilterProxyModel;
