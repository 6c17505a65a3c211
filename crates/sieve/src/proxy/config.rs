//! Proxy settings and their TOML form.
//!
//! Every knob of [`SortFilterProxyModel`](super::SortFilterProxyModel) that
//! is plain data lives in [`SortFilterConfig`]. Strategies (custom filter and
//! comparison closures) are code and are set on the proxy directly.
//!
//! # Example
//!
//! ```
//! use sieve::proxy::{FilterColumn, PatternSyntax, SortFilterConfig, SortOrder};
//!
//! let config = SortFilterConfig::from_toml_str(r#"
//! sort_column = 1
//! sort_order = "Descending"
//! filter_pattern = "a*"
//! filter_syntax = "Wildcard"
//! "#).unwrap();
//!
//! assert_eq!(config.sort_column, Some(1));
//! assert_eq!(config.sort_order, SortOrder::Descending);
//! assert_eq!(config.filter_syntax, PatternSyntax::Wildcard);
//! assert_eq!(config.filter_key_column, FilterColumn::Column(0));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::ItemRole;

/// Direction of a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// Whether text comparison distinguishes letter case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CaseSensitivity {
    #[default]
    Sensitive,
    Insensitive,
}

/// How a filter pattern string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PatternSyntax {
    /// A `regex` crate regular expression.
    #[default]
    RegularExpression,
    /// Shell-style wildcards: `*`, `?` and `[...]`.
    Wildcard,
    /// A literal substring.
    FixedString,
}

/// The source column(s) the default row filter looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterColumn {
    /// A row passes if any of its columns matches.
    All,
    /// A row passes if this column matches. Columns past the end accept.
    Column(usize),
}

impl Default for FilterColumn {
    fn default() -> Self {
        FilterColumn::Column(0)
    }
}

/// Serializable proxy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortFilterConfig {
    /// Proxy column to sort by, `None` for source order.
    pub sort_column: Option<usize>,
    pub sort_order: SortOrder,
    pub sort_role: ItemRole,
    pub sort_case_sensitivity: CaseSensitivity,
    /// Compare text with the system collator (needs the `localization`
    /// feature for real collation).
    pub sort_locale_aware: bool,
    /// Empty accepts every row.
    pub filter_pattern: String,
    pub filter_syntax: PatternSyntax,
    pub filter_case_sensitivity: CaseSensitivity,
    pub filter_key_column: FilterColumn,
    pub filter_role: ItemRole,
    /// Re-filter and re-sort as the source changes.
    pub dynamic_sort_filter: bool,
    /// Accept rows with an accepted descendant.
    pub recursive_filtering: bool,
    /// Accept rows with an accepted ancestor.
    pub auto_accept_children: bool,
}

impl Default for SortFilterConfig {
    fn default() -> Self {
        Self {
            sort_column: None,
            sort_order: SortOrder::Ascending,
            sort_role: ItemRole::Display,
            sort_case_sensitivity: CaseSensitivity::Sensitive,
            sort_locale_aware: false,
            filter_pattern: String::new(),
            filter_syntax: PatternSyntax::RegularExpression,
            filter_case_sensitivity: CaseSensitivity::Sensitive,
            filter_key_column: FilterColumn::Column(0),
            filter_role: ItemRole::Display,
            dynamic_sort_filter: true,
            recursive_filtering: false,
            auto_accept_children: false,
        }
    }
}

impl SortFilterConfig {
    /// Parses a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Writes the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_defaults() {
        let config = SortFilterConfig::from_toml_str("").unwrap();
        assert_eq!(config, SortFilterConfig::default());
        assert!(config.dynamic_sort_filter);
        assert_eq!(config.filter_key_column, FilterColumn::Column(0));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = SortFilterConfig {
            sort_column: Some(2),
            sort_order: SortOrder::Descending,
            sort_role: ItemRole::User(4),
            filter_pattern: "^ab".into(),
            filter_key_column: FilterColumn::All,
            filter_case_sensitivity: CaseSensitivity::Insensitive,
            recursive_filtering: true,
            ..Default::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(SortFilterConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_parse_key_column() {
        let config = SortFilterConfig::from_toml_str(
            r#"
filter_key_column = { Column = 3 }
filter_case_sensitivity = "Insensitive"
"#,
        )
        .unwrap();
        assert_eq!(config.filter_key_column, FilterColumn::Column(3));
        assert_eq!(config.filter_case_sensitivity, CaseSensitivity::Insensitive);
    }

    #[test]
    fn test_malformed_toml() {
        let err = SortFilterConfig::from_toml_str("sort_order = 5").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
