//! Data roles for item models.
//!
//! Roles define what type of data is being requested or set on a model item.
//! Each item can have multiple pieces of data associated with it, distinguished
//! by their role. The proxy sorts and filters on one configurable role each.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Standard roles for accessing different aspects of item data.
///
/// # Standard Roles
///
/// - **Display**: The primary text to show (e.g., item label)
/// - **Edit**: Value for editing (may differ from display text)
/// - **ToolTip**: Text shown when hovering over the item
/// - **StatusTip**: Text shown in the status bar
/// - **WhatsThis**: Extended help text
/// - **CheckState**: Checkbox state (unchecked, checked, partial)
/// - **User**: Application-specific data
///
/// # Example
///
/// ```
/// use sieve::model::ItemRole;
///
/// assert_eq!(ItemRole::Display.value(), 0);
/// assert_eq!(ItemRole::from_value(257), Some(ItemRole::User(1)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum ItemRole {
    /// Primary text to display.
    #[default]
    Display = 0,

    /// Value for editing (may be richer than display text).
    Edit = 2,

    /// Tooltip text shown on hover.
    ToolTip = 3,

    /// Text shown in status bar when item is selected.
    StatusTip = 4,

    /// Extended "What's This?" help text.
    WhatsThis = 5,

    /// Check state for checkable items. Should return `CheckState`.
    CheckState = 10,

    /// First role available for application-specific data.
    /// Use `ItemRole::User(n)` for custom roles where n >= 0.
    User(u32) = 256,
}

impl ItemRole {
    /// Returns `true` if this is a user-defined role.
    #[inline]
    pub fn is_user_role(&self) -> bool {
        matches!(self, ItemRole::User(_))
    }

    /// Returns the numeric value of this role.
    ///
    /// Standard roles have fixed values 0-255.
    /// User roles have values >= 256.
    pub fn value(&self) -> u32 {
        match self {
            ItemRole::Display => 0,
            ItemRole::Edit => 2,
            ItemRole::ToolTip => 3,
            ItemRole::StatusTip => 4,
            ItemRole::WhatsThis => 5,
            ItemRole::CheckState => 10,
            ItemRole::User(n) => 256 + n,
        }
    }

    /// Creates an ItemRole from a numeric value.
    ///
    /// Returns `None` for reserved but undefined role values.
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            0 => Some(ItemRole::Display),
            2 => Some(ItemRole::Edit),
            3 => Some(ItemRole::ToolTip),
            4 => Some(ItemRole::StatusTip),
            5 => Some(ItemRole::WhatsThis),
            10 => Some(ItemRole::CheckState),
            n @ 256.. => Some(ItemRole::User(n - 256)),
            _ => None,
        }
    }
}

/// Check state for checkable items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CheckState {
    /// Item is unchecked.
    #[default]
    Unchecked,
    /// Item is partially checked (for tri-state checkboxes).
    PartiallyChecked,
    /// Item is checked.
    Checked,
}

impl CheckState {
    /// Returns `true` if the item is checked (fully or partially).
    pub fn is_checked(&self) -> bool {
        !matches!(self, CheckState::Unchecked)
    }

    /// Toggles between Unchecked and Checked.
    /// PartiallyChecked becomes Unchecked.
    pub fn toggle(&self) -> CheckState {
        match self {
            CheckState::Unchecked => CheckState::Checked,
            CheckState::PartiallyChecked | CheckState::Checked => CheckState::Unchecked,
        }
    }

    fn as_number(&self) -> u8 {
        match self {
            CheckState::Unchecked => 0,
            CheckState::PartiallyChecked => 1,
            CheckState::Checked => 2,
        }
    }
}

/// Type-erased container for item data.
///
/// `ItemData` can hold any type of data associated with an item role.
/// It provides type-safe access through the `as_*` methods and the
/// generic `downcast` method. The sort comparator orders values by variant
/// (numeric, character, chronological) and falls back to [`ItemData::to_text`].
///
/// # Example
///
/// ```
/// use sieve::model::ItemData;
///
/// let data = ItemData::from("Hello");
/// assert_eq!(data.as_string(), Some("Hello"));
///
/// let data = ItemData::new(42u32);
/// assert_eq!(data.downcast::<u32>(), Some(&42));
/// ```
#[derive(Debug, Default)]
pub enum ItemData {
    /// No data.
    #[default]
    None,
    /// String data (for Display, ToolTip, etc.).
    String(String),
    /// Signed integer data.
    Int(i64),
    /// Unsigned integer data.
    UInt(u64),
    /// Floating point data.
    Float(f64),
    /// Boolean data.
    Bool(bool),
    /// A single character.
    Char(char),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day.
    Time(NaiveTime),
    /// Date and time.
    DateTime(NaiveDateTime),
    /// Check state data.
    CheckState(CheckState),
    /// Custom data (type-erased).
    Custom(Box<dyn std::any::Any + Send + Sync>),
}

impl Clone for ItemData {
    fn clone(&self) -> Self {
        match self {
            ItemData::None => ItemData::None,
            ItemData::String(s) => ItemData::String(s.clone()),
            ItemData::Int(n) => ItemData::Int(*n),
            ItemData::UInt(n) => ItemData::UInt(*n),
            ItemData::Float(n) => ItemData::Float(*n),
            ItemData::Bool(b) => ItemData::Bool(*b),
            ItemData::Char(c) => ItemData::Char(*c),
            ItemData::Date(d) => ItemData::Date(*d),
            ItemData::Time(t) => ItemData::Time(*t),
            ItemData::DateTime(dt) => ItemData::DateTime(*dt),
            ItemData::CheckState(s) => ItemData::CheckState(*s),
            // Custom data cannot be cloned; becomes None
            ItemData::Custom(_) => ItemData::None,
        }
    }
}

impl PartialEq for ItemData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ItemData::None, ItemData::None) => true,
            (ItemData::String(a), ItemData::String(b)) => a == b,
            (ItemData::Int(a), ItemData::Int(b)) => a == b,
            (ItemData::UInt(a), ItemData::UInt(b)) => a == b,
            (ItemData::Float(a), ItemData::Float(b)) => a == b,
            (ItemData::Bool(a), ItemData::Bool(b)) => a == b,
            (ItemData::Char(a), ItemData::Char(b)) => a == b,
            (ItemData::Date(a), ItemData::Date(b)) => a == b,
            (ItemData::Time(a), ItemData::Time(b)) => a == b,
            (ItemData::DateTime(a), ItemData::DateTime(b)) => a == b,
            (ItemData::CheckState(a), ItemData::CheckState(b)) => a == b,
            _ => false,
        }
    }
}

impl ItemData {
    /// Creates new custom data from any type.
    pub fn new<T: std::any::Any + Send + Sync + 'static>(value: T) -> Self {
        ItemData::Custom(Box::new(value))
    }

    /// Returns `true` if this is `ItemData::None`.
    pub fn is_none(&self) -> bool {
        matches!(self, ItemData::None)
    }

    /// Returns `true` if this contains some data.
    pub fn is_some(&self) -> bool {
        !self.is_none()
    }

    /// Attempts to get the data as a string slice.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ItemData::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Attempts to get the data as an owned string.
    pub fn into_string(self) -> Option<String> {
        match self {
            ItemData::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to get the data as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ItemData::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to get the data as a float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ItemData::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to get the data as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ItemData::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to get the data as check state.
    pub fn as_check_state(&self) -> Option<CheckState> {
        match self {
            ItemData::CheckState(s) => Some(*s),
            _ => None,
        }
    }

    /// Renders the value as text.
    ///
    /// Dates and times use ISO 8601 forms. `None` and custom data render
    /// as an empty string.
    pub fn to_text(&self) -> String {
        match self {
            ItemData::None | ItemData::Custom(_) => String::new(),
            ItemData::String(s) => s.clone(),
            ItemData::Int(n) => n.to_string(),
            ItemData::UInt(n) => n.to_string(),
            ItemData::Float(n) => n.to_string(),
            ItemData::Bool(b) => b.to_string(),
            ItemData::Char(c) => c.to_string(),
            ItemData::Date(d) => d.format("%Y-%m-%d").to_string(),
            ItemData::Time(t) => t.format("%H:%M:%S").to_string(),
            ItemData::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
            ItemData::CheckState(s) => s.as_number().to_string(),
        }
    }

    /// Attempts to downcast custom data to the specified type.
    pub fn downcast<T: std::any::Any>(&self) -> Option<&T> {
        match self {
            ItemData::Custom(data) => data.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl From<String> for ItemData {
    fn from(s: String) -> Self {
        ItemData::String(s)
    }
}

impl From<&str> for ItemData {
    fn from(s: &str) -> Self {
        ItemData::String(s.to_string())
    }
}

impl From<i64> for ItemData {
    fn from(n: i64) -> Self {
        ItemData::Int(n)
    }
}

impl From<i32> for ItemData {
    fn from(n: i32) -> Self {
        ItemData::Int(n as i64)
    }
}

impl From<u64> for ItemData {
    fn from(n: u64) -> Self {
        ItemData::UInt(n)
    }
}

impl From<u32> for ItemData {
    fn from(n: u32) -> Self {
        ItemData::UInt(n as u64)
    }
}

impl From<f64> for ItemData {
    fn from(n: f64) -> Self {
        ItemData::Float(n)
    }
}

impl From<bool> for ItemData {
    fn from(b: bool) -> Self {
        ItemData::Bool(b)
    }
}

impl From<char> for ItemData {
    fn from(c: char) -> Self {
        ItemData::Char(c)
    }
}

impl From<NaiveDate> for ItemData {
    fn from(d: NaiveDate) -> Self {
        ItemData::Date(d)
    }
}

impl From<NaiveTime> for ItemData {
    fn from(t: NaiveTime) -> Self {
        ItemData::Time(t)
    }
}

impl From<NaiveDateTime> for ItemData {
    fn from(dt: NaiveDateTime) -> Self {
        ItemData::DateTime(dt)
    }
}

impl From<CheckState> for ItemData {
    fn from(s: CheckState) -> Self {
        ItemData::CheckState(s)
    }
}

impl From<Option<String>> for ItemData {
    fn from(opt: Option<String>) -> Self {
        match opt {
            Some(s) => ItemData::String(s),
            None => ItemData::None,
        }
    }
}
