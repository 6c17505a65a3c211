//! The default sort comparison.
//!
//! [`is_item_data_less_than`] orders two cell values the way a sortable view
//! expects: numbers numerically, characters and chronological values
//! natively, and everything else by its text.

use std::cmp::Ordering;

use super::config::CaseSensitivity;
use crate::model::ItemData;

/// Returns `true` if `left` sorts before `right`.
///
/// - An empty `left` never sorts first; an empty `right` always sorts after
///   a non-empty `left`.
/// - Integers, unsigned integers and floats compare numerically with each
///   other. Characters, dates, times and date-times compare natively with
///   their own kind.
/// - Everything else compares by [`ItemData::to_text`], honouring `case` or,
///   when `locale_aware` is set, the system collation order.
/// - Values of different kinds order by kind: numbers, characters, dates,
///   times, date-times, then text. Mixing numeric and text ordering within
///   one column would otherwise make the order cyclic.
///
/// # Example
///
/// ```
/// use sieve::model::ItemData;
/// use sieve::proxy::{CaseSensitivity, is_item_data_less_than};
///
/// let cs = CaseSensitivity::Sensitive;
/// assert!(is_item_data_less_than(&ItemData::Int(2), &ItemData::Int(10), cs, false));
/// assert!(!is_item_data_less_than(&ItemData::from("2"), &ItemData::from("10"), cs, false));
/// assert!(is_item_data_less_than(&ItemData::from("a"), &ItemData::None, cs, false));
/// assert!(is_item_data_less_than(&ItemData::Int(10), &ItemData::from("1a"), cs, false));
/// ```
pub fn is_item_data_less_than(
    left: &ItemData,
    right: &ItemData,
    case: CaseSensitivity,
    locale_aware: bool,
) -> bool {
    if left.is_none() {
        return false;
    }
    if right.is_none() {
        return true;
    }
    let (left_kind, right_kind) = (kind_rank(left), kind_rank(right));
    if left_kind != right_kind {
        return left_kind < right_kind;
    }
    match native_order(left, right) {
        Some(ordering) => ordering == Ordering::Less,
        None => {
            let (left, right) = (left.to_text(), right.to_text());
            text_order(&left, &right, case, locale_aware) == Ordering::Less
        }
    }
}

/// Sort rank of a value's kind. Values of equal rank are comparable.
fn kind_rank(data: &ItemData) -> u8 {
    match data {
        ItemData::Int(_) | ItemData::UInt(_) | ItemData::Float(_) => 0,
        ItemData::Char(_) => 1,
        ItemData::Date(_) => 2,
        ItemData::Time(_) => 3,
        ItemData::DateTime(_) => 4,
        _ => 5,
    }
}

/// Orders values of the same comparable kind, `None` when text comparison
/// applies.
fn native_order(left: &ItemData, right: &ItemData) -> Option<Ordering> {
    use ItemData as D;
    match (left, right) {
        (D::Int(a), D::Int(b)) => Some(a.cmp(b)),
        (D::UInt(a), D::UInt(b)) => Some(a.cmp(b)),
        (D::Int(a), D::UInt(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
        (D::UInt(a), D::Int(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
        (D::Float(_), D::Int(_) | D::UInt(_) | D::Float(_))
        | (D::Int(_) | D::UInt(_), D::Float(_)) => {
            let (a, b) = (as_f64(left)?, as_f64(right)?);
            // NaN sorts after every number.
            Some(a.partial_cmp(&b).unwrap_or_else(|| a.is_nan().cmp(&b.is_nan())))
        }
        (D::Char(a), D::Char(b)) => Some(a.cmp(b)),
        (D::Date(a), D::Date(b)) => Some(a.cmp(b)),
        (D::Time(a), D::Time(b)) => Some(a.cmp(b)),
        (D::DateTime(a), D::DateTime(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn as_f64(data: &ItemData) -> Option<f64> {
    match data {
        ItemData::Int(n) => Some(*n as f64),
        ItemData::UInt(n) => Some(*n as f64),
        ItemData::Float(n) => Some(*n),
        _ => None,
    }
}

/// Compares two strings for sorting.
fn text_order(
    left: &str,
    right: &str,
    case: CaseSensitivity,
    locale_aware: bool,
) -> Ordering {
    if locale_aware {
        return locale_order(left, right);
    }
    match case {
        CaseSensitivity::Sensitive => left.cmp(right),
        CaseSensitivity::Insensitive => folded_order(left, right),
    }
}

fn folded_order(left: &str, right: &str) -> Ordering {
    left.chars()
        .flat_map(char::to_lowercase)
        .cmp(right.chars().flat_map(char::to_lowercase))
}

#[cfg(feature = "localization")]
fn locale_order(left: &str, right: &str) -> Ordering {
    use std::sync::OnceLock;

    use icu::collator::options::CollatorOptions;
    use icu::collator::{Collator, CollatorBorrowed};

    static COLLATOR: OnceLock<Option<CollatorBorrowed<'static>>> = OnceLock::new();
    let collator = COLLATOR.get_or_init(|| {
        let locale: icu::locale::Locale = sys_locale::get_locale()
            .and_then(|name| name.parse().ok())
            .or_else(|| "en-US".parse().ok())?;
        match Collator::try_new(locale.into(), CollatorOptions::default()) {
            Ok(collator) => Some(collator),
            Err(err) => {
                tracing::warn!(
                    target: sieve_core::logging::targets::SORT,
                    error = %err,
                    "no collation data, falling back to case-folded ordering"
                );
                None
            }
        }
    });
    match collator {
        Some(collator) => collator.compare(left, right),
        None => folded_order(left, right).then_with(|| left.cmp(right)),
    }
}

#[cfg(not(feature = "localization"))]
fn locale_order(left: &str, right: &str) -> Ordering {
    folded_order(left, right).then_with(|| left.cmp(right))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    const CS: CaseSensitivity = CaseSensitivity::Sensitive;
    const CI: CaseSensitivity = CaseSensitivity::Insensitive;

    fn lt(a: impl Into<ItemData>, b: impl Into<ItemData>) -> bool {
        is_item_data_less_than(&a.into(), &b.into(), CS, false)
    }

    #[test]
    fn test_empty_values_sort_last() {
        assert!(!is_item_data_less_than(&ItemData::None, &ItemData::from("a"), CS, false));
        assert!(is_item_data_less_than(&ItemData::from("a"), &ItemData::None, CS, false));
        assert!(!is_item_data_less_than(&ItemData::None, &ItemData::None, CS, false));
    }

    #[test]
    fn test_numeric_ordering() {
        assert!(lt(2i64, 10i64));
        assert!(!lt(10i64, 2i64));
        assert!(lt(-1i64, 0u64));
        assert!(lt(1.5f64, 2i64));
        assert!(lt(2u64, 2.5f64));
        assert!(!lt(3i64, 3i64));
    }

    #[test]
    fn test_nan_sorts_last() {
        assert!(!lt(f64::NAN, 1.0f64));
        assert!(lt(1.0f64, f64::NAN));
        assert!(!lt(f64::NAN, f64::NAN));
    }

    #[test]
    fn test_text_ordering() {
        assert!(lt("apple", "banana"));
        assert!(lt("10", "2"));
        assert!(lt("B", "a"));
    }

    #[test]
    fn test_case_insensitive_text() {
        let a = ItemData::from("B");
        let b = ItemData::from("a");
        assert!(!is_item_data_less_than(&a, &b, CI, false));
        assert!(is_item_data_less_than(&b, &a, CI, false));
        assert!(!is_item_data_less_than(&ItemData::from("x"), &ItemData::from("X"), CI, false));
    }

    #[test]
    fn test_chronological() {
        let earlier = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let later = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert!(lt(earlier, later));
        assert!(!lt(later, earlier));
    }

    #[test]
    fn test_non_native_kinds_compare_as_text() {
        assert!(lt(true, "z"));
        assert!(lt(ItemData::from("false"), true));
    }

    #[test]
    fn test_mixed_kinds_order_by_kind() {
        assert!(lt(ItemData::Int(50), ItemData::from("6")));
        assert!(!lt(ItemData::from("1a"), ItemData::Int(2)));
        assert!(lt('z', "a"));
        assert!(lt(f64::NAN, 'a'));
    }

    #[test]
    fn test_mixed_kinds_are_transitive() {
        let values = [
            ItemData::Int(2),
            ItemData::Int(10),
            ItemData::from("1a"),
            ItemData::Float(f64::NAN),
            ItemData::from("10"),
            ItemData::Char('c'),
            ItemData::UInt(7),
            ItemData::Bool(true),
        ];
        for a in &values {
            for b in &values {
                for c in &values {
                    let less = |x, y| is_item_data_less_than(x, y, CS, false);
                    if less(a, b) && less(b, c) {
                        assert!(less(a, c), "{a:?} < {b:?} < {c:?}");
                    }
                    assert!(!(less(a, b) && less(b, a)));
                }
            }
        }
    }

    #[cfg(not(feature = "localization"))]
    #[test]
    fn test_locale_fallback_folds_case_first() {
        let lower = ItemData::from("apple");
        let upper = ItemData::from("Banana");
        assert!(is_item_data_less_than(&lower, &upper, CS, true));
        assert!(is_item_data_less_than(&ItemData::from("A"), &ItemData::from("a"), CS, true));
    }
}
