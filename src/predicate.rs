//! Pure comparison operators applied while filtering sorted streams.
//!
//! Doubles compare with a fixed epsilon tolerance rather than bit equality,
//! and longs bridge into the double comparison when the two sides disagree
//! on type. These semantics leak into attribute predicates at value
//! boundaries, so the constant and the bridging direction are fixed.

use std::cmp::Ordering;

use regex::Regex;

use crate::encoding::Value;

/// Tolerance below which two doubles compare equal.
pub const DOUBLE_PRECISION: f64 = 1e-16;

/// Compares two booleans (`false < true`).
pub fn compare_booleans(first: bool, second: bool) -> Ordering {
    first.cmp(&second)
}

/// Compares two longs.
pub fn compare_longs(first: i64, second: i64) -> Ordering {
    first.cmp(&second)
}

/// Compares two doubles with epsilon equality. Inputs are assumed non-NaN;
/// the key encoding rejects NaN before values reach predicates.
pub fn compare_doubles(first: f64, second: f64) -> Ordering {
    if (first - second).abs() < DOUBLE_PRECISION {
        return Ordering::Equal;
    }
    first.partial_cmp(&second).unwrap_or(Ordering::Equal)
}

/// Compares a long against a double through the epsilon comparison.
pub fn compare_long_to_double(first: i64, second: f64) -> Ordering {
    compare_doubles(first as f64, second)
}

/// Compares a double against a long through the epsilon comparison.
pub fn compare_double_to_long(first: f64, second: i64) -> Ordering {
    compare_doubles(first, second as f64)
}

/// Compares two epoch-millisecond datetimes.
pub fn compare_datetimes(first: i64, second: i64) -> Ordering {
    first.cmp(&second)
}

/// Compares two strings lexicographically.
pub fn compare_strings(first: &str, second: &str) -> Ordering {
    first.cmp(second)
}

/// Case-insensitive containment; an empty needle always matches.
pub fn string_contains(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Compiles a `like` pattern into its full-match form.
pub fn like_pattern(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(&format!("\\A(?:{pattern})\\z"))
}

/// Full-match regex semantics over a pattern compiled with [`like_pattern`].
pub fn string_like(pattern: &Regex, value: &str) -> bool {
    pattern.is_match(value)
}

/// A comparison operator applied to a pair of [`Value`]s.
#[derive(Clone, Debug)]
pub enum PredicateOp {
    /// Equal.
    Eq,
    /// Not equal.
    Neq,
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Case-insensitive substring containment (strings only).
    Contains,
    /// Full regex match (strings only).
    Like(Regex),
}

impl PredicateOp {
    /// Applies this operator to `lhs` against `rhs`. Longs and doubles
    /// bridge through the epsilon comparison; any other cross-type pair is
    /// simply not a match.
    pub fn apply(&self, lhs: &Value, rhs: &Value) -> bool {
        match self {
            PredicateOp::Contains => match (lhs, rhs) {
                (Value::String(hay), Value::String(needle)) => string_contains(hay, needle),
                _ => false,
            },
            PredicateOp::Like(pattern) => match lhs {
                Value::String(s) => string_like(pattern, s),
                _ => false,
            },
            op => match compare_values(lhs, rhs) {
                Some(ordering) => match op {
                    PredicateOp::Eq => ordering == Ordering::Equal,
                    PredicateOp::Neq => ordering != Ordering::Equal,
                    PredicateOp::Lt => ordering == Ordering::Less,
                    PredicateOp::Le => ordering != Ordering::Greater,
                    PredicateOp::Gt => ordering == Ordering::Greater,
                    PredicateOp::Ge => ordering != Ordering::Less,
                    PredicateOp::Contains | PredicateOp::Like(_) => false,
                },
                None => false,
            },
        }
    }
}

/// Compares two values of comparable types, bridging longs and doubles.
/// Returns `None` for incomparable pairs.
pub fn compare_values(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Boolean(a), Value::Boolean(b)) => Some(compare_booleans(*a, *b)),
        (Value::Long(a), Value::Long(b)) => Some(compare_longs(*a, *b)),
        (Value::Double(a), Value::Double(b)) => Some(compare_doubles(*a, *b)),
        (Value::Long(a), Value::Double(b)) => Some(compare_long_to_double(*a, *b)),
        (Value::Double(a), Value::Long(b)) => Some(compare_double_to_long(*a, *b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(compare_datetimes(*a, *b)),
        (Value::String(a), Value::String(b)) => Some(compare_strings(a, b)),
        _ => None,
    }
}
