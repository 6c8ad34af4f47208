use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data_type::DataType;
use crate::error::{DbError, Result};

/// Represents a single data value stored in the database.
///
/// This enum wraps all supported domains into a single type that can be
/// passed around the engine. It includes support for SQL `NULL` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Represents an empty or missing value.
    Null,
    /// A 64-bit signed integer value.
    Int(i64),
    /// A 64-bit floating-point value.
    Real(f64),
    /// A UTF-8 string value, wrapped in an [Arc] for efficient,
    /// thread-safe sharing and cheap cloning.
    Text(Arc<str>),
    /// A boolean value.
    Bool(bool),
    /// A calendar date without a time component.
    Date(NaiveDate),
}

impl Value {
    /// Returns `true` if the value is [Value::Null].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the inner integer value if this is a [Value::Int].
    /// Otherwise, returns `None`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the inner float value if this is a [Value::Real].
    /// Otherwise, returns `None`.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns a reference to the inner string slice if this is a [Value::Text].
    /// Otherwise, returns `None`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the inner boolean value if this is a [Value::Bool].
    /// Otherwise, returns `None`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the inner date if this is a [Value::Date].
    /// Otherwise, returns `None`.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the logical [DataType] corresponding to this value.
    ///
    /// Returns `None` if the value is [Value::Null], because a standalone
    /// NULL value is untyped until it is placed in a column.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Null => None,
            Self::Int(_) => Some(DataType::Integer),
            Self::Real(_) => Some(DataType::Real),
            Self::Text(_) => Some(DataType::Text),
            Self::Bool(_) => Some(DataType::Boolean),
            Self::Date(_) => Some(DataType::Date),
        }
    }

    /// Coerces this value into the given column type.
    ///
    /// The accepted widenings beyond an exact tag match:
    /// - an integer literal into a REAL column,
    /// - a string literal in `YYYY-MM-DD` form into a DATE column,
    /// - the strings `TRUE`/`FALSE` (case-insensitive) into a BOOLEAN column.
    ///
    /// NULL passes through untouched for any target; nullability is the
    /// storage engine's concern, not a typing one.
    ///
    /// # Errors
    /// Returns [DbError::Type] when no coercion applies.
    pub fn coerce(self, target: DataType) -> Result<Value> {
        match (self, target) {
            (Self::Null, _) => Ok(Self::Null),
            (Self::Int(i), DataType::Integer) => Ok(Self::Int(i)),
            (Self::Int(i), DataType::Real) => Ok(Self::Real(i as f64)),
            (Self::Real(f), DataType::Real) => Ok(Self::Real(f)),
            (Self::Text(s), DataType::Text) => Ok(Self::Text(s)),
            (Self::Text(s), DataType::Boolean) if s.eq_ignore_ascii_case("true") => {
                Ok(Self::Bool(true))
            }
            (Self::Text(s), DataType::Boolean) if s.eq_ignore_ascii_case("false") => {
                Ok(Self::Bool(false))
            }
            (Self::Text(s), DataType::Date) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map(Self::Date)
                .map_err(|_| DbError::Type(format!("{s:?} is not a date in YYYY-MM-DD form"))),
            (Self::Bool(b), DataType::Boolean) => Ok(Self::Bool(b)),
            (Self::Date(d), DataType::Date) => Ok(Self::Date(d)),
            (value, target) => Err(DbError::Type(format!(
                "value {value:?} cannot be stored in a {target} column"
            ))),
        }
    }

    /// Compares two non-null values of the same domain.
    ///
    /// # Errors
    /// Returns [DbError::Type] for cross-domain pairs. Null operands are
    /// the caller's concern; predicates treat them as never-matching before
    /// reaching this point.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Self::Int(l), Self::Int(r)) => Ok(l.cmp(r)),
            (Self::Real(l), Self::Real(r)) => Ok(l.total_cmp(r)),
            (Self::Text(l), Self::Text(r)) => Ok(l.cmp(r)),
            (Self::Bool(l), Self::Bool(r)) => Ok(l.cmp(r)),
            (Self::Date(l), Self::Date(r)) => Ok(l.cmp(r)),
            (l, r) => Err(DbError::Type(format!("cannot compare {l:?} with {r:?}"))),
        }
    }

    /// Total ordering over all values, used for sorting result rows and
    /// group keys. Null sorts first; values of different domains are ranked
    /// by domain tag so sorting never fails.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Int(l), Self::Int(r)) => l.cmp(r),
            (Self::Real(l), Self::Real(r)) => l.total_cmp(r),
            (Self::Text(l), Self::Text(r)) => l.cmp(r),
            (Self::Bool(l), Self::Bool(r)) => l.cmp(r),
            (Self::Date(l), Self::Date(r)) => l.cmp(r),
            (l, r) => l.domain_rank().cmp(&r.domain_rank()),
        }
    }

    fn domain_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Int(_) => 1,
            Self::Real(_) => 2,
            Self::Text(_) => 3,
            Self::Bool(_) => 4,
            Self::Date(_) => 5,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Self::Date(d) => write!(f, "{d}"),
        }
    }
}

/// SQL `LIKE` pattern matching: `%` matches any span of characters and
/// `_` matches exactly one. Matching is case-sensitive.
///
/// # Example
/// ```
/// # use memql::value::like_match;
/// assert!(like_match("Alicia", "Ali%"));
/// assert!(like_match("Bob", "B_b"));
/// assert!(!like_match("Bob", "b%"));
/// ```
pub fn like_match(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();

    let mut ti = 0;
    let mut pi = 0;
    // Last '%' seen and the text position it was tried at, for backtracking.
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            ti += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '%' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '%' {
        pi += 1;
    }
    pi == p.len()
}
