use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};
use crate::table::RowId;
use crate::value::Value;

/// Hashable wrapper around [Value] for use as an index key.
///
/// [Value] itself is only `PartialEq` because of floats; keys compare
/// REAL values by bit pattern, which gives the total equivalence that
/// `HashMap` requires. Null is never inserted, so it needs no special
/// treatment beyond a tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Key(pub Value);

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Value::Real(l), Value::Real(r)) => l.to_bits() == r.to_bits(),
            (l, r) => l == r,
        }
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Value::Null => state.write_u8(0),
            Value::Int(i) => {
                state.write_u8(1);
                i.hash(state);
            }
            Value::Real(f) => {
                state.write_u8(2);
                f.to_bits().hash(state);
            }
            Value::Text(s) => {
                state.write_u8(3);
                s.hash(state);
            }
            Value::Bool(b) => {
                state.write_u8(4);
                b.hash(state);
            }
            Value::Date(d) => {
                state.write_u8(5);
                d.hash(state);
            }
        }
    }
}

/// Equality-hash index over one column: a mapping from a column value to
/// the set of row identifiers in which that value occurs.
///
/// Null values are never indexed: a unique index must permit any number of
/// nulls, and `WHERE col = NULL` never matches a row anyway.
#[derive(Debug, Clone)]
pub struct Index {
    pub name: String,
    pub column: String,
    /// When set, every key maps to at most one row identifier.
    pub unique: bool,
    map: HashMap<Key, HashSet<RowId>>,
}

impl Index {
    pub fn new(name: impl Into<String>, column: impl Into<String>, unique: bool) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            unique,
            map: HashMap::new(),
        }
    }

    /// Rebuilds an index from serialized entries, as loaded from a snapshot.
    /// No uniqueness checks run here; snapshot verification covers them.
    pub(crate) fn from_entries(
        name: String,
        column: String,
        unique: bool,
        entries: Vec<(Value, Vec<RowId>)>,
    ) -> Self {
        let map = entries
            .into_iter()
            .map(|(value, rids)| (Key(value), rids.into_iter().collect()))
            .collect();
        Self {
            name,
            column,
            unique,
            map,
        }
    }

    /// Records that `rid`'s indexed column holds `value`. Null is a no-op.
    ///
    /// # Errors
    /// For a unique index, returns [DbError::Constraint] when the key is
    /// already mapped to a different row. The storage engine pre-checks
    /// uniqueness before mutating, so this double-check firing means a
    /// pre-check was skipped.
    pub fn add(&mut self, value: &Value, rid: RowId) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        let set = self.map.entry(Key(value.clone())).or_default();
        if self.unique && !set.is_empty() && !set.contains(&rid) {
            return Err(DbError::Constraint(format!(
                "duplicate value {value:?} in unique index {:?}",
                self.name
            )));
        }
        set.insert(rid);
        Ok(())
    }

    /// Removes the `(value, rid)` entry. Unknown pairs and null values are
    /// no-ops; empty key sets are dropped so the key space stays tight.
    pub fn remove(&mut self, value: &Value, rid: RowId) {
        if value.is_null() {
            return;
        }
        let key = Key(value.clone());
        if let Some(set) = self.map.get_mut(&key) {
            set.remove(&rid);
            if set.is_empty() {
                self.map.remove(&key);
            }
        }
    }

    /// The set of row identifiers whose indexed column equals `value`.
    /// Unknown keys yield the empty set.
    pub fn lookup_eq(&self, value: &Value) -> HashSet<RowId> {
        if value.is_null() {
            return HashSet::new();
        }
        self.map
            .get(&Key(value.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// True when some row holds `value` in the indexed column.
    pub fn contains(&self, value: &Value) -> bool {
        !value.is_null() && self.map.contains_key(&Key(value.clone()))
    }

    /// True when `value` is held by some row other than `rid`.
    /// This is the self-match rule: a row's own current value never
    /// conflicts with itself.
    pub fn conflicts_with_other(&self, value: &Value, rid: RowId) -> bool {
        if value.is_null() {
            return false;
        }
        match self.map.get(&Key(value.clone())) {
            Some(set) => set.iter().any(|r| *r != rid),
            None => false,
        }
    }

    /// Iterates all `(value, rid set)` entries, in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (&Value, &HashSet<RowId>)> {
        self.map.iter().map(|(k, set)| (&k.0, set))
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.map.len()
    }

    /// Total number of `(value, rid)` pairs.
    pub fn entry_count(&self) -> usize {
        self.map.values().map(HashSet::len).sum()
    }
}
