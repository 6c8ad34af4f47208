use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{DbError, Result};
use crate::index::{Index, Key};
use crate::schema::Schema;
use crate::value::Value;

/// Opaque identifier naming a row within a table for its entire lifetime.
///
/// Allocated from a per-table counter that never decreases and never
/// reuses a value, even after deletion. Updates preserve it.
pub type RowId = u64;

/// A table: ordered column schema, a rid-keyed row store, and the indexes
/// kept consistent with every mutation.
///
/// Mutations run through [crate::database::Database], which owns the
/// cross-table concerns (foreign keys, undo logging) and calls the
/// narrower operations here in the order the constraint checks demand.
pub struct Table {
    pub name: String,
    pub schema: Schema,
    rows: BTreeMap<RowId, Vec<Value>>,
    indexes: HashMap<String, Index>,
    next_rid: RowId,
}

impl Table {
    /// Creates an empty table. Every PRIMARY KEY or UNIQUE column gets its
    /// automatic unique index here; explicit indexes come later through
    /// [Table::create_index].
    pub fn new(name: String, schema: Schema) -> Self {
        let mut indexes = HashMap::new();
        for col in &schema.columns {
            if col.primary_key {
                let idx_name = format!("pk_{}", col.name);
                indexes.insert(idx_name.clone(), Index::new(idx_name, &col.name, true));
            } else if col.unique {
                let idx_name = format!("uniq_{}", col.name);
                indexes.insert(idx_name.clone(), Index::new(idx_name, &col.name, true));
            }
        }
        Self {
            name,
            schema,
            rows: BTreeMap::new(),
            indexes,
            next_rid: 1,
        }
    }

    pub(crate) fn from_parts(
        name: String,
        schema: Schema,
        rows: BTreeMap<RowId, Vec<Value>>,
        indexes: HashMap<String, Index>,
        next_rid: RowId,
    ) -> Self {
        Self {
            name,
            schema,
            rows,
            indexes,
            next_rid,
        }
    }

    // --- Validation ---

    /// Checks arity, coerces each value to its column type, and enforces
    /// NOT NULL. Returns the coerced tuple without touching any state.
    ///
    /// # Errors
    /// [DbError::Arity], [DbError::Type], or [DbError::Constraint], in
    /// that order of checking.
    pub(crate) fn validate_row(&self, values: Vec<Value>) -> Result<Vec<Value>> {
        if values.len() != self.schema.arity() {
            return Err(DbError::Arity {
                expected: self.schema.arity(),
                got: values.len(),
            });
        }
        let mut tuple = Vec::with_capacity(values.len());
        for (col, value) in self.schema.columns.iter().zip(values) {
            let value = value.coerce(col.data_type).map_err(|e| match e {
                DbError::Type(detail) => {
                    DbError::Type(format!("column {:?}: {detail}", col.name))
                }
                other => other,
            })?;
            if value.is_null() && col.rejects_null() {
                return Err(DbError::Constraint(format!(
                    "NOT NULL column {:?} in table {:?}",
                    col.name, self.name
                )));
            }
            tuple.push(value);
        }
        Ok(tuple)
    }

    /// Rejects the tuple if any unique index already holds its value.
    pub(crate) fn check_unique_insert(&self, tuple: &[Value]) -> Result<()> {
        for idx in self.indexes.values().filter(|i| i.unique) {
            let Some(col) = self.schema.column_index(&idx.column) else {
                continue;
            };
            let value = &tuple[col];
            if idx.contains(value) {
                return Err(DbError::Constraint(format!(
                    "duplicate value {value:?} for unique column {:?} in table {:?}",
                    idx.column, self.name
                )));
            }
        }
        Ok(())
    }

    /// Uniqueness check for an update: a value conflicts only when some
    /// row other than `rid` holds it, so writing a row's own current value
    /// back is never a violation.
    pub(crate) fn check_unique_replacement(&self, rid: RowId, tuple: &[Value]) -> Result<()> {
        for idx in self.indexes.values().filter(|i| i.unique) {
            let Some(col) = self.schema.column_index(&idx.column) else {
                continue;
            };
            let value = &tuple[col];
            if idx.conflicts_with_other(value, rid) {
                return Err(DbError::Constraint(format!(
                    "duplicate value {value:?} for unique column {:?} in table {:?}",
                    idx.column, self.name
                )));
            }
        }
        Ok(())
    }

    // --- Mutation ---

    /// Allocates the next row identifier. The counter only moves forward.
    pub(crate) fn reserve_rid(&mut self) -> RowId {
        let rid = self.next_rid;
        self.next_rid += 1;
        rid
    }

    /// Places a validated tuple at `rid` and records it in every index.
    ///
    /// # Errors
    /// [DbError::Transaction] if `rid` is occupied, which only a
    /// malformed undo replay can cause.
    pub(crate) fn place_row(&mut self, rid: RowId, tuple: Vec<Value>) -> Result<()> {
        if self.rows.contains_key(&rid) {
            return Err(DbError::Transaction(format!(
                "row id {rid} already occupied in table {:?}",
                self.name
            )));
        }
        for idx in self.indexes.values_mut() {
            if let Some(col) = self.schema.column_index(&idx.column) {
                idx.add(&tuple[col], rid)?;
            }
        }
        self.rows.insert(rid, tuple);
        Ok(())
    }

    /// Re-inserts a previously deleted row under its original identifier,
    /// restoring its index entries. Keeps the rid counter ahead of every
    /// live row.
    pub(crate) fn restore_row(&mut self, rid: RowId, tuple: Vec<Value>) -> Result<()> {
        self.place_row(rid, tuple)?;
        if rid >= self.next_rid {
            self.next_rid = rid + 1;
        }
        Ok(())
    }

    /// Removes a row, dropping its entry from every index. Returns the
    /// removed tuple, or `None` if the rid is unknown.
    pub(crate) fn remove_row(&mut self, rid: RowId) -> Option<Vec<Value>> {
        let tuple = self.rows.remove(&rid)?;
        for idx in self.indexes.values_mut() {
            if let Some(col) = self.schema.column_index(&idx.column) {
                idx.remove(&tuple[col], rid);
            }
        }
        Some(tuple)
    }

    /// Replaces the tuple at `rid`, reconciling only the indexes whose
    /// column value actually changed.
    ///
    /// # Errors
    /// [DbError::Transaction] if the rid is unknown, which only a
    /// malformed undo replay can cause.
    pub(crate) fn replace_row(&mut self, rid: RowId, tuple: Vec<Value>) -> Result<()> {
        let old = self.rows.get(&rid).cloned().ok_or_else(|| {
            DbError::Transaction(format!(
                "row id {rid} missing from table {:?}",
                self.name
            ))
        })?;
        for idx in self.indexes.values_mut() {
            let Some(col) = self.schema.column_index(&idx.column) else {
                continue;
            };
            if old[col] != tuple[col] {
                idx.remove(&old[col], rid);
                idx.add(&tuple[col], rid)?;
            }
        }
        self.rows.insert(rid, tuple);
        Ok(())
    }

    // --- Reads ---

    /// The tuple stored at `rid`, if any.
    pub fn row(&self, rid: RowId) -> Option<&Vec<Value>> {
        self.rows.get(&rid)
    }

    /// Yields `(rid, tuple)` pairs in ascending rid order.
    pub fn scan(&self) -> impl Iterator<Item = (RowId, &Vec<Value>)> {
        self.rows.iter().map(|(rid, tuple)| (*rid, tuple))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn next_rid_value(&self) -> RowId {
        self.next_rid
    }

    // --- Indexes ---

    /// Declares an explicit (non-unique) index over `column` and builds it
    /// from the current rows.
    ///
    /// # Errors
    /// [DbError::Schema] for an unknown column or a duplicate index name.
    pub fn create_index(&mut self, name: &str, column: &str) -> Result<()> {
        let Some(col) = self.schema.column_index(column) else {
            return Err(DbError::Schema(format!(
                "no column {column:?} in table {:?}",
                self.name
            )));
        };
        if self.indexes.contains_key(name) {
            return Err(DbError::Schema(format!(
                "index {name:?} already exists on table {:?}",
                self.name
            )));
        }
        let mut idx = Index::new(name, column, false);
        for (rid, tuple) in &self.rows {
            idx.add(&tuple[col], *rid)?;
        }
        self.indexes.insert(name.to_string(), idx);
        Ok(())
    }

    /// Some index over `column`, preferring a unique one when both exist.
    pub fn index_on(&self, column: &str) -> Option<&Index> {
        self.indexes
            .values()
            .filter(|i| i.column == column)
            .max_by_key(|i| i.unique)
    }

    /// The automatic index backing the PRIMARY KEY column, if one is
    /// declared.
    pub fn pk_index(&self) -> Option<&Index> {
        let (_, pk) = self.schema.primary_key()?;
        self.index_on(&pk.name)
    }

    pub fn indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.values()
    }

    /// Recomputes what an index over `column` should contain from the row
    /// store alone. Used by consistency checks.
    pub(crate) fn expected_index_entries(&self, column: &str) -> HashMap<Key, HashSet<RowId>> {
        let mut expected: HashMap<Key, HashSet<RowId>> = HashMap::new();
        let Some(col) = self.schema.column_index(column) else {
            return expected;
        };
        for (rid, tuple) in &self.rows {
            if !tuple[col].is_null() {
                expected
                    .entry(Key(tuple[col].clone()))
                    .or_default()
                    .insert(*rid);
            }
        }
        expected
    }
}
