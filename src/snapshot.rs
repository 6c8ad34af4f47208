use std::collections::{BTreeMap, HashMap};
use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::database::Database;
use crate::error::{DbError, Result};
use crate::index::{Index, Key};
use crate::schema::{ColumnDef, Schema};
use crate::table::{RowId, Table};
use crate::value::Value;

/// Identifies a byte stream as one of our snapshots.
const MAGIC: [u8; 4] = *b"MQLS";
/// Bumped on any incompatible change to the encoded layout.
const FORMAT_VERSION: u16 = 1;

#[derive(Serialize, Deserialize)]
struct IndexState {
    name: String,
    column: String,
    unique: bool,
    entries: Vec<(Value, Vec<RowId>)>,
}

#[derive(Serialize, Deserialize)]
struct TableState {
    name: String,
    columns: Vec<ColumnDef>,
    next_rid: RowId,
    rows: Vec<(RowId, Vec<Value>)>,
    indexes: Vec<IndexState>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotState {
    tables: Vec<TableState>,
}

impl Database {
    /// Serializes the entire database state to `writer`: table
    /// definitions, row stores, rid counters, and all indexes.
    ///
    /// The stream opens with a magic prefix and a format version so an
    /// incompatible file is detected before decoding. Entries are emitted
    /// in sorted order, so identical databases produce identical bytes.
    ///
    /// # Errors
    /// [DbError::Io] on a write failure.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;

        let mut tables: Vec<TableState> = self.tables.values().map(table_state).collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        let state = SnapshotState { tables };

        bincode::serialize_into(&mut *writer, &state)
            .map_err(|e| DbError::Io(io::Error::new(io::ErrorKind::Other, e)))?;
        debug!(tables = state.tables.len(), "snapshot written");
        Ok(())
    }

    /// Restores a database from a stream produced by [Database::save].
    ///
    /// After decoding, every data-model invariant is re-verified: schema
    /// conformance, NOT NULL, uniqueness, foreign keys, and full index
    /// consistency against the row stores.
    ///
    /// # Errors
    /// [DbError::CorruptSnapshot] when the magic, version, decoding, or
    /// any invariant check fails; [DbError::Io] on a read failure.
    pub fn load<R: Read>(reader: &mut R) -> Result<Database> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(DbError::CorruptSnapshot("bad magic prefix".into()));
        }
        let mut version = [0u8; 2];
        reader.read_exact(&mut version)?;
        let version = u16::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(DbError::CorruptSnapshot(format!(
                "unsupported format version {version}"
            )));
        }

        let state: SnapshotState = bincode::deserialize_from(&mut *reader)
            .map_err(|e| DbError::CorruptSnapshot(e.to_string()))?;

        let mut db = Database::new();
        for ts in state.tables {
            let schema =
                Schema::new(ts.columns).map_err(|e| DbError::CorruptSnapshot(e.to_string()))?;
            let rows: BTreeMap<RowId, Vec<Value>> = ts.rows.into_iter().collect();
            let indexes: HashMap<String, Index> = ts
                .indexes
                .into_iter()
                .map(|is| {
                    (
                        is.name.clone(),
                        Index::from_entries(is.name, is.column, is.unique, is.entries),
                    )
                })
                .collect();
            let table = Table::from_parts(ts.name.clone(), schema, rows, indexes, ts.next_rid);
            db.tables.insert(ts.name, table);
        }

        db.verify_integrity()?;
        debug!(tables = db.tables.len(), "snapshot loaded");
        Ok(db)
    }

    /// Checks every data-model invariant across all tables. Used after a
    /// snapshot load; a failure means the stream did not describe a
    /// well-formed database.
    pub(crate) fn verify_integrity(&self) -> Result<()> {
        for table in self.tables.values() {
            self.verify_table(table)?;
        }
        Ok(())
    }

    fn verify_table(&self, table: &Table) -> Result<()> {
        let corrupt = |detail: String| DbError::CorruptSnapshot(detail);
        let schema = &table.schema;

        // Row conformance: arity, types, NOT NULL, and a rid counter that
        // stays ahead of every live row.
        for (rid, tuple) in table.scan() {
            if rid >= table.next_rid_value() {
                return Err(corrupt(format!(
                    "table {:?}: rid {rid} at or past the allocation counter",
                    table.name
                )));
            }
            if tuple.len() != schema.arity() {
                return Err(corrupt(format!(
                    "table {:?}: row {rid} has arity {} instead of {}",
                    table.name,
                    tuple.len(),
                    schema.arity()
                )));
            }
            for (col, value) in schema.columns.iter().zip(tuple) {
                if value.is_null() {
                    if col.rejects_null() {
                        return Err(corrupt(format!(
                            "table {:?}: null in NOT NULL column {:?}",
                            table.name, col.name
                        )));
                    }
                } else if value.data_type() != Some(col.data_type) {
                    return Err(corrupt(format!(
                        "table {:?}: value {value:?} in {} column {:?}",
                        table.name, col.data_type, col.name
                    )));
                }
            }
        }

        // Uniqueness straight from the rows, independent of the indexes.
        for (i, col) in schema.columns.iter().enumerate() {
            if !col.enforces_unique() {
                continue;
            }
            let mut seen = std::collections::HashSet::new();
            for (_, tuple) in table.scan() {
                if tuple[i].is_null() {
                    continue;
                }
                if !seen.insert(Key(tuple[i].clone())) {
                    return Err(corrupt(format!(
                        "table {:?}: duplicate value {:?} in unique column {:?}",
                        table.name, tuple[i], col.name
                    )));
                }
            }
        }

        // Foreign keys resolve to a parent primary key value.
        for (i, col) in schema.columns.iter().enumerate() {
            let Some(fk) = &col.references else { continue };
            let target = self.tables.get(&fk.table).ok_or_else(|| {
                corrupt(format!(
                    "table {:?}: foreign key references missing table {:?}",
                    table.name, fk.table
                ))
            })?;
            let pk_index = target.pk_index().ok_or_else(|| {
                corrupt(format!(
                    "table {:?}: foreign key target {:?} has no primary key index",
                    table.name, fk.table
                ))
            })?;
            for (rid, tuple) in table.scan() {
                if !tuple[i].is_null() && !pk_index.contains(&tuple[i]) {
                    return Err(corrupt(format!(
                        "table {:?}: row {rid} references missing parent {:?} in {:?}",
                        table.name, tuple[i], fk.table
                    )));
                }
            }
        }

        // Index consistency: exactly the entries a fresh scan would build.
        for index in table.indexes() {
            if schema.column_index(&index.column).is_none() {
                return Err(corrupt(format!(
                    "table {:?}: index {:?} over unknown column {:?}",
                    table.name, index.name, index.column
                )));
            }
            let expected = table.expected_index_entries(&index.column);
            if index.key_count() != expected.len() {
                return Err(corrupt(format!(
                    "table {:?}: index {:?} has {} keys, expected {}",
                    table.name,
                    index.name,
                    index.key_count(),
                    expected.len()
                )));
            }
            for (value, rids) in index.entries() {
                let Some(expected_rids) = expected.get(&Key(value.clone())) else {
                    return Err(corrupt(format!(
                        "table {:?}: index {:?} holds stale key {value:?}",
                        table.name, index.name
                    )));
                };
                if rids != expected_rids {
                    return Err(corrupt(format!(
                        "table {:?}: index {:?} disagrees with rows for key {value:?}",
                        table.name, index.name
                    )));
                }
                if index.unique && rids.len() > 1 {
                    return Err(corrupt(format!(
                        "table {:?}: unique index {:?} maps {value:?} to {} rows",
                        table.name,
                        index.name,
                        rids.len()
                    )));
                }
            }
        }

        Ok(())
    }
}

fn table_state(table: &Table) -> TableState {
    let mut indexes: Vec<IndexState> = table
        .indexes()
        .map(|idx| {
            let mut entries: Vec<(Value, Vec<RowId>)> = idx
                .entries()
                .map(|(value, rids)| {
                    let mut rids: Vec<RowId> = rids.iter().copied().collect();
                    rids.sort_unstable();
                    (value.clone(), rids)
                })
                .collect();
            entries.sort_by(|a, b| a.0.total_cmp(&b.0));
            IndexState {
                name: idx.name.clone(),
                column: idx.column.clone(),
                unique: idx.unique,
                entries,
            }
        })
        .collect();
    indexes.sort_by(|a, b| a.name.cmp(&b.name));

    TableState {
        name: table.name.clone(),
        columns: table.schema.columns.clone(),
        next_rid: table.next_rid_value(),
        rows: table.scan().map(|(rid, tuple)| (rid, tuple.clone())).collect(),
        indexes,
    }
}
