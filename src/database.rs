use std::collections::{HashMap, HashSet};

use tracing::{debug, trace, warn};

use crate::ast::{CreateIndex, CreateTable, Delete, Insert, Statement, Update};
use crate::error::{DbError, Result};
use crate::index::Key;
use crate::parser::parse_sql;
use crate::query::{matching_rids, QueryResult};
use crate::schema::Schema;
use crate::table::{RowId, Table};
use crate::txn::{TransactionManager, UndoEntry};
use crate::value::Value;

/// The outcome of one executed statement.
#[derive(Debug)]
pub enum Output {
    /// A `SELECT` result set.
    Rows(QueryResult),
    /// Number of rows an INSERT, UPDATE, or DELETE touched.
    Count(usize),
    /// A statement with no data to return (DDL, BEGIN, COMMIT, ROLLBACK).
    Ack,
}

/// The main entry point for the in-memory database engine.
///
/// Owns the tables and the transaction manager, and orchestrates every
/// operation that crosses table boundaries: foreign key validation, undo
/// logging, and rollback replay. The engine is single-writer; hosts that
/// want concurrent access must serialize calls externally.
#[derive(Default)]
pub struct Database {
    pub(crate) tables: HashMap<String, Table>,
    pub(crate) txn: TransactionManager,
}

impl Database {
    /// Creates a new, empty database instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Executes one SQL statement and returns its outcome.
    ///
    /// This is the single textual entry point: DDL, DML, queries, and
    /// transaction control all route through here.
    ///
    /// # Errors
    /// Returns an error if tokenization, parsing, or execution fails. A
    /// failed statement leaves the database unchanged; within a
    /// transaction the caller is expected to ROLLBACK after an error.
    ///
    /// # Example
    /// ```
    /// use memql::{Database, Output, Value};
    ///
    /// let mut db = Database::new();
    /// db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)").unwrap();
    /// assert!(matches!(
    ///     db.execute("INSERT INTO users VALUES (1, 'Alice')").unwrap(),
    ///     Output::Count(1)
    /// ));
    ///
    /// let result = db.query("SELECT name FROM users WHERE id = 1").unwrap();
    /// assert_eq!(result.rows[0][0], Value::Text("Alice".into()));
    /// ```
    pub fn execute(&mut self, sql: &str) -> Result<Output> {
        let statement = parse_sql(sql)?;
        debug!(?statement, "executing statement");

        match statement {
            Statement::CreateTable(create) => {
                self.create_table(create)?;
                Ok(Output::Ack)
            }
            Statement::CreateIndex(create) => {
                self.create_index(create)?;
                Ok(Output::Ack)
            }
            Statement::Insert(insert) => {
                self.run_insert(insert)?;
                Ok(Output::Count(1))
            }
            Statement::Select(select) => self.eval_select(&select).map(Output::Rows),
            Statement::Update(update) => self.run_update(update).map(Output::Count),
            Statement::Delete(delete) => self.run_delete(delete).map(Output::Count),
            Statement::Begin => {
                self.begin()?;
                Ok(Output::Ack)
            }
            Statement::Commit => {
                self.commit();
                Ok(Output::Ack)
            }
            Statement::Rollback => {
                self.rollback()?;
                Ok(Output::Ack)
            }
        }
    }

    /// Executes a `SELECT` statement and returns the resulting data set.
    ///
    /// A read-only convenience over [Database::execute] for callers that
    /// know they are querying.
    ///
    /// # Errors
    /// Returns an error if the SQL is not a valid `SELECT` statement, or
    /// if evaluation fails.
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        let statement = parse_sql(sql)?;
        let Statement::Select(select) = statement else {
            return Err(DbError::Syntax {
                at: 0,
                detail: "expected a SELECT statement".into(),
            });
        };
        self.eval_select(&select)
    }

    /// Retrieves a reference to a table by name.
    pub(crate) fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| DbError::Schema(format!("no such table: {name:?}")))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DbError::Schema(format!("no such table: {name:?}")))
    }

    /// Returns a list of all table names currently stored in the database.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Read access to a table's schema, rows, and indexes.
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    // --- DDL ---

    /// Creates a new table, merging table-level FOREIGN KEY clauses into
    /// their columns and validating the referenced targets.
    ///
    /// # Errors
    /// [DbError::Schema] if the table exists, a foreign key names an
    /// unknown column, or a reference target is not an existing table's
    /// primary key. Self-references are allowed.
    fn create_table(&mut self, create: CreateTable) -> Result<()> {
        if self.tables.contains_key(&create.name) {
            return Err(DbError::Schema(format!(
                "table {:?} already exists",
                create.name
            )));
        }

        let CreateTable {
            name,
            mut columns,
            foreign_keys,
        } = create;

        for fk in foreign_keys {
            let col = columns
                .iter_mut()
                .find(|c| c.name == fk.column)
                .ok_or_else(|| {
                    DbError::Schema(format!(
                        "FOREIGN KEY names unknown column {:?}",
                        fk.column
                    ))
                })?;
            if col.references.is_some() {
                return Err(DbError::Schema(format!(
                    "duplicate FOREIGN KEY on column {:?}",
                    fk.column
                )));
            }
            col.references = Some(fk.references);
        }

        // Each reference target must be a primary key we can resolve on
        // every validating operation. A self-reference checks against the
        // table being defined.
        for col in &columns {
            let Some(fk) = &col.references else { continue };
            let target_pk = if fk.table == name {
                columns
                    .iter()
                    .find(|c| c.primary_key)
                    .map(|c| c.name.clone())
            } else {
                self.table(&fk.table)
                    .map_err(|_| {
                        DbError::Schema(format!(
                            "FOREIGN KEY references unknown table {:?}",
                            fk.table
                        ))
                    })?
                    .schema
                    .primary_key()
                    .map(|(_, c)| c.name.clone())
            };
            if target_pk.as_deref() != Some(fk.column.as_str()) {
                return Err(DbError::Schema(format!(
                    "FOREIGN KEY must reference the primary key of {:?}",
                    fk.table
                )));
            }
        }

        let schema = Schema::new(columns)?;
        debug!(table = %name, arity = schema.arity(), "creating table");
        self.tables.insert(name.clone(), Table::new(name, schema));
        Ok(())
    }

    /// Declares an explicit index and backfills it from existing rows.
    fn create_index(&mut self, create: CreateIndex) -> Result<()> {
        debug!(index = %create.name, table = %create.table, column = %create.column, "creating index");
        self.table_mut(&create.table)?
            .create_index(&create.name, &create.column)
    }

    // --- DML ---

    /// Inserts one row. Checks run in order before any state changes:
    /// arity, type coercion, NOT NULL, uniqueness, foreign keys. Only then
    /// is a rid allocated, the undo entry recorded, and the row placed in
    /// the store and every index.
    fn run_insert(&mut self, insert: Insert) -> Result<RowId> {
        let table = self.table(&insert.table)?;

        let values = match insert.columns {
            None => insert.values,
            Some(columns) => reorder_values(table, columns, insert.values)?,
        };

        let tuple = table.validate_row(values)?;
        table.check_unique_insert(&tuple)?;
        self.check_foreign_keys(&insert.table, &tuple)?;

        let table = self.table_mut(&insert.table)?;
        let rid = table.reserve_rid();
        self.txn.log_insert(&insert.table, rid);
        let table = self.table_mut(&insert.table)?;
        table.place_row(rid, tuple)?;
        trace!(table = %insert.table, rid, "inserted row");
        Ok(rid)
    }

    /// Verifies every non-null foreign key value in `tuple` exists as a
    /// primary key value in its target table.
    fn check_foreign_keys(&self, table_name: &str, tuple: &[Value]) -> Result<()> {
        let table = self.table(table_name)?;
        for (i, col) in table.schema.columns.iter().enumerate() {
            let Some(fk) = &col.references else { continue };
            let value = &tuple[i];
            if value.is_null() {
                continue;
            }
            let target = self.table(&fk.table)?;
            let found = match target.pk_index() {
                Some(idx) => idx.contains(value),
                None => false,
            };
            if !found {
                return Err(DbError::ReferentialIntegrity(format!(
                    "value {value} for {table_name}.{} has no parent in {}.{}",
                    col.name, fk.table, fk.column
                )));
            }
        }
        Ok(())
    }

    /// Updates matching rows. All checks run over every candidate row
    /// before the first mutation, so a failure leaves the table untouched.
    /// Returns the number of rows modified.
    fn run_update(&mut self, update: Update) -> Result<usize> {
        let table = self.table(&update.table)?;

        // Coerce assignment literals once, against their column types.
        let mut assignments = Vec::with_capacity(update.assignments.len());
        for (column, literal) in &update.assignments {
            let col = table.schema.column_index(column).ok_or_else(|| {
                DbError::Schema(format!(
                    "no column {column:?} in table {:?}",
                    update.table
                ))
            })?;
            let value = literal
                .clone()
                .coerce(table.schema.columns[col].data_type)?;
            assignments.push((col, value));
        }

        let (rids, _) = matching_rids(table, &update.predicates)?;

        // Phase one: build and validate every post-image.
        let mut pending: Vec<(RowId, Vec<Value>, Vec<Value>)> = Vec::with_capacity(rids.len());
        for rid in rids {
            let Some(old) = table.row(rid) else { continue };
            let mut new = old.clone();
            for (col, value) in &assignments {
                new[*col] = value.clone();
            }
            let new = table.validate_row(new)?;
            table.check_unique_replacement(rid, &new)?;
            self.check_foreign_keys(&update.table, &new)?;
            pending.push((rid, old.clone(), new));
        }

        // Two candidate rows may not converge on the same unique value;
        // the index cannot see that until one of them lands.
        for (ucol, _) in table
            .schema
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.enforces_unique())
        {
            let mut seen: HashSet<Key> = HashSet::new();
            for (_, _, new) in &pending {
                if new[ucol].is_null() {
                    continue;
                }
                if !seen.insert(Key(new[ucol].clone())) {
                    return Err(DbError::Constraint(format!(
                        "duplicate value {} for unique column {:?} in table {:?}",
                        new[ucol], table.schema.columns[ucol].name, update.table
                    )));
                }
            }
        }

        // Phase two: record pre-images and apply.
        let count = pending.len();
        for (rid, old, new) in pending {
            self.txn.log_update(&update.table, rid, old);
            self.table_mut(&update.table)?.replace_row(rid, new)?;
        }
        trace!(table = %update.table, count, "updated rows");
        Ok(count)
    }

    /// Deletes matching rows. Every candidate is checked against all
    /// referencing tables first; one referenced row aborts the whole
    /// statement before anything is removed. Returns the number of rows
    /// removed.
    fn run_delete(&mut self, delete: Delete) -> Result<usize> {
        let table = self.table(&delete.table)?;
        let (rids, _) = matching_rids(table, &delete.predicates)?;

        let doomed: Vec<(RowId, Vec<Value>)> = rids
            .iter()
            .filter_map(|rid| table.row(*rid).map(|t| (*rid, t.clone())))
            .collect();

        for (_, tuple) in &doomed {
            self.check_not_referenced(&delete.table, tuple)?;
        }

        let count = doomed.len();
        for (rid, tuple) in doomed {
            self.txn.log_delete(&delete.table, rid, tuple);
            self.table_mut(&delete.table)?.remove_row(rid);
        }
        trace!(table = %delete.table, count, "deleted rows");
        Ok(count)
    }

    /// Rejects the deletion of `tuple` when any row in any table holds a
    /// foreign key pointing at it. Uses the child's index on the
    /// referencing column when one exists, otherwise scans its rows.
    fn check_not_referenced(&self, table_name: &str, tuple: &[Value]) -> Result<()> {
        let parent = self.table(table_name)?;
        for (child_name, child) in &self.tables {
            for (i, col) in child.schema.columns.iter().enumerate() {
                let Some(fk) = &col.references else { continue };
                if fk.table != table_name {
                    continue;
                }
                let Some(ref_col) = parent.schema.column_index(&fk.column) else {
                    continue;
                };
                let value = &tuple[ref_col];
                if value.is_null() {
                    continue;
                }
                let referenced = match child.index_on(&col.name) {
                    Some(idx) => idx.contains(value),
                    None => child.scan().any(|(_, row)| row[i] == *value),
                };
                if referenced {
                    return Err(DbError::ReferentialIntegrity(format!(
                        "row with {}.{} = {value} is referenced by {child_name}.{}",
                        table_name, fk.column, col.name
                    )));
                }
            }
        }
        Ok(())
    }

    // --- Transactions ---

    /// Opens a transaction.
    ///
    /// # Errors
    /// [DbError::Transaction] when one is already active.
    pub fn begin(&mut self) -> Result<()> {
        debug!("begin transaction");
        self.txn.begin()
    }

    /// Commits the active transaction by discarding its undo log.
    /// A commit with no active transaction is a warned no-op.
    pub fn commit(&mut self) {
        if self.txn.commit() {
            debug!("transaction committed");
        } else {
            warn!("COMMIT with no active transaction");
        }
    }

    /// Rolls back the active transaction by replaying its undo log in
    /// reverse. A rollback with no active transaction is a warned no-op.
    ///
    /// # Errors
    /// [DbError::Transaction] if a replay step fails. The undo log is
    /// well-formed for every mutation this engine records, so a failure
    /// here means the database is in a poisoned state and should be
    /// discarded or reloaded from a snapshot.
    pub fn rollback(&mut self) -> Result<()> {
        let Some(undo) = self.txn.take_undo_log() else {
            warn!("ROLLBACK with no active transaction");
            return Ok(());
        };
        debug!(entries = undo.len(), "rolling back transaction");
        for entry in undo.into_iter().rev() {
            self.apply_undo(entry)
                .map_err(|e| DbError::Transaction(format!("undo replay failed: {e}")))?;
        }
        Ok(())
    }

    fn apply_undo(&mut self, entry: UndoEntry) -> Result<()> {
        match entry {
            UndoEntry::Insert { table, rid } => {
                self.table_mut(&table)?.remove_row(rid).ok_or_else(|| {
                    DbError::Transaction(format!("row {rid} missing from table {table:?}"))
                })?;
            }
            UndoEntry::Update { table, rid, tuple } => {
                self.table_mut(&table)?.replace_row(rid, tuple)?;
            }
            UndoEntry::Delete { table, rid, tuple } => {
                self.table_mut(&table)?.restore_row(rid, tuple)?;
            }
        }
        Ok(())
    }
}

/// Maps a provided `(column list, values)` pair onto the table's schema
/// order, filling unnamed columns with NULL.
fn reorder_values(table: &Table, columns: Vec<String>, values: Vec<Value>) -> Result<Vec<Value>> {
    if columns.len() != values.len() {
        return Err(DbError::Arity {
            expected: columns.len(),
            got: values.len(),
        });
    }
    for name in &columns {
        if table.schema.column_index(name).is_none() {
            return Err(DbError::Schema(format!(
                "no column {name:?} in table {:?}",
                table.name
            )));
        }
    }

    let mut provided: HashMap<String, Value> = columns.into_iter().zip(values).collect();
    Ok(table
        .schema
        .columns
        .iter()
        .map(|col| provided.remove(&col.name).unwrap_or(Value::Null))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ScanKind;

    fn users_db() -> Database {
        let mut db = Database::new();
        db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT UNIQUE)")
            .unwrap();
        db.execute("INSERT INTO users VALUES (1, 'Alice')").unwrap();
        db.execute("INSERT INTO users VALUES (2, 'Bob')").unwrap();
        db
    }

    /// Scans every table and index into a comparable shape.
    fn observable_state(db: &Database) -> Vec<(String, Vec<(RowId, Vec<Value>)>, Vec<(String, usize)>)> {
        let mut state: Vec<_> = db
            .tables
            .values()
            .map(|t| {
                let rows: Vec<_> = t.scan().map(|(rid, tuple)| (rid, tuple.clone())).collect();
                let mut indexes: Vec<_> = t
                    .indexes()
                    .map(|i| (i.name.clone(), i.entry_count()))
                    .collect();
                indexes.sort();
                (t.name.clone(), rows, indexes)
            })
            .collect();
        state.sort_by(|a, b| a.0.cmp(&b.0));
        state
    }

    #[test]
    fn test_crud_round_trip() {
        let mut db = users_db();

        let result = db.query("SELECT * FROM users WHERE id = 2").unwrap();
        assert_eq!(
            result.rows,
            vec![vec![Value::Int(2), Value::Text("Bob".into())]]
        );

        match db
            .execute("UPDATE users SET name = 'Alicia' WHERE id = 1")
            .unwrap()
        {
            Output::Count(n) => assert_eq!(n, 1),
            other => panic!("expected a row count, got {other:?}"),
        }

        let result = db.query("SELECT name FROM users WHERE id = 1").unwrap();
        assert_eq!(result.rows, vec![vec![Value::Text("Alicia".into())]]);

        match db.execute("DELETE FROM users WHERE id = 2").unwrap() {
            Output::Count(n) => assert_eq!(n, 1),
            other => panic!("expected a row count, got {other:?}"),
        }

        let result = db.query("SELECT * FROM users").unwrap();
        assert_eq!(
            result.rows,
            vec![vec![Value::Int(1), Value::Text("Alicia".into())]]
        );
    }

    #[test]
    fn test_unique_collision_keeps_existing_row() {
        let mut db = users_db();
        db.execute("UPDATE users SET name = 'Alicia' WHERE id = 1")
            .unwrap();

        let result = db.execute("INSERT INTO users VALUES (3, 'Alicia')");
        assert!(matches!(result, Err(DbError::Constraint(_))));

        let rows = db.query("SELECT * FROM users WHERE id = 1").unwrap().rows;
        assert_eq!(rows, vec![vec![Value::Int(1), Value::Text("Alicia".into())]]);
        assert_eq!(db.query("SELECT * FROM users").unwrap().rows.len(), 2);
    }

    #[test]
    fn test_referential_integrity() {
        let mut db = users_db();
        db.execute(
            "CREATE TABLE orders (oid INTEGER PRIMARY KEY, uid INTEGER, \
             FOREIGN KEY (uid) REFERENCES users(id))",
        )
        .unwrap();

        db.execute("INSERT INTO orders VALUES (100, 1)").unwrap();

        let missing_parent = db.execute("INSERT INTO orders VALUES (101, 9)");
        assert!(matches!(
            missing_parent,
            Err(DbError::ReferentialIntegrity(_))
        ));

        let delete_parent = db.execute("DELETE FROM users WHERE id = 1");
        assert!(matches!(
            delete_parent,
            Err(DbError::ReferentialIntegrity(_))
        ));
        // The aborted delete removed nothing.
        assert_eq!(db.query("SELECT * FROM users").unwrap().rows.len(), 2);

        // A null foreign key is always allowed.
        db.execute("INSERT INTO orders VALUES (102, NULL)").unwrap();
        // Unreferenced parents can go.
        db.execute("DELETE FROM users WHERE id = 2").unwrap();
    }

    #[test]
    fn test_fk_must_reference_primary_key() {
        let mut db = users_db();
        let result = db.execute(
            "CREATE TABLE orders (oid INTEGER PRIMARY KEY, uname TEXT, \
             FOREIGN KEY (uname) REFERENCES users(name))",
        );
        assert!(matches!(result, Err(DbError::Schema(_))));
    }

    #[test]
    fn test_self_referencing_table() {
        let mut db = Database::new();
        db.execute(
            "CREATE TABLE employees (id INTEGER PRIMARY KEY, boss INTEGER, \
             FOREIGN KEY (boss) REFERENCES employees(id))",
        )
        .unwrap();
        db.execute("INSERT INTO employees VALUES (1, NULL)").unwrap();
        db.execute("INSERT INTO employees VALUES (2, 1)").unwrap();

        let orphan = db.execute("INSERT INTO employees VALUES (3, 99)");
        assert!(matches!(orphan, Err(DbError::ReferentialIntegrity(_))));

        let delete_boss = db.execute("DELETE FROM employees WHERE id = 1");
        assert!(matches!(delete_boss, Err(DbError::ReferentialIntegrity(_))));
    }

    #[test]
    fn test_transaction_rollback_restores_state() {
        let mut db = users_db();
        let before = observable_state(&db);

        db.execute("BEGIN").unwrap();
        db.execute("INSERT INTO users VALUES (3, 'Cara')").unwrap();
        db.execute("INSERT INTO users VALUES (4, 'Dan')").unwrap();
        db.execute("UPDATE users SET name = 'Bobby' WHERE id = 2")
            .unwrap();
        db.execute("DELETE FROM users WHERE id = 1").unwrap();
        db.execute("ROLLBACK").unwrap();

        assert_eq!(observable_state(&db), before);
        assert!(!db.txn.is_active());
    }

    #[test]
    fn test_commit_is_durable_within_session() {
        let mut db = users_db();

        db.execute("BEGIN").unwrap();
        db.execute("INSERT INTO users VALUES (3, 'Cara')").unwrap();
        db.execute("COMMIT").unwrap();

        // ROLLBACK after COMMIT has nothing to undo.
        db.execute("ROLLBACK").unwrap();
        assert_eq!(db.query("SELECT * FROM users").unwrap().rows.len(), 3);
    }

    #[test]
    fn test_nested_begin_fails() {
        let mut db = users_db();
        db.execute("BEGIN").unwrap();
        assert!(matches!(
            db.execute("BEGIN"),
            Err(DbError::Transaction(_))
        ));
        // The original transaction still works.
        db.execute("INSERT INTO users VALUES (3, 'Cara')").unwrap();
        db.execute("ROLLBACK").unwrap();
        assert_eq!(db.query("SELECT * FROM users").unwrap().rows.len(), 2);
    }

    #[test]
    fn test_commit_rollback_outside_transaction_are_noops() {
        let mut db = users_db();
        db.execute("COMMIT").unwrap();
        db.execute("ROLLBACK").unwrap();
        assert_eq!(db.query("SELECT * FROM users").unwrap().rows.len(), 2);
    }

    #[test]
    fn test_rollback_of_delete_restores_rid_and_indexes() {
        let mut db = users_db();

        db.execute("BEGIN").unwrap();
        db.execute("DELETE FROM users WHERE id = 1").unwrap();
        db.execute("ROLLBACK").unwrap();

        // The restored row kept its identity and its index entries.
        let table = db.get_table("users").unwrap();
        let rids: Vec<RowId> = table.scan().map(|(rid, _)| rid).collect();
        assert_eq!(rids, vec![1, 2]);
        assert!(table.pk_index().unwrap().contains(&Value::Int(1)));

        let result = db.query("SELECT * FROM users WHERE id = 1").unwrap();
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn test_autocommit_outside_transaction() {
        let mut db = users_db();
        db.execute("INSERT INTO users VALUES (3, 'Cara')").unwrap();
        // Nothing was logged, so a later BEGIN/ROLLBACK pair undoes nothing.
        db.execute("BEGIN").unwrap();
        db.execute("ROLLBACK").unwrap();
        assert_eq!(db.query("SELECT * FROM users").unwrap().rows.len(), 3);
    }

    #[test]
    fn test_update_self_match_is_not_a_violation() {
        let mut db = users_db();
        let count = db
            .execute("UPDATE users SET id = 1, name = 'Alice' WHERE id = 1")
            .unwrap();
        match count {
            Output::Count(n) => assert_eq!(n, 1),
            other => panic!("expected a row count, got {other:?}"),
        }
    }

    #[test]
    fn test_update_converging_on_unique_value_fails_atomically() {
        let mut db = users_db();
        let result = db.execute("UPDATE users SET name = 'X'");
        assert!(matches!(result, Err(DbError::Constraint(_))));

        // Neither row changed.
        let rows = db.query("SELECT name FROM users").unwrap().rows;
        assert_eq!(
            rows,
            vec![
                vec![Value::Text("Alice".into())],
                vec![Value::Text("Bob".into())]
            ]
        );
    }

    #[test]
    fn test_update_pk_change_rejected_when_taken() {
        let mut db = users_db();
        let result = db.execute("UPDATE users SET id = 2 WHERE id = 1");
        assert!(matches!(result, Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_insert_with_column_reordering_and_nulls() {
        let mut db = Database::new();
        db.execute("CREATE TABLE t (id INTEGER, name TEXT, age INTEGER)")
            .unwrap();
        db.execute("INSERT INTO t (name, id) VALUES ('Charlie', 3)")
            .unwrap();

        let result = db.query("SELECT id, name, age FROM t").unwrap();
        assert_eq!(
            result.rows,
            vec![vec![
                Value::Int(3),
                Value::Text("Charlie".into()),
                Value::Null
            ]]
        );
    }

    #[test]
    fn test_insert_unknown_column_rejected() {
        let mut db = users_db();
        let result = db.execute("INSERT INTO users (id, nick) VALUES (3, 'C')");
        assert!(matches!(result, Err(DbError::Schema(_))));
    }

    #[test]
    fn test_type_error_leaves_state_unchanged() {
        let mut db = users_db();
        let before = observable_state(&db);

        assert!(matches!(
            db.execute("INSERT INTO users VALUES ('x', 'Cara')"),
            Err(DbError::Type(_))
        ));
        assert!(matches!(
            db.execute("UPDATE users SET id = 'x' WHERE id = 1"),
            Err(DbError::Type(_))
        ));

        assert_eq!(observable_state(&db), before);
    }

    #[test]
    fn test_arity_error() {
        let mut db = users_db();
        let result = db.execute("INSERT INTO users VALUES (3)");
        assert!(matches!(
            result,
            Err(DbError::Arity {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn test_unknown_table_errors() {
        let mut db = Database::new();
        assert!(matches!(
            db.execute("INSERT INTO ghosts VALUES (1)"),
            Err(DbError::Schema(_))
        ));
        assert!(matches!(
            db.query("SELECT * FROM ghosts"),
            Err(DbError::Schema(_))
        ));
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let mut db = users_db();
        let result = db.execute("CREATE TABLE users (id INTEGER)");
        assert!(matches!(result, Err(DbError::Schema(_))));
    }

    #[test]
    fn test_date_and_boolean_coercions_via_sql() {
        let mut db = Database::new();
        db.execute("CREATE TABLE flags (on_day DATE, active BOOLEAN)")
            .unwrap();
        db.execute("INSERT INTO flags VALUES ('2024-03-01', TRUE)")
            .unwrap();
        db.execute("INSERT INTO flags VALUES ('2024-03-02', 'false')")
            .unwrap();

        let result = db.query("SELECT * FROM flags WHERE active = FALSE").unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][1], Value::Bool(false));

        let bad_date = db.execute("INSERT INTO flags VALUES ('not-a-date', TRUE)");
        assert!(matches!(bad_date, Err(DbError::Type(_))));
    }

    #[test]
    fn test_integer_literal_accepted_in_real_column() {
        let mut db = Database::new();
        db.execute("CREATE TABLE m (amt REAL)").unwrap();
        db.execute("INSERT INTO m VALUES (100)").unwrap();
        let result = db.query("SELECT amt FROM m").unwrap();
        assert_eq!(result.rows, vec![vec![Value::Real(100.0)]]);
    }

    #[test]
    fn test_index_maintained_through_update_and_visible_in_plan() {
        let mut db = Database::new();
        db.execute("CREATE TABLE people (id INTEGER PRIMARY KEY, city TEXT)")
            .unwrap();
        db.execute("CREATE INDEX idx_city ON people (city)").unwrap();
        db.execute("INSERT INTO people VALUES (1, 'Lyon')").unwrap();
        db.execute("INSERT INTO people VALUES (2, 'Nantes')").unwrap();
        db.execute("UPDATE people SET city = 'Brest' WHERE id = 1")
            .unwrap();

        let result = db.query("SELECT * FROM people WHERE city = 'Brest'").unwrap();
        assert_eq!(
            result.scan,
            ScanKind::IndexScan {
                index: "idx_city".into()
            }
        );
        assert_eq!(result.rows.len(), 1);

        let stale = db.query("SELECT * FROM people WHERE city = 'Lyon'").unwrap();
        assert!(stale.rows.is_empty());
    }
}
