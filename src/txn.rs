use crate::error::{DbError, Result};
use crate::table::RowId;
use crate::value::Value;

/// A record sufficient to reverse one mutation, replayed in reverse order
/// on rollback.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoEntry {
    /// Reverses an insert by deleting the row.
    Insert { table: String, rid: RowId },
    /// Reverses an update by restoring the full pre-image tuple.
    Update {
        table: String,
        rid: RowId,
        tuple: Vec<Value>,
    },
    /// Reverses a delete by re-inserting the tuple under its original rid.
    Delete {
        table: String,
        rid: RowId,
        tuple: Vec<Value>,
    },
}

/// Single-writer undo log with explicit begin/commit/rollback.
///
/// When no transaction is active every mutation auto-commits: the log_*
/// calls are no-ops and nothing is retained. There are no nested or
/// concurrent transactions.
#[derive(Debug, Default)]
pub struct TransactionManager {
    active: bool,
    undo: Vec<UndoEntry>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of undo entries accumulated in the current transaction.
    pub fn pending(&self) -> usize {
        self.undo.len()
    }

    /// Opens a transaction with an empty undo log.
    ///
    /// # Errors
    /// [DbError::Transaction] when one is already open.
    pub fn begin(&mut self) -> Result<()> {
        if self.active {
            return Err(DbError::Transaction(
                "a transaction is already active".into(),
            ));
        }
        self.active = true;
        self.undo.clear();
        Ok(())
    }

    /// Discards the undo log and returns to idle. Returns `false` when no
    /// transaction was active, which callers treat as a warned no-op.
    pub fn commit(&mut self) -> bool {
        let was_active = self.active;
        self.active = false;
        self.undo.clear();
        was_active
    }

    /// Closes the transaction and hands the undo log to the caller for
    /// reverse replay. `None` when no transaction was active.
    pub fn take_undo_log(&mut self) -> Option<Vec<UndoEntry>> {
        if !self.active {
            return None;
        }
        self.active = false;
        Some(std::mem::take(&mut self.undo))
    }

    pub fn log_insert(&mut self, table: &str, rid: RowId) {
        if self.active {
            self.undo.push(UndoEntry::Insert {
                table: table.to_string(),
                rid,
            });
        }
    }

    pub fn log_update(&mut self, table: &str, rid: RowId, pre_image: Vec<Value>) {
        if self.active {
            self.undo.push(UndoEntry::Update {
                table: table.to_string(),
                rid,
                tuple: pre_image,
            });
        }
    }

    pub fn log_delete(&mut self, table: &str, rid: RowId, tuple: Vec<Value>) {
        if self.active {
            self.undo.push(UndoEntry::Delete {
                table: table.to_string(),
                rid,
                tuple,
            });
        }
    }
}
