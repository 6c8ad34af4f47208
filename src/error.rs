use thiserror::Error;

/// Crate-wide error type.
///
/// One variant per failure class the engine can surface. Statement
/// execution never panics on bad input; every public entry point returns
/// [`Result`] and callers decide whether to retry, rollback, or report.
#[derive(Error, Debug)]
pub enum DbError {
    /// The SQL text could not be tokenized, or the token stream did not
    /// match any statement form. `at` is the byte offset of the offending
    /// token in the input.
    #[error("syntax error at offset {at}: {detail}")]
    Syntax { at: usize, detail: String },

    /// Unknown table, unknown column, or a duplicate definition.
    #[error("schema error: {0}")]
    Schema(String),

    /// A value could not be coerced to the declared column type.
    #[error("type error: {0}")]
    Type(String),

    /// Tuple length does not match the table's column count.
    #[error("expected {expected} values, got {got}")]
    Arity { expected: usize, got: usize },

    /// NOT NULL, UNIQUE, or PRIMARY KEY violated.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A foreign key references a missing parent, or a delete would
    /// orphan child rows.
    #[error("referential integrity violation: {0}")]
    ReferentialIntegrity(String),

    /// A bare column name resolves to more than one source column.
    #[error("ambiguous column name: {0}")]
    AmbiguousColumn(String),

    /// Nested BEGIN, or a failure while replaying the undo log.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A snapshot failed decoding or post-load invariant verification.
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// I/O failure during persistence.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;
