use crate::schema::{ColumnDef, ForeignKey};
use crate::value::Value;

/// Represents the top-level SQL statements supported by the database.
/// This enum is the entry point of the Abstract Syntax Tree (AST).
#[derive(Debug, PartialEq)]
pub enum Statement {
    /// An instruction to create a new table schema.
    CreateTable(CreateTable),
    /// An instruction to declare an explicit index on a column.
    CreateIndex(CreateIndex),
    /// An instruction to insert a new row into an existing table.
    Insert(Insert),
    /// An instruction to query and retrieve data.
    Select(Select),
    /// An instruction to modify existing rows.
    Update(Update),
    /// An instruction to remove rows.
    Delete(Delete),
    /// Opens a transaction.
    Begin,
    /// Closes the transaction, keeping its effects.
    Commit,
    /// Closes the transaction, reversing its effects.
    Rollback,
}

/// Data structure representing a `CREATE TABLE` SQL statement.
#[derive(Debug, PartialEq)]
pub struct CreateTable {
    /// The unique name of the table to be created.
    pub name: String,
    /// Column definitions, including names, data types, and constraints.
    /// Table-level FOREIGN KEY clauses arrive separately and are merged
    /// into these by the dispatcher.
    pub columns: Vec<ColumnDef>,
    /// `FOREIGN KEY (col) REFERENCES table(col)` clauses.
    pub foreign_keys: Vec<ForeignKeyDef>,
}

/// A table-level foreign key clause, naming the constrained column.
#[derive(Debug, PartialEq)]
pub struct ForeignKeyDef {
    pub column: String,
    pub references: ForeignKey,
}

/// Data structure representing a `CREATE INDEX` statement.
#[derive(Debug, PartialEq)]
pub struct CreateIndex {
    pub name: String,
    pub table: String,
    pub column: String,
}

/// Data structure representing an `INSERT INTO` SQL statement.
#[derive(Debug, PartialEq)]
pub struct Insert {
    /// The name of the target table where data will be inserted.
    pub table: String,
    /// An optional list of column names to target.
    /// If `None`, values are expected to match the table's schema order.
    pub columns: Option<Vec<String>>,
    /// The literal values to be stored in the new row.
    pub values: Vec<Value>,
}

/// A possibly table-qualified column reference (`col` or `table.col`).
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn bare(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
        }
    }

    /// The reference as it was written, used for result column labels.
    pub fn label(&self) -> String {
        match &self.table {
            Some(t) => format!("{t}.{}", self.column),
            None => self.column.clone(),
        }
    }
}

/// One projected item in a `SELECT` list.
#[derive(Debug, PartialEq)]
pub enum ProjItem {
    /// The `*` wildcard: all columns of the source(s).
    Star,
    /// A single column.
    Column(ColumnRef),
    /// An aggregate function application.
    Aggregate(Aggregate),
}

/// The aggregation functions supported in projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggFunc {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// The argument of an aggregate: `*` (rows) or a column.
#[derive(Debug, Clone, PartialEq)]
pub enum AggArg {
    Star,
    Column(ColumnRef),
}

#[derive(Debug, PartialEq)]
pub struct Aggregate {
    pub func: AggFunc,
    pub arg: AggArg,
}

/// A single `JOIN <table> ON <left> = <right>` clause. Both sides are
/// table-qualified references.
#[derive(Debug, PartialEq)]
pub struct Join {
    pub table: String,
    pub left: ColumnRef,
    pub right: ColumnRef,
}

/// Represents a comparison operation between a column and a literal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (`=`)
    Eq,
    /// Not equal (`!=`)
    Ne,
    /// Lower than (`<`)
    Lt,
    /// Lower than or equal (`<=`)
    Le,
    /// Greater than (`>`)
    Gt,
    /// Greater than or equal (`>=`)
    Ge,
    /// `LIKE` pattern matching with `%` and `_` wildcards.
    Like,
}

/// One conjunct of a `WHERE` clause: `column OP literal`.
///
/// The clause as a whole is a flat conjunction; there is no nesting and no
/// operator between predicates other than `AND`.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: ColumnRef,
    pub op: CompareOp,
    pub value: Value,
}

/// Sort direction for an `ORDER BY` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, PartialEq)]
pub struct OrderByClause {
    pub column: ColumnRef,
    pub direction: SortDirection,
}

/// Data structure representing a `SELECT` SQL statement.
#[derive(Debug, PartialEq)]
pub struct Select {
    /// The projection of the query.
    pub projection: Vec<ProjItem>,
    /// The left (or sole) source table.
    pub table: String,
    /// Optional hash-equi-join against a second table.
    pub join: Option<Join>,
    /// Conjunction of filter predicates; empty means match all.
    pub predicates: Vec<Predicate>,
    /// Grouping columns; empty with aggregates present means one implicit
    /// group over all rows.
    pub group_by: Vec<String>,
    pub order_by: Vec<OrderByClause>,
    pub limit: Option<usize>,
}

/// Data structure representing an `UPDATE` statement.
#[derive(Debug, PartialEq)]
pub struct Update {
    pub table: String,
    /// `SET col = literal` pairs, applied left to right.
    pub assignments: Vec<(String, Value)>,
    pub predicates: Vec<Predicate>,
}

/// Data structure representing a `DELETE` statement.
#[derive(Debug, PartialEq)]
pub struct Delete {
    pub table: String,
    pub predicates: Vec<Predicate>,
}
