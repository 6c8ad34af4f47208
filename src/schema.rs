use serde::{Deserialize, Serialize};

use crate::data_type::DataType;
use crate::error::{DbError, Result};

/// Reference from a column to the primary key column of another table.
///
/// Modeled as a named relation rather than a pointer: resolution happens
/// against the target table's primary-key index on every validating
/// operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Name of the referenced table.
    pub table: String,
    /// Name of the referenced column, which must be that table's primary key.
    pub column: String,
}

/// Column definition in the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub references: Option<ForeignKey>,
}

impl ColumnDef {
    /// A plain nullable column with no constraints.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            not_null: false,
            primary_key: false,
            unique: false,
            references: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ForeignKey {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    /// True when the column may not hold duplicate non-null values.
    /// PRIMARY KEY implies UNIQUE.
    pub fn enforces_unique(&self) -> bool {
        self.primary_key || self.unique
    }

    /// True when the column may not hold null. PRIMARY KEY implies NOT NULL.
    pub fn rejects_null(&self) -> bool {
        self.primary_key || self.not_null
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnDef>,
}

impl Schema {
    /// Builds a schema, rejecting duplicate column names and more than one
    /// PRIMARY KEY column.
    ///
    /// # Errors
    /// Returns [DbError::Schema] on a duplicate definition.
    pub fn new(columns: Vec<ColumnDef>) -> Result<Self> {
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(DbError::Schema(format!(
                    "duplicate column {:?}",
                    col.name
                )));
            }
        }
        let pk_count = columns.iter().filter(|c| c.primary_key).count();
        if pk_count > 1 {
            return Err(DbError::Schema(
                "more than one PRIMARY KEY column".into(),
            ));
        }
        Ok(Self { columns })
    }

    /// Number of columns, which every stored tuple must match.
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    /// Position of the named column, if it exists.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The primary key column and its position, if one is declared.
    pub fn primary_key(&self) -> Option<(usize, &ColumnDef)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.primary_key)
    }
}
