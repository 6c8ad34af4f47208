use std::fmt;

use serde::{Deserialize, Serialize};

/// Represents the supported data types in the database schema.
/// These types define the structure of columns and the expected format of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// A 64-bit signed integer.
    Integer,
    /// A 64-bit floating-point number.
    Real,
    /// A variable-length UTF-8 character string.
    Text,
    /// A boolean value (true or false).
    Boolean,
    /// A calendar date without a time component.
    Date,
}

impl DataType {
    /// The SQL keyword naming this type, as accepted by `CREATE TABLE`.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}
