use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ValueType;

/// Reference to a column, either of a catalog table or of some intermediate
/// (temp) table produced by another plan node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnExpr {
    pub table: String,
    pub column: String,
    #[serde(default)]
    pub alias: String,
    /// Index of the referenced column in the input schema.
    ///
    /// Resolved when output schemas are generated.
    #[serde(default)]
    pub column_idx: usize,
    pub value_type: ValueType,
    #[serde(default)]
    pub value_size: usize,
}

impl ColumnExpr {
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        alias: impl Into<String>,
        column_idx: usize,
        value_type: ValueType,
        value_size: usize,
    ) -> Self {
        ColumnExpr {
            table: table.into(),
            column: column.into(),
            alias: alias.into(),
            column_idx,
            value_type,
            value_size,
        }
    }

    /// Name used when displaying this column.
    pub fn display_name(&self) -> &str {
        if self.column.is_empty() {
            &self.alias
        } else {
            &self.column
        }
    }
}

impl fmt::Display for ColumnExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.table.is_empty() {
            write!(f, "{}", self.display_name())
        } else {
            write!(f, "{}.{}", self.table, self.display_name())
        }
    }
}
