//! Output schemas of plan nodes.

use crate::expr::column_expr::ColumnExpr;
use crate::expr::Expression;
use crate::types::ValueType;

/// Table name used for columns synthesized by plan nodes rather than read
/// from a catalog table.
pub const TEMP_TABLE_NAME: &str = "TEMP_TABLE";

/// Single column produced by data modifying statements.
pub const MODIFIED_TUPLES_COLUMN: &str = "modified_tuples";

/// Column carrying the physical tuple address into updates and deletes.
pub const TUPLE_ADDRESS_COLUMN: &str = "tuple_address";

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaColumn {
    pub table: String,
    pub column: String,
    pub alias: String,
    /// Expression computing this column from the node's input.
    pub expr: Expression,
    pub value_type: ValueType,
    pub value_size: usize,
}

impl SchemaColumn {
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        alias: impl Into<String>,
        expr: Expression,
    ) -> Self {
        let value_type = expr.value_type();
        let value_size = expr.value_size();
        SchemaColumn {
            table: table.into(),
            column: column.into(),
            alias: alias.into(),
            expr,
            value_type,
            value_size,
        }
    }

    /// Name to show for this column.
    pub fn name(&self) -> &str {
        if self.alias.is_empty() {
            &self.column
        } else {
            &self.alias
        }
    }

    pub fn is_temp(&self) -> bool {
        self.table == TEMP_TABLE_NAME
    }

    /// Create a column reference pointing at this column at position `idx`.
    pub fn as_column_ref(&self, idx: usize) -> Expression {
        Expression::Column(ColumnExpr::new(
            self.table.clone(),
            self.column.clone(),
            self.alias.clone(),
            idx,
            self.value_type,
            self.value_size,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeSchema {
    pub columns: Vec<SchemaColumn>,
}

impl NodeSchema {
    pub fn new(columns: Vec<SchemaColumn>) -> Self {
        NodeSchema { columns }
    }

    /// Schema of the single row count column returned by inserts, updates
    /// and deletes.
    pub fn modified_tuples() -> Self {
        let expr = modified_tuples_column_ref();
        NodeSchema::new(vec![SchemaColumn::new(
            TEMP_TABLE_NAME,
            MODIFIED_TUPLES_COLUMN,
            MODIFIED_TUPLES_COLUMN,
            expr,
        )])
    }

    pub fn push(&mut self, column: SchemaColumn) {
        self.columns.push(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&SchemaColumn> {
        self.columns.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaColumn> {
        self.columns.iter()
    }

    /// Find the position of a column.
    ///
    /// Table columns are matched on table and column name, preferring a
    /// column whose alias also matches. Columns synthesized by other nodes
    /// only carry an alias and are matched on that.
    pub fn find_index(&self, table: &str, column: &str, alias: &str) -> Option<usize> {
        if !column.is_empty() {
            let mut candidate = None;
            for (idx, col) in self.columns.iter().enumerate() {
                if col.table.eq_ignore_ascii_case(table)
                    && col.column.eq_ignore_ascii_case(column)
                {
                    if col.alias.eq_ignore_ascii_case(alias) {
                        return Some(idx);
                    }
                    candidate.get_or_insert(idx);
                }
            }
            if candidate.is_some() {
                return candidate;
            }
        }

        if alias.is_empty() {
            return None;
        }

        self.columns.iter().position(|col| {
            (col.is_temp() || col.column.is_empty()) && col.alias.eq_ignore_ascii_case(alias)
        })
    }

    pub fn find(&self, table: &str, column: &str, alias: &str) -> Option<&SchemaColumn> {
        self.find_index(table, column, alias)
            .map(|idx| &self.columns[idx])
    }

    /// Produce the expression computing `column` from rows of this schema.
    ///
    /// If this schema already contains the column, the result is a plain
    /// reference to it. Otherwise the column's expression is returned with
    /// its column references resolved against this schema.
    pub fn bind_column(&self, column: &SchemaColumn) -> Expression {
        match self.find_index(&column.table, &column.column, &column.alias) {
            Some(idx) => self.columns[idx].as_column_ref(idx),
            None => {
                let mut expr = column.expr.clone();
                expr.resolve_columns(self);
                expr
            }
        }
    }
}

/// Reference to the modified tuples column in a DML node's output.
pub fn modified_tuples_column_ref() -> Expression {
    Expression::Column(ColumnExpr::new(
        TEMP_TABLE_NAME,
        MODIFIED_TUPLES_COLUMN,
        MODIFIED_TUPLES_COLUMN,
        0,
        ValueType::BigInt,
        ValueType::BigInt.default_size(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{add, column, lit};

    fn schema() -> NodeSchema {
        NodeSchema::new(vec![
            SchemaColumn::new("t", "a", "a", column("t", "a", ValueType::Integer)),
            SchemaColumn::new("t", "b", "b", column("t", "b", ValueType::Integer)),
            SchemaColumn::new(
                TEMP_TABLE_NAME,
                "",
                "total",
                column(TEMP_TABLE_NAME, "", ValueType::BigInt),
            ),
        ])
    }

    #[test]
    fn find_by_table_column() {
        let schema = schema();
        assert_eq!(Some(1), schema.find_index("T", "b", "b"));
        // Aliased in the select list.
        assert_eq!(Some(0), schema.find_index("t", "a", "x"));
        assert_eq!(None, schema.find_index("u", "a", "a"));
    }

    #[test]
    fn find_synthesized_by_alias() {
        let schema = schema();
        assert_eq!(Some(2), schema.find_index(TEMP_TABLE_NAME, "", "total"));
        assert_eq!(Some(2), schema.find_index("", "total", "total"));
        // Table columns aren't matched by alias alone.
        assert_eq!(None, schema.find_index("", "", "a"));
    }

    #[test]
    fn bind_existing_column() {
        let schema = schema();
        let col = SchemaColumn::new("t", "b", "b", column("t", "b", ValueType::Integer));
        let bound = schema.bind_column(&col);
        assert_eq!(1, bound.as_column().unwrap().column_idx);
    }

    #[test]
    fn bind_computed_column() {
        let schema = schema();
        let col = SchemaColumn::new(
            TEMP_TABLE_NAME,
            "",
            "b_plus",
            add(column("t", "b", ValueType::Integer), lit(1)),
        );
        let bound = schema.bind_column(&col);
        let Expression::Arith(arith) = bound else {
            panic!("expected arith");
        };
        assert_eq!(1, arith.left.as_column().unwrap().column_idx);
    }

    #[test]
    fn modified_tuples_schema() {
        let schema = NodeSchema::modified_tuples();
        assert_eq!(1, schema.len());
        assert_eq!(MODIFIED_TUPLES_COLUMN, schema.columns[0].name());
        assert_eq!(ValueType::BigInt, schema.columns[0].value_type);
    }
}
