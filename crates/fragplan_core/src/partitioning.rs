//! Partitioning context shared between the caller and the assembler.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::expr::Expression;
use crate::types::ScalarValue;

/// Value of the partitioning column a statement is known to touch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitioningValue {
    Constant(ScalarValue),
    /// Only known once the parameter at this index is bound.
    Parameter(usize),
}

impl PartitioningValue {
    /// Extract a partitioning value from an expression if it's known at
    /// compile time.
    ///
    /// NULL doesn't hash to any partition, so it never routes a statement.
    pub fn from_expression(expr: &Expression) -> Option<Self> {
        match expr {
            Expression::Literal(literal) if !literal.value.is_null() => {
                Some(PartitioningValue::Constant(literal.value.clone()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for PartitioningValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(v) => write!(f, "{v}"),
            Self::Parameter(idx) => write!(f, "?{idx}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionColumn {
    pub table: String,
    pub column: String,
}

impl PartitionColumn {
    pub fn matches(&self, table: &str, column: &str) -> bool {
        self.table.eq_ignore_ascii_case(table) && self.column.eq_ignore_ascii_case(column)
    }
}

impl fmt::Display for PartitionColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Partitioning state for a single statement.
///
/// Created by the caller, read and updated in place by the assembler.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartitioningForStatement {
    specified_single: bool,
    count_of_partitioned_tables: usize,
    column: Option<PartitionColumn>,
    effective_value: Option<PartitioningValue>,
    /// Expressions assigned to partitioning columns, keyed by "table.column".
    partitioning_exprs: IndexMap<String, Expression>,
}

impl PartitioningForStatement {
    pub fn new(specified_single: bool) -> Self {
        PartitioningForStatement {
            specified_single,
            ..Default::default()
        }
    }

    pub fn single_partition() -> Self {
        Self::new(true)
    }

    pub fn multi_partition() -> Self {
        Self::new(false)
    }

    /// If the statement was declared to run on a single partition.
    pub fn was_specified_as_single(&self) -> bool {
        self.specified_single
    }

    pub fn set_count_of_partitioned_tables(&mut self, count: usize) {
        self.count_of_partitioned_tables = count;
    }

    pub fn count_of_partitioned_tables(&self) -> usize {
        self.count_of_partitioned_tables
    }

    pub fn set_partitioning_column(&mut self, column: Option<PartitionColumn>) {
        self.column = column;
    }

    pub fn partitioning_column(&self) -> Option<&PartitionColumn> {
        self.column.as_ref()
    }

    pub fn add_partitioning_expression(&mut self, key: impl Into<String>, expr: Expression) {
        self.partitioning_exprs.insert(key.into(), expr);
    }

    pub fn partitioning_expressions(&self) -> &IndexMap<String, Expression> {
        &self.partitioning_exprs
    }

    pub fn set_effective_value(&mut self, value: Option<PartitioningValue>) {
        self.effective_value = value;
    }

    pub fn effective_partitioning_value(&self) -> Option<&PartitioningValue> {
        self.effective_value.as_ref()
    }

    /// A partitioning value was inferred for the statement, allowing it to
    /// run on a single partition.
    pub fn has_partitioning_value_locked_in(&self) -> bool {
        self.effective_value.is_some()
    }

    /// Work for the statement happens on exactly one partition, so no
    /// send/receive boundary is needed.
    pub fn is_single_partition(&self) -> bool {
        self.specified_single || self.has_partitioning_value_locked_in()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::literal_expr::LiteralExpr;
    use crate::expr::{lit, param};
    use crate::types::ValueType;

    #[test]
    fn extract_value() {
        assert_eq!(
            Some(PartitioningValue::Constant(ScalarValue::Int(4))),
            PartitioningValue::from_expression(&lit(4))
        );
        assert_eq!(None, PartitioningValue::from_expression(&param(0, ValueType::Integer)));
        assert_eq!(
            None,
            PartitioningValue::from_expression(&Expression::Literal(LiteralExpr::null()))
        );
    }

    #[test]
    fn locking_in_makes_single() {
        let mut p = PartitioningForStatement::multi_partition();
        assert!(!p.is_single_partition());

        p.set_effective_value(Some(PartitioningValue::Parameter(0)));
        assert!(p.has_partitioning_value_locked_in());
        assert!(p.is_single_partition());
        assert!(!p.was_specified_as_single());
    }
}
