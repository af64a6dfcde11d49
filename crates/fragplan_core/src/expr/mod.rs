pub mod aggregate_expr;
pub mod arith_expr;
pub mod coerce;
pub mod column_expr;
pub mod comparison_expr;
pub mod literal_expr;

use std::fmt;

use aggregate_expr::{AggregateExpr, AggregateFunction};
use arith_expr::{ArithExpr, ArithOperator};
use column_expr::ColumnExpr;
use comparison_expr::{ComparisonExpr, ComparisonOperator, ConjunctionExpr, ConjunctionOperator};
use literal_expr::{LiteralExpr, ParameterExpr};
use serde::{Deserialize, Serialize};

use crate::schema::NodeSchema;
use crate::types::{ScalarValue, ValueType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Column(ColumnExpr),
    Literal(LiteralExpr),
    Parameter(ParameterExpr),
    Aggregate(AggregateExpr),
    Arith(ArithExpr),
    Comparison(ComparisonExpr),
    Conjunction(ConjunctionExpr),
    /// Physical address of the current tuple, used by updates and deletes.
    TupleAddress,
}

impl Expression {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Column(e) => e.value_type,
            Self::Literal(e) => e.value_type,
            Self::Parameter(e) => e.value_type,
            Self::Aggregate(e) => e.value_type,
            Self::Arith(e) => e.value_type,
            Self::Comparison(_) | Self::Conjunction(_) => ValueType::Boolean,
            Self::TupleAddress => ValueType::BigInt,
        }
    }

    pub fn value_size(&self) -> usize {
        match self {
            Self::Column(e) => e.value_size,
            Self::Literal(e) => e.value_size,
            Self::Parameter(e) => e.value_size,
            Self::Aggregate(e) => e.value_size,
            Self::Arith(e) => e.value_size,
            other => other.value_type().default_size(),
        }
    }

    pub const fn is_column_ref(&self) -> bool {
        matches!(self, Self::Column(_))
    }

    pub fn as_column(&self) -> Option<&ColumnExpr> {
        match self {
            Self::Column(col) => Some(col),
            _ => None,
        }
    }

    pub fn as_aggregate(&self) -> Option<&AggregateExpr> {
        match self {
            Self::Aggregate(agg) => Some(agg),
            _ => None,
        }
    }

    /// Check if this expression or any of its children is an aggregate.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Self::Aggregate(_) => true,
            Self::Arith(e) => e.left.contains_aggregate() || e.right.contains_aggregate(),
            Self::Comparison(e) => e.left.contains_aggregate() || e.right.contains_aggregate(),
            Self::Conjunction(e) => e.expressions.iter().any(|e| e.contains_aggregate()),
            Self::Column(_) | Self::Literal(_) | Self::Parameter(_) | Self::TupleAddress => false,
        }
    }

    /// Check if any parameter appears in this expression.
    pub fn contains_parameter(&self) -> bool {
        match self {
            Self::Parameter(_) => true,
            Self::Aggregate(e) => e.input.as_ref().is_some_and(|e| e.contains_parameter()),
            Self::Arith(e) => e.left.contains_parameter() || e.right.contains_parameter(),
            Self::Comparison(e) => e.left.contains_parameter() || e.right.contains_parameter(),
            Self::Conjunction(e) => e.expressions.iter().any(|e| e.contains_parameter()),
            Self::Column(_) | Self::Literal(_) | Self::TupleAddress => false,
        }
    }

    /// Point column references at their position in `input`.
    ///
    /// Columns that can't be found in the input are left untouched. These are
    /// columns produced by the node owning this expression.
    pub fn resolve_columns(&mut self, input: &NodeSchema) {
        match self {
            Self::Column(col) => {
                if let Some(idx) = input.find_index(&col.table, &col.column, &col.alias) {
                    col.column_idx = idx;
                }
            }
            Self::Aggregate(e) => {
                if let Some(expr) = e.input.as_mut() {
                    expr.resolve_columns(input);
                }
            }
            Self::Arith(e) => {
                e.left.resolve_columns(input);
                e.right.resolve_columns(input);
            }
            Self::Comparison(e) => {
                e.left.resolve_columns(input);
                e.right.resolve_columns(input);
            }
            Self::Conjunction(e) => {
                for expr in &mut e.expressions {
                    expr.resolve_columns(input);
                }
            }
            Self::Literal(_) | Self::Parameter(_) | Self::TupleAddress => (),
        }
    }

    /// Force the output type of an expression that computes a new value.
    ///
    /// Column references and aggregates keep their types.
    pub fn set_output_type(&mut self, value_type: ValueType, value_size: usize) {
        match self {
            Self::Literal(e) => {
                e.value_type = value_type;
                e.value_size = value_size;
            }
            Self::Parameter(e) => {
                e.value_type = value_type;
                e.value_size = value_size;
            }
            Self::Arith(e) => {
                e.value_type = value_type;
                e.value_size = value_size;
            }
            _ => (),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(e) => write!(f, "{e}"),
            Self::Literal(e) => write!(f, "{e}"),
            Self::Parameter(e) => write!(f, "{e}"),
            Self::Aggregate(e) => write!(f, "{e}"),
            Self::Arith(e) => write!(f, "{e}"),
            Self::Comparison(e) => write!(f, "{e}"),
            Self::Conjunction(e) => write!(f, "{e}"),
            Self::TupleAddress => write!(f, "tuple_address"),
        }
    }
}

/// Reference a table column with its alias set to the column name.
pub fn column(
    table: impl Into<String>,
    name: impl Into<String>,
    value_type: ValueType,
) -> Expression {
    let name = name.into();
    Expression::Column(ColumnExpr::new(
        table,
        name.clone(),
        name,
        0,
        value_type,
        value_type.default_size(),
    ))
}

pub fn lit(value: impl Into<ScalarValue>) -> Expression {
    Expression::Literal(LiteralExpr::new(value.into()))
}

pub fn param(index: usize, value_type: ValueType) -> Expression {
    Expression::Parameter(ParameterExpr {
        index,
        value_type,
        value_size: value_type.default_size(),
    })
}

pub fn aggregate(function: AggregateFunction, input: Option<Expression>) -> Expression {
    Expression::Aggregate(AggregateExpr::new(function, false, input))
}

pub fn distinct_aggregate(function: AggregateFunction, input: Expression) -> Expression {
    Expression::Aggregate(AggregateExpr::new(function, true, Some(input)))
}

pub fn arith(op: ArithOperator, left: Expression, right: Expression) -> Expression {
    Expression::Arith(ArithExpr::new(op, left, right))
}

pub fn add(left: Expression, right: Expression) -> Expression {
    arith(ArithOperator::Add, left, right)
}

pub fn compare(op: ComparisonOperator, left: Expression, right: Expression) -> Expression {
    Expression::Comparison(ComparisonExpr {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn eq(left: Expression, right: Expression) -> Expression {
    compare(ComparisonOperator::Eq, left, right)
}

pub fn and(expressions: impl IntoIterator<Item = Expression>) -> Expression {
    Expression::Conjunction(ConjunctionExpr {
        op: ConjunctionOperator::And,
        expressions: expressions.into_iter().collect(),
    })
}
