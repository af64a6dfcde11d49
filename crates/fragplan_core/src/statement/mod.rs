//! Parsed statements handed to the assembler.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::expr::Expression;
use crate::plan::plan_limit::LimitBound;
use crate::schema::{SchemaColumn, TEMP_TABLE_NAME};
use crate::types::ValueType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub index: usize,
    pub value_type: ValueType,
}

/// Fields shared by every statement kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatementCommon {
    #[serde(default)]
    pub sql: String,
    /// Tables touched by the statement.
    pub tables: Vec<String>,
    #[serde(default)]
    pub params: Vec<ParameterInfo>,
    #[serde(default)]
    pub where_clause: Option<Expression>,
}

impl StatementCommon {
    pub fn new<S: Into<String>>(
        sql: impl Into<String>,
        tables: impl IntoIterator<Item = S>,
    ) -> Self {
        StatementCommon {
            sql: sql.into(),
            tables: tables.into_iter().map(Into::into).collect(),
            params: Vec::new(),
            where_clause: None,
        }
    }

    pub fn with_params(mut self, params: impl IntoIterator<Item = ParameterInfo>) -> Self {
        self.params = params.into_iter().collect();
        self
    }

    pub fn with_where(mut self, predicate: Expression) -> Self {
        self.where_clause = Some(predicate);
        self
    }
}

/// A display, group by, or order by column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedColInfo {
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub column: String,
    #[serde(default)]
    pub alias: String,
    pub expr: Expression,
    /// Sort direction when used in ORDER BY.
    #[serde(default = "default_ascending")]
    pub ascending: bool,
}

fn default_ascending() -> bool {
    true
}

impl ParsedColInfo {
    /// Column info for a plain column reference.
    ///
    /// Any other expression is treated as computed, see [`ParsedColInfo::computed`].
    pub fn from_expr(expr: Expression) -> Self {
        let names = expr.as_column().map(|col| {
            let alias = if col.alias.is_empty() {
                col.column.clone()
            } else {
                col.alias.clone()
            };
            (col.table.clone(), col.column.clone(), alias)
        });

        match names {
            Some((table, column, alias)) => ParsedColInfo {
                table,
                column,
                alias,
                expr,
                ascending: true,
            },
            None => Self::computed("", expr),
        }
    }

    /// Column info for a computed expression with the given alias.
    pub fn computed(alias: impl Into<String>, expr: Expression) -> Self {
        ParsedColInfo {
            table: TEMP_TABLE_NAME.to_string(),
            column: String::new(),
            alias: alias.into(),
            expr,
            ascending: true,
        }
    }

    pub fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }

    pub fn to_schema_column(&self) -> SchemaColumn {
        SchemaColumn::new(
            self.table.clone(),
            self.column.clone(),
            self.alias.clone(),
            self.expr.clone(),
        )
    }

    /// Check if two column infos refer to the same value.
    fn same_value(&self, other: &ParsedColInfo) -> bool {
        match (self.expr.as_column(), other.expr.as_column()) {
            (Some(a), Some(b)) => {
                a.table.eq_ignore_ascii_case(&b.table) && a.column.eq_ignore_ascii_case(&b.column)
            }
            _ => {
                self.expr == other.expr
                    || (!self.alias.is_empty() && self.alias.eq_ignore_ascii_case(&other.alias))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedSelect {
    pub common: StatementCommon,
    pub display_columns: Vec<ParsedColInfo>,
    #[serde(default)]
    pub group_by_columns: Vec<ParsedColInfo>,
    #[serde(default)]
    pub order_columns: Vec<ParsedColInfo>,
    #[serde(default)]
    pub distinct: bool,
    /// Statement has a GROUP BY clause.
    #[serde(default)]
    pub grouped: bool,
    #[serde(default)]
    pub limit: Option<LimitBound>,
    #[serde(default)]
    pub offset: Option<LimitBound>,
}

impl ParsedSelect {
    pub fn has_aggregates(&self) -> bool {
        self.display_columns
            .iter()
            .any(|c| c.expr.contains_aggregate())
    }

    pub fn is_grouped(&self) -> bool {
        self.grouped || !self.group_by_columns.is_empty()
    }

    /// Whether aggregation (rather than DISTINCT) handles this statement.
    pub fn is_aggregated(&self) -> bool {
        self.has_aggregates() || self.is_grouped()
    }

    pub fn has_limit_or_offset(&self) -> bool {
        self.limit.is_some() || self.offset.is_some()
    }

    /// Whether the order of the result is fully determined.
    ///
    /// Aggregating without GROUP BY produces a single row. Otherwise ORDER BY
    /// must cover every group by column, or every display column for
    /// ungrouped statements.
    pub fn is_order_deterministic(&self) -> bool {
        if self.has_aggregates() && !self.is_grouped() {
            return true;
        }
        if self.order_columns.is_empty() {
            return false;
        }

        let covered = |col: &ParsedColInfo| self.order_columns.iter().any(|o| o.same_value(col));
        if self.is_grouped() {
            self.group_by_columns.iter().all(covered)
        } else {
            self.display_columns.iter().all(covered)
        }
    }

    /// Whether the set of rows returned is fully determined.
    pub fn is_content_deterministic(&self) -> bool {
        !self.has_limit_or_offset() || self.is_order_deterministic()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedInsert {
    pub common: StatementCommon,
    /// Values for explicitly listed columns.
    #[serde(default)]
    pub columns: IndexMap<String, Expression>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedUpdate {
    pub common: StatementCommon,
    pub assignments: IndexMap<String, Expression>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedDelete {
    pub common: StatementCommon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedStatement {
    Select(ParsedSelect),
    Insert(ParsedInsert),
    Update(ParsedUpdate),
    Delete(ParsedDelete),
}

impl ParsedStatement {
    pub fn common(&self) -> &StatementCommon {
        match self {
            Self::Select(s) => &s.common,
            Self::Insert(s) => &s.common,
            Self::Update(s) => &s.common,
            Self::Delete(s) => &s.common,
        }
    }

    pub fn kind(&self) -> StatementKind {
        match self {
            Self::Select(_) => StatementKind::Select,
            Self::Insert(_) => StatementKind::Insert,
            Self::Update(_) => StatementKind::Update,
            Self::Delete(_) => StatementKind::Delete,
        }
    }

    pub fn is_dml(&self) -> bool {
        !matches!(self, Self::Select(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::aggregate_expr::AggregateFunction;
    use crate::expr::{aggregate, column};

    fn col(name: &str) -> ParsedColInfo {
        ParsedColInfo::from_expr(column("t", name, ValueType::Integer))
    }

    fn select(display: Vec<ParsedColInfo>) -> ParsedSelect {
        ParsedSelect {
            common: StatementCommon::new("", ["t"]),
            display_columns: display,
            ..Default::default()
        }
    }

    #[test]
    fn order_deterministic_requires_full_cover() {
        let mut s = select(vec![col("a"), col("b")]);
        assert!(!s.is_order_deterministic());

        s.order_columns = vec![col("a")];
        assert!(!s.is_order_deterministic());

        s.order_columns = vec![col("b").descending(), col("a")];
        assert!(s.is_order_deterministic());
    }

    #[test]
    fn ungrouped_aggregate_is_single_row() {
        let s = select(vec![ParsedColInfo::computed(
            "c",
            aggregate(AggregateFunction::Count, None),
        )]);
        assert!(s.is_aggregated());
        assert!(s.is_order_deterministic());
    }

    #[test]
    fn content_deterministic_with_limit() {
        let mut s = select(vec![col("a")]);
        assert!(s.is_content_deterministic());

        s.limit = Some(LimitBound::Constant(3));
        assert!(!s.is_content_deterministic());

        s.order_columns = vec![col("a")];
        assert!(s.is_content_deterministic());
    }

    #[test]
    fn deserialize_statement() {
        let json = r#"{
            "kind": "insert",
            "common": {"sql": "INSERT INTO t VALUES (1)", "tables": ["t"]},
            "columns": {
                "a": {"literal": {"value": {"int": 1}, "value_type": "big_int", "value_size": 8}}
            }
        }"#;
        let stmt: ParsedStatement = serde_json::from_str(json).unwrap();
        assert_eq!(StatementKind::Insert, stmt.kind());
        assert_eq!(vec!["t".to_string()], stmt.common().tables);
    }
}
