use fragplan_error::{DbError, Result};

use super::operator::DeriveSchema;
use super::plan_order::SortDirection;
use crate::catalog::TableEntry;
use crate::expr::Expression;
use crate::expr::column_expr::ColumnExpr;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};
use crate::schema::{NodeSchema, SchemaColumn};
use crate::types::ValueType;

#[derive(Debug, Clone, PartialEq)]
pub struct ScanColumn {
    pub name: String,
    pub value_type: ValueType,
    pub value_size: usize,
}

/// Sequential scan of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanScan {
    pub table: String,
    /// Columns of the table in table order.
    pub columns: Vec<ScanColumn>,
    pub predicate: Option<Expression>,
}

impl PlanScan {
    pub fn new(table: &TableEntry) -> Self {
        let columns = table
            .sorted_columns()
            .into_iter()
            .map(|c| ScanColumn {
                name: c.name.clone(),
                value_type: c.value_type,
                value_size: c.value_size(),
            })
            .collect();

        PlanScan {
            table: table.name.clone(),
            columns,
            predicate: None,
        }
    }

    pub fn with_predicate(mut self, predicate: Option<Expression>) -> Self {
        self.predicate = predicate;
        self
    }

    /// Schema of the rows stored in the table.
    pub fn table_schema(&self) -> NodeSchema {
        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, c)| {
                let expr = Expression::Column(ColumnExpr::new(
                    self.table.clone(),
                    c.name.clone(),
                    c.name.clone(),
                    idx,
                    c.value_type,
                    c.value_size,
                ));
                SchemaColumn::new(self.table.clone(), c.name.clone(), c.name.clone(), expr)
            })
            .collect();
        NodeSchema::new(columns)
    }

    fn explain_into(&self, mut ent: ExplainEntry, conf: ExplainConfig) -> ExplainEntry {
        ent = ent.with_value("table", &self.table);
        if let Some(predicate) = &self.predicate {
            ent = ent.with_value("predicate", predicate);
        }
        if conf.verbose {
            ent = ent.with_values("columns", self.columns.iter().map(|c| &c.name));
        }
        ent
    }
}

impl DeriveSchema for PlanScan {
    fn derive_schema(&mut self, input: Option<&NodeSchema>) -> Result<NodeSchema> {
        if input.is_some() {
            return Err(DbError::new("Scans don't take an input").with_field("table", &self.table));
        }
        let schema = self.table_schema();
        if let Some(predicate) = self.predicate.as_mut() {
            predicate.resolve_columns(&schema);
        }
        Ok(schema)
    }
}

impl Explainable for PlanScan {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        self.explain_into(ExplainEntry::new("Scan"), conf)
    }
}

/// Scan of a table through one of its indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanIndexScan {
    pub scan: PlanScan,
    pub index: String,
    /// Order rows come out of the scan in, Invalid if the order isn't
    /// useful to the statement.
    pub sort_direction: SortDirection,
}

impl DeriveSchema for PlanIndexScan {
    fn derive_schema(&mut self, input: Option<&NodeSchema>) -> Result<NodeSchema> {
        self.scan.derive_schema(input)
    }
}

impl Explainable for PlanIndexScan {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let ent = ExplainEntry::new("IndexScan")
            .with_value("index", &self.index)
            .with_value("sort_direction", self.sort_direction);
        self.scan.explain_into(ent, conf)
    }
}
