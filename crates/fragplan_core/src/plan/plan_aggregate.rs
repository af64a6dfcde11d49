use std::fmt;

use fragplan_error::{OptionExt, Result};

use super::operator::DeriveSchema;
use crate::expr::Expression;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};
use crate::schema::NodeSchema;

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateColumn {
    /// An aggregate expression, or an expression over aggregates.
    pub expr: Expression,
    /// Position of the result in the output schema.
    pub output_column: usize,
}

impl fmt::Display for AggregateColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} := {}", self.output_column, self.expr)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanAggregate {
    pub aggregates: Vec<AggregateColumn>,
    pub group_by: Vec<Expression>,
    /// Configured output schema, pass-through columns and aggregate results.
    pub output: NodeSchema,
    /// Combines partial results computed by distributed aggregates.
    pub coordinating: bool,
}

impl PlanAggregate {
    pub fn add_aggregate(&mut self, expr: Expression, output_column: usize) {
        self.aggregates.push(AggregateColumn {
            expr,
            output_column,
        });
    }

    pub fn add_group_by(&mut self, expr: Expression) {
        self.group_by.push(expr);
    }

    pub(crate) fn explain_named(&self, name: &str, conf: ExplainConfig) -> ExplainEntry {
        let mut ent = ExplainEntry::new(name).with_values("aggregates", &self.aggregates);
        if !self.group_by.is_empty() {
            ent = ent.with_values("group_by", &self.group_by);
        }
        if self.coordinating {
            ent = ent.with_value("coordinating", true);
        }
        if conf.verbose {
            ent = ent.with_values("output", self.output.iter().map(|c| c.name()));
        }
        ent
    }
}

impl DeriveSchema for PlanAggregate {
    fn derive_schema(&mut self, input: Option<&NodeSchema>) -> Result<NodeSchema> {
        let input = input.required("input to aggregate")?;
        for agg in &mut self.aggregates {
            agg.expr.resolve_columns(input);
        }
        for expr in &mut self.group_by {
            expr.resolve_columns(input);
        }
        for col in &mut self.output.columns {
            col.expr.resolve_columns(input);
        }
        Ok(self.output.clone())
    }
}

impl Explainable for PlanAggregate {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        self.explain_named("Aggregate", conf)
    }
}
