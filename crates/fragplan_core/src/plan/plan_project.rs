use fragplan_error::{DbError, OptionExt, Result};

use super::operator::DeriveSchema;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};
use crate::schema::{NodeSchema, SchemaColumn};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanProjection {
    /// Columns to output.
    ///
    /// Expressions are rewritten to reference the input when the output
    /// schema is generated.
    pub columns: NodeSchema,
}

impl DeriveSchema for PlanProjection {
    fn derive_schema(&mut self, input: Option<&NodeSchema>) -> Result<NodeSchema> {
        let input = input.required("input to projection")?;
        let columns = self
            .columns
            .iter()
            .map(|col| {
                let expr = input.bind_column(col);
                SchemaColumn {
                    expr,
                    ..col.clone()
                }
            })
            .collect();
        self.columns = NodeSchema::new(columns);
        Ok(self.columns.clone())
    }
}

impl Explainable for PlanProjection {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let ent = ExplainEntry::new("Projection")
            .with_values("projections", self.columns.iter().map(|c| &c.expr));
        if conf.verbose {
            ent.with_values("names", self.columns.iter().map(|c| c.name()))
        } else {
            ent
        }
    }
}

/// Produce a single row from constant (or parameter) expressions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanMaterialize {
    pub columns: NodeSchema,
}

impl DeriveSchema for PlanMaterialize {
    fn derive_schema(&mut self, input: Option<&NodeSchema>) -> Result<NodeSchema> {
        if input.is_some() {
            return Err(DbError::new("Materialize doesn't take an input"));
        }
        Ok(self.columns.clone())
    }
}

impl Explainable for PlanMaterialize {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Materialize").with_values(
            "values",
            self.columns
                .iter()
                .map(|c| format!("{} := {}", c.name(), c.expr)),
        )
    }
}
