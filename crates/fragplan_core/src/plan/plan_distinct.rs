use fragplan_error::{OptionExt, Result};

use super::operator::DeriveSchema;
use crate::expr::Expression;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};
use crate::schema::NodeSchema;

/// Remove rows with duplicate values of `expr`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanDistinct {
    pub expr: Expression,
}

impl DeriveSchema for PlanDistinct {
    fn derive_schema(&mut self, input: Option<&NodeSchema>) -> Result<NodeSchema> {
        let input = input.required("input to distinct")?;
        self.expr.resolve_columns(input);
        Ok(input.clone())
    }
}

impl Explainable for PlanDistinct {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Distinct").with_value("on", &self.expr)
    }
}
