use std::fmt;

use fragplan_error::{OptionExt, Result};
use serde::{Deserialize, Serialize};

use super::operator::DeriveSchema;
use crate::expr::{Expression, lit, param};
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};
use crate::schema::NodeSchema;
use crate::types::ValueType;

/// Value of a LIMIT or OFFSET clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitBound {
    Constant(u64),
    /// Supplied through the parameter at this index.
    Parameter(usize),
}

impl LimitBound {
    /// Expression evaluating to this bound at execution time.
    pub fn to_expression(&self) -> Expression {
        match self {
            Self::Constant(v) => {
                let mut expr = lit(i64::try_from(*v).unwrap_or(i64::MAX));
                expr.set_output_type(ValueType::Integer, ValueType::Integer.default_size());
                expr
            }
            Self::Parameter(idx) => param(*idx, ValueType::Integer),
        }
    }
}

impl fmt::Display for LimitBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(v) => write!(f, "{v}"),
            Self::Parameter(idx) => write!(f, "?{idx}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanLimit {
    pub limit: Option<LimitBound>,
    pub offset: Option<LimitBound>,
    /// Limit computed at execution time, takes the place of `limit`.
    pub limit_expr: Option<Expression>,
}

impl DeriveSchema for PlanLimit {
    fn derive_schema(&mut self, input: Option<&NodeSchema>) -> Result<NodeSchema> {
        let input = input.required("input to limit")?;
        Ok(input.clone())
    }
}

impl Explainable for PlanLimit {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        let mut ent = ExplainEntry::new("Limit");
        if let Some(limit) = &self.limit {
            ent = ent.with_value("limit", limit);
        }
        if let Some(offset) = &self.offset {
            ent = ent.with_value("offset", offset);
        }
        if let Some(expr) = &self.limit_expr {
            ent = ent.with_value("limit_expr", expr);
        }
        ent
    }
}
