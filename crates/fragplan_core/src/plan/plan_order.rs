use std::fmt;

use fragplan_error::{OptionExt, Result};

use super::operator::DeriveSchema;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};
use crate::schema::{NodeSchema, SchemaColumn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    /// No useful ordering.
    #[default]
    Invalid,
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid)
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => write!(f, "INVALID"),
            Self::Asc => write!(f, "ASC"),
            Self::Desc => write!(f, "DESC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortExpr {
    pub column: SchemaColumn,
    pub direction: SortDirection,
}

impl fmt::Display for SortExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column.expr, self.direction)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanOrderBy {
    pub sorts: Vec<SortExpr>,
}

impl DeriveSchema for PlanOrderBy {
    fn derive_schema(&mut self, input: Option<&NodeSchema>) -> Result<NodeSchema> {
        let input = input.required("input to order by")?;
        for sort in &mut self.sorts {
            sort.column.expr = input.bind_column(&sort.column);
        }
        Ok(input.clone())
    }
}

impl Explainable for PlanOrderBy {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("OrderBy").with_values("sorts", &self.sorts)
    }
}
