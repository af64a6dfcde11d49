use fragplan_error::{DbError, OptionExt, Result};

use super::operator::DeriveSchema;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};
use crate::schema::NodeSchema;

#[derive(Debug, Clone, PartialEq)]
pub struct PlanInsert {
    pub target_table: String,
    /// Insert is routed to partitions at execution time.
    pub multi_partition: bool,
}

impl DeriveSchema for PlanInsert {
    fn derive_schema(&mut self, input: Option<&NodeSchema>) -> Result<NodeSchema> {
        input.required("input to insert")?;
        Ok(NodeSchema::modified_tuples())
    }
}

impl Explainable for PlanInsert {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Insert")
            .with_value("table", &self.target_table)
            .with_value("multi_partition", self.multi_partition)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanUpdate {
    pub target_table: String,
    /// At least one updated column is indexed.
    pub update_indexes: bool,
}

impl DeriveSchema for PlanUpdate {
    fn derive_schema(&mut self, input: Option<&NodeSchema>) -> Result<NodeSchema> {
        input.required("input to update")?;
        Ok(NodeSchema::modified_tuples())
    }
}

impl Explainable for PlanUpdate {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Update")
            .with_value("table", &self.target_table)
            .with_value("update_indexes", self.update_indexes)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanDelete {
    pub target_table: String,
    /// Remove every row without scanning.
    pub truncate: bool,
}

impl DeriveSchema for PlanDelete {
    fn derive_schema(&mut self, input: Option<&NodeSchema>) -> Result<NodeSchema> {
        match (input, self.truncate) {
            (Some(_), false) | (None, true) => Ok(NodeSchema::modified_tuples()),
            (Some(_), true) => Err(DbError::new("Truncating delete doesn't take an input")),
            (None, false) => Err(DbError::new("Delete requires an input")),
        }
    }
}

impl Explainable for PlanDelete {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        let ent = ExplainEntry::new("Delete").with_value("table", &self.target_table);
        if self.truncate {
            ent.with_value("truncate", true)
        } else {
            ent
        }
    }
}
