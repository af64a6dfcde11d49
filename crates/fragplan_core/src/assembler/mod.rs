//! Assembles complete candidate plans for statements.
//!
//! The assembler is set up once per statement, then asked for plans until it
//! runs out. SELECT, UPDATE, and DELETE produce one plan per access path the
//! sub-plan source proposes. INSERT produces exactly one plan.
//!
//! Operators that can run on every partition are pushed below the
//! send/receive boundary of distributed candidates, with a matching
//! operator left at the coordinator to combine partial results.

mod aggregate;
mod distinct;
mod insert;
mod limit;
mod select;
mod write;

use std::collections::HashMap;

use fragplan_error::{DbError, OptionExt, Result};
use tracing::debug;

use crate::catalog::{Catalog, TableEntry};
use crate::config::planner::PlannerConfig;
use crate::partitioning::{PartitionColumn, PartitioningForStatement, PartitioningValue};
use crate::plan::compiled::CompiledPlan;
use crate::schema::NodeSchema;
use crate::statement::{ParameterInfo, ParsedSelect, ParsedStatement};
use crate::subplan::{SubPlanMode, SubPlanProvider, SubPlanSource};
use crate::types::ValueType;

#[derive(Debug)]
pub struct PlanAssembler<'a> {
    catalog: &'a Catalog,
    provider: &'a dyn SubPlanProvider,
    config: PlannerConfig,
    /// State for the statement currently being planned.
    state: Option<AssemblerState>,
}

#[derive(Debug)]
struct AssemblerState {
    statement: ParsedStatement,
    partitioning: PartitioningForStatement,
    /// None for inserts.
    source: Option<Box<dyn SubPlanSource>>,
    insert_plan_generated: bool,
    /// Parameter types forced by coercing values into target columns.
    param_overrides: HashMap<usize, ValueType>,
    plans_generated: u64,
    exhausted: bool,
}

impl<'a> PlanAssembler<'a> {
    pub fn new(
        catalog: &'a Catalog,
        provider: &'a dyn SubPlanProvider,
        config: PlannerConfig,
    ) -> Self {
        PlanAssembler {
            catalog,
            provider,
            config,
            state: None,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Prepare to produce plans for a new statement.
    ///
    /// Any state from a previous statement is discarded, even if the new
    /// statement turns out to be illegal.
    pub fn setup_for_new_plans(
        &mut self,
        statement: ParsedStatement,
        mut partitioning: PartitioningForStatement,
    ) -> Result<()> {
        self.state = None;

        let tables = statement
            .common()
            .tables
            .iter()
            .map(|name| self.catalog.table_required(name))
            .collect::<Result<Vec<_>>>()?;

        let partitioned = tables.iter().filter(|t| !t.replicated).count();
        partitioning.set_count_of_partitioned_tables(partitioned);

        debug!(
            kind = %statement.kind(),
            tables = tables.len(),
            partitioned,
            single_partition = partitioning.was_specified_as_single(),
            "setting up for new plans"
        );

        let source = match &statement {
            ParsedStatement::Select(_) => {
                if let Some(table) = tables.iter().find(|t| self.catalog.is_export_only(&t.name)) {
                    return Err(DbError::planning("Illegal to read an export table.")
                        .with_field("table", &table.name));
                }
                Some(self.create_source(&statement, SubPlanMode::Read)?)
            }
            ParsedStatement::Insert(_) => {
                check_write_target(&tables, &mut partitioning)?;
                None
            }
            ParsedStatement::Update(_) => {
                let target = check_write_target(&tables, &mut partitioning)?;
                if self.catalog.is_export_only(&target.name) {
                    return Err(DbError::planning("Illegal to update an export table.")
                        .with_field("table", &target.name));
                }
                Some(self.create_source(&statement, SubPlanMode::Write)?)
            }
            ParsedStatement::Delete(_) => {
                let target = check_write_target(&tables, &mut partitioning)?;
                if self.catalog.is_export_only(&target.name) {
                    return Err(DbError::planning("Illegal to delete from an export table.")
                        .with_field("table", &target.name));
                }
                Some(self.create_source(&statement, SubPlanMode::Write)?)
            }
        };

        self.state = Some(AssemblerState {
            statement,
            partitioning,
            source,
            insert_plan_generated: false,
            param_overrides: HashMap::new(),
            plans_generated: 0,
            exhausted: false,
        });

        Ok(())
    }

    fn create_source(
        &self,
        statement: &ParsedStatement,
        mode: SubPlanMode,
    ) -> Result<Box<dyn SubPlanSource>> {
        self.provider
            .create_source(self.catalog, statement, mode, &self.config)
    }

    /// Produce the next candidate plan.
    ///
    /// Returns None once every candidate was produced, and keeps returning
    /// None after that.
    pub fn next_plan(&mut self) -> Result<Option<CompiledPlan>> {
        let state = self.state.as_mut().required("assembler state")?;
        if state.exhausted {
            return Ok(None);
        }

        let max = self.config.max_candidate_plans;
        if max > 0 && state.plans_generated >= max {
            debug!(max, "reached maximum number of candidate plans");
            state.exhausted = true;
            return Ok(None);
        }

        let root = {
            let AssemblerState {
                statement,
                partitioning,
                source,
                insert_plan_generated,
                param_overrides,
                ..
            } = &mut *state;

            match &*statement {
                ParsedStatement::Select(select) => select::next_select_plan(
                    source_required(source)?,
                    select,
                    partitioning,
                    &self.config,
                )?,
                ParsedStatement::Insert(insert) => {
                    if *insert_plan_generated {
                        None
                    } else {
                        *insert_plan_generated = true;
                        Some(insert::insert_plan(
                            self.catalog,
                            insert,
                            partitioning,
                            param_overrides,
                        )?)
                    }
                }
                ParsedStatement::Update(update) => write::next_update_plan(
                    self.catalog,
                    source_required(source)?,
                    update,
                    partitioning,
                    param_overrides,
                )?,
                ParsedStatement::Delete(delete) => write::next_delete_plan(
                    self.catalog,
                    source_required(source)?,
                    delete,
                    partitioning,
                    &self.config,
                )?,
            }
        };

        let Some(mut root) = root else {
            debug!(plans = state.plans_generated, "no more candidate plans");
            state.exhausted = true;
            return Ok(None);
        };

        root.generate_output_schema()?;
        let output_schema = root.output_schema()?.clone();

        let common = state.statement.common();
        let parameters = common
            .params
            .iter()
            .map(|p| ParameterInfo {
                index: p.index,
                value_type: state
                    .param_overrides
                    .get(&p.index)
                    .copied()
                    .unwrap_or(p.value_type),
            })
            .collect();

        let (content_deterministic, order_deterministic, replicated_table_dml) =
            match &state.statement {
                ParsedStatement::Select(select) => {
                    check_output_columns(select, &output_schema)?;
                    (
                        select.is_content_deterministic(),
                        select.is_order_deterministic(),
                        false,
                    )
                }
                other => {
                    let target = other.common().tables.first().required("target table")?;
                    let target = self.catalog.table_required(target)?;
                    (true, true, target.replicated)
                }
            };

        let plan = CompiledPlan {
            root,
            parameters,
            output_schema,
            content_deterministic,
            order_deterministic,
            partitioning_key: state.partitioning.effective_partitioning_value().cloned(),
            replicated_table_dml,
            read_only: !state.statement.is_dml(),
            sql: common.sql.clone(),
            full_where_clause: common.where_clause.clone(),
        };
        state.plans_generated += 1;

        debug!(
            plan = state.plans_generated,
            fragments = plan.fragments().len(),
            "generated candidate plan"
        );

        Ok(Some(plan))
    }

    /// Iterate over the remaining plans.
    ///
    /// Iteration stops after the first error.
    pub fn plans(&mut self) -> Plans<'_, 'a> {
        Plans {
            assembler: self,
            done: false,
        }
    }

    /// Partitioning context of the current statement, as updated by planning.
    pub fn partitioning(&self) -> Option<&PartitioningForStatement> {
        self.state.as_ref().map(|s| &s.partitioning)
    }

    /// Override the partitioning value plans are routed by.
    pub fn reset_partitioning_key(&mut self, value: Option<PartitioningValue>) -> Result<()> {
        let state = self.state.as_mut().required("assembler state")?;
        state.partitioning.set_effective_value(value);
        Ok(())
    }

    /// Parameter types forced while planning the current statement.
    pub fn param_type_overrides(&self) -> Option<&HashMap<usize, ValueType>> {
        self.state.as_ref().map(|s| &s.param_overrides)
    }
}

#[derive(Debug)]
pub struct Plans<'b, 'a> {
    assembler: &'b mut PlanAssembler<'a>,
    done: bool,
}

impl Iterator for Plans<'_, '_> {
    type Item = Result<CompiledPlan>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.assembler.next_plan().transpose();
        if !matches!(next, Some(Ok(_))) {
            self.done = true;
        }
        next
    }
}

fn source_required(
    source: &mut Option<Box<dyn SubPlanSource>>,
) -> Result<&mut (dyn SubPlanSource + 'static)> {
    source.as_deref_mut().required("sub-plan source")
}

/// Check the table a data modifying statement writes to.
///
/// Adopts the partitioning column of a partitioned target unless the
/// statement was declared single partition.
fn check_write_target<'t>(
    tables: &[&'t TableEntry],
    partitioning: &mut PartitioningForStatement,
) -> Result<&'t TableEntry> {
    if let Some(view) = tables.iter().find(|t| t.is_materialized_view()) {
        return Err(DbError::planning("Illegal to modify a materialized view.")
            .with_field("table", &view.name));
    }

    let target = match tables {
        [target] => *target,
        _ => {
            return Err(DbError::new("Data modifying statements write to exactly one table")
                .with_field("tables", tables.len()));
        }
    };

    if target.replicated {
        if partitioning.was_specified_as_single() {
            return Err(DbError::planning(format!(
                "Trying to write to replicated table '{}' in a single-partition procedure.",
                target.name
            )));
        }
    } else if !partitioning.was_specified_as_single() {
        partitioning.set_partitioning_column(target.partition_column.as_ref().map(|column| {
            PartitionColumn {
                table: target.name.clone(),
                column: column.clone(),
            }
        }));
    }

    Ok(target)
}

/// Check that a plan produces exactly the columns the statement selects.
fn check_output_columns(select: &ParsedSelect, schema: &NodeSchema) -> Result<()> {
    let missing = select
        .display_columns
        .iter()
        .find(|col| schema.find(&col.table, &col.column, &col.alias).is_none());

    if schema.len() != select.display_columns.len() || missing.is_some() {
        let mut err = DbError::planning("Mismatched plan output cols to parsed display columns")
            .with_field("expected", select.display_columns.len())
            .with_field("actual", schema.len());
        if let Some(col) = missing {
            err = err.with_field("missing", &col.alias);
        }
        return Err(err);
    }

    Ok(())
}
