use std::collections::HashSet;

use fragplan_error::{Result, not_implemented};
use tracing::trace;

use super::{SubPlanMode, SubPlanProvider, SubPlanSource};
use crate::catalog::{Catalog, IndexEntry, TableEntry};
use crate::config::planner::PlannerConfig;
use crate::expr::Expression;
use crate::partitioning::PartitioningForStatement;
use crate::plan::operator::{Node, PlanNode};
use crate::plan::plan_exchange::add_send_receive_pair;
use crate::plan::plan_order::SortDirection;
use crate::plan::plan_scan::{PlanIndexScan, PlanScan};
use crate::statement::{ParsedColInfo, ParsedSelect, ParsedStatement};

/// Provides access paths for statements over a single table.
///
/// The first candidate is always a sequential scan, followed by one index
/// scan per index on the table.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPathProvider;

impl SubPlanProvider for AccessPathProvider {
    fn create_source(
        &self,
        catalog: &Catalog,
        statement: &ParsedStatement,
        mode: SubPlanMode,
        config: &PlannerConfig,
    ) -> Result<Box<dyn SubPlanSource>> {
        let common = statement.common();
        if common.tables.len() != 1 {
            not_implemented!("Access paths over {} tables", common.tables.len());
        }
        let table = catalog.table_required(&common.tables[0])?;

        let indexes = if config.enable_index_scans {
            table
                .indexes
                .iter()
                .map(|index| (index.name.clone(), index_sort_direction(table, index, statement)))
                .collect()
        } else {
            Vec::new()
        };

        Ok(Box::new(AccessPathSource {
            table: table.clone(),
            predicate: common.where_clause.clone(),
            mode,
            indexes,
            position: 0,
        }))
    }
}

#[derive(Debug)]
pub struct AccessPathSource {
    table: TableEntry,
    predicate: Option<Expression>,
    mode: SubPlanMode,
    /// Index names with the order the index produces for the statement.
    indexes: Vec<(String, SortDirection)>,
    position: usize,
}

impl SubPlanSource for AccessPathSource {
    fn next_plan(&mut self, partitioning: &PartitioningForStatement) -> Result<Option<PlanNode>> {
        let scan = PlanScan::new(&self.table).with_predicate(self.predicate.clone());
        let node = if self.position == 0 {
            PlanNode::Scan(Node::new(scan))
        } else {
            match self.indexes.get(self.position - 1) {
                Some((index, sort_direction)) => PlanNode::IndexScan(Node::new(PlanIndexScan {
                    scan,
                    index: index.clone(),
                    sort_direction: *sort_direction,
                })),
                None => return Ok(None),
            }
        };
        self.position += 1;

        let distribute = self.mode == SubPlanMode::Read
            && !self.table.replicated
            && !partitioning.is_single_partition();

        trace!(
            table = %self.table.name,
            node = %node.node_type(),
            %distribute,
            "access path candidate"
        );

        if distribute {
            Ok(Some(add_send_receive_pair(node)))
        } else {
            Ok(Some(node))
        }
    }
}

/// Determine the useful order an index scan would produce for a statement.
///
/// The index must satisfy ORDER BY if there is one, and its leading columns
/// must cover GROUP BY if the statement is grouped.
fn index_sort_direction(
    table: &TableEntry,
    index: &IndexEntry,
    statement: &ParsedStatement,
) -> SortDirection {
    let ParsedStatement::Select(select) = statement else {
        return SortDirection::Invalid;
    };

    let direction = if select.order_columns.is_empty() {
        if !select.is_grouped() {
            return SortDirection::Invalid;
        }
        SortDirection::Asc
    } else {
        match order_by_direction(table, index, select) {
            Some(direction) => direction,
            None => return SortDirection::Invalid,
        }
    };

    if select.is_grouped() && !covers_group_by(table, index, select) {
        return SortDirection::Invalid;
    }

    direction
}

fn is_table_column<'a>(table: &TableEntry, col: &'a ParsedColInfo) -> Option<&'a str> {
    let column = col.expr.as_column()?;
    if column.table.eq_ignore_ascii_case(&table.name) {
        Some(&column.column)
    } else {
        None
    }
}

fn order_by_direction(
    table: &TableEntry,
    index: &IndexEntry,
    select: &ParsedSelect,
) -> Option<SortDirection> {
    let all_asc = select.order_columns.iter().all(|c| c.ascending);
    let all_desc = select.order_columns.iter().all(|c| !c.ascending);
    if !all_asc && !all_desc {
        return None;
    }
    if select.order_columns.len() > index.columns.len() {
        return None;
    }

    for (order_col, index_col) in select.order_columns.iter().zip(&index.columns) {
        let name = is_table_column(table, order_col)?;
        if !name.eq_ignore_ascii_case(index_col) {
            return None;
        }
    }

    Some(if all_asc {
        SortDirection::Asc
    } else {
        SortDirection::Desc
    })
}

fn covers_group_by(table: &TableEntry, index: &IndexEntry, select: &ParsedSelect) -> bool {
    let group_count = select.group_by_columns.len();
    if group_count == 0 || group_count > index.columns.len() {
        return false;
    }

    let leading: HashSet<String> = index.columns[..group_count]
        .iter()
        .map(|c| c.to_ascii_lowercase())
        .collect();

    select.group_by_columns.iter().all(|col| {
        is_table_column(table, col).is_some_and(|name| leading.contains(&name.to_ascii_lowercase()))
    })
}
