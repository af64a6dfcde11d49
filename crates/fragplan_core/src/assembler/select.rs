use fragplan_error::Result;
use tracing::trace;

use super::{aggregate, distinct, limit};
use crate::config::planner::PlannerConfig;
use crate::partitioning::PartitioningForStatement;
use crate::plan::operator::{Node, PlanNode, PlanNodeType};
use crate::plan::plan_exchange::PlanSend;
use crate::plan::plan_order::{PlanOrderBy, SortDirection, SortExpr};
use crate::plan::plan_project::PlanProjection;
use crate::schema::NodeSchema;
use crate::statement::ParsedSelect;
use crate::subplan::SubPlanSource;

/// Build a plan for the next access path proposed for a SELECT.
pub(super) fn next_select_plan(
    source: &mut dyn SubPlanSource,
    select: &ParsedSelect,
    partitioning: &PartitioningForStatement,
    config: &PlannerConfig,
) -> Result<Option<PlanNode>> {
    if select.distinct && !select.is_aggregated() {
        distinct::validate_distinct(select)?;
    }

    let Some(mut root) = source.next_plan(partitioning)? else {
        return Ok(None);
    };
    trace!(node = %root.node_type(), "pulled select candidate");

    // Only an index scan at the root produces rows in a useful order. Rows
    // merged from many partitions have no order.
    let index_sorted = root.is_index_sorted();

    root.generate_output_schema()?;
    root = aggregate::handle_aggregation_operators(root, select, config)?;

    if !index_sorted && !select.order_columns.is_empty() {
        root = PlanNode::OrderBy(Node::with_child(create_order_by(select), root));
    }

    if !matches!(
        root.node_type(),
        PlanNodeType::Aggregate
            | PlanNodeType::HashAggregate
            | PlanNodeType::Distinct
            | PlanNodeType::Projection
    ) {
        root = add_projection(root, select)?;
    }

    if select.has_limit_or_offset() {
        root = limit::handle_limit_operator(root, select, config)?;
    }

    Ok(Some(PlanNode::Send(Node::with_child(
        PlanSend {
            multi_partition: false,
        },
        root,
    ))))
}

/// Project the display columns of the statement.
///
/// The projection is inlined if the root is a scan.
pub(super) fn add_projection(mut root: PlanNode, select: &ParsedSelect) -> Result<PlanNode> {
    let columns = NodeSchema::new(
        select
            .display_columns
            .iter()
            .map(|c| c.to_schema_column())
            .collect(),
    );

    if root.is_scan() {
        root.set_inline(PlanNode::Projection(Node::new(PlanProjection { columns })))?;
        Ok(root)
    } else {
        Ok(PlanNode::Projection(Node::with_child(
            PlanProjection { columns },
            root,
        )))
    }
}

pub(super) fn create_order_by(select: &ParsedSelect) -> PlanOrderBy {
    let sorts = select
        .order_columns
        .iter()
        .map(|col| SortExpr {
            column: col.to_schema_column(),
            direction: if col.ascending {
                SortDirection::Asc
            } else {
                SortDirection::Desc
            },
        })
        .collect();

    PlanOrderBy { sorts }
}
