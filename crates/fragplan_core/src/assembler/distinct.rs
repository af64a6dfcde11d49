use fragplan_error::{DbError, Result};
use tracing::debug;

use super::select;
use crate::config::planner::PlannerConfig;
use crate::expr::Expression;
use crate::plan::operator::{Node, PlanNode};
use crate::plan::plan_distinct::PlanDistinct;
use crate::statement::ParsedSelect;

/// Check that the statement's DISTINCT is of a shape we can plan.
pub(super) fn validate_distinct(select: &ParsedSelect) -> Result<()> {
    if select.display_columns.len() > 1 {
        return Err(DbError::planning("Multiple DISTINCT columns currently unsupported"));
    }
    if select.display_columns.iter().any(|c| !c.expr.is_column_ref()) {
        return Err(DbError::planning("DISTINCT of an expression currently unsupported"));
    }
    Ok(())
}

/// Add distinct nodes for a SELECT DISTINCT, followed by a projection of
/// the display columns.
pub(super) fn handle_distinct(
    root: PlanNode,
    select: &ParsedSelect,
    config: &PlannerConfig,
) -> Result<PlanNode> {
    if !select.distinct {
        return Ok(root);
    }
    validate_distinct(select)?;

    let Some(col) = select.display_columns.first() else {
        return Ok(root);
    };

    let root = add_distinct_nodes(root, &col.expr, config.enable_push_down)?;
    select::add_projection(root, select)
}

/// Remove duplicates on every partition as well as at the coordinator if
/// the plan is distributed.
fn add_distinct_nodes(root: PlanNode, expr: &Expression, push_down: bool) -> Result<PlanNode> {
    let root = match root {
        PlanNode::Receive(mut receive) if push_down => {
            debug!(%expr, "pushing down distinct");
            let input = receive.take_distributed_input()?;
            receive.set_distributed_input(distinct_node(expr, input))?;
            PlanNode::Receive(receive)
        }
        other => other,
    };
    Ok(distinct_node(expr, root))
}

fn distinct_node(expr: &Expression, input: PlanNode) -> PlanNode {
    PlanNode::Distinct(Node::with_child(
        PlanDistinct { expr: expr.clone() },
        input,
    ))
}
