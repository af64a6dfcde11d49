use fragplan_error::{OptionExt, Result};
use tracing::debug;

use super::select;
use crate::config::planner::PlannerConfig;
use crate::expr::add;
use crate::plan::operator::{Node, PlanNode};
use crate::plan::plan_exchange::PlanReceive;
use crate::plan::plan_limit::{LimitBound, PlanLimit};
use crate::statement::ParsedSelect;
use crate::types::ValueType;

/// Add LIMIT/OFFSET to the plan, pushing a limit of `limit + offset` rows
/// down to every partition when possible.
pub(super) fn handle_limit_operator(
    mut root: PlanNode,
    select: &ParsedSelect,
    config: &PlannerConfig,
) -> Result<PlanNode> {
    let coord_limit = PlanLimit {
        limit: select.limit,
        offset: select.offset,
        limit_expr: None,
    };

    let distinct_aggregate = select
        .display_columns
        .iter()
        .any(|c| c.expr.as_aggregate().is_some_and(|agg| agg.distinct));

    let limit = match select.limit {
        Some(limit) if config.enable_push_down && !select.distinct && !distinct_aggregate => limit,
        _ => {
            debug!("limit not eligible for push down");
            return Ok(PlanNode::Limit(Node::with_child(coord_limit, root)));
        }
    };

    if check_push_down_viability(&root).is_none() {
        debug!("no receive reachable for limit push down");
        return Ok(PlanNode::Limit(Node::with_child(coord_limit, root)));
    }

    let dist_limit = distributed_limit(limit, select.offset);
    debug!(?dist_limit, "pushing down limit");

    let receive = find_receive_mut(&mut root).required("receive for limit push down")?;
    let mut dist = receive.take_distributed_input()?;
    if !dist.is_index_sorted() && !select.order_columns.is_empty() {
        dist = PlanNode::OrderBy(Node::with_child(select::create_order_by(select), dist));
    }
    dist = PlanNode::Limit(Node::with_child(dist_limit, dist));
    receive.set_distributed_input(dist)?;

    Ok(PlanNode::Limit(Node::with_child(coord_limit, root)))
}

/// Limit applied on each partition.
///
/// Partitions can't skip rows for the offset, so they return up to
/// `limit + offset` rows. Computed at execution time if either is a
/// parameter.
fn distributed_limit(limit: LimitBound, offset: Option<LimitBound>) -> PlanLimit {
    let offset = offset.unwrap_or(LimitBound::Constant(0));
    match (limit, offset) {
        (LimitBound::Constant(limit), LimitBound::Constant(offset)) => PlanLimit {
            limit: Some(LimitBound::Constant(limit.saturating_add(offset))),
            ..Default::default()
        },
        (limit, offset) => {
            let mut expr = add(offset.to_expression(), limit.to_expression());
            expr.set_output_type(ValueType::Integer, ValueType::Integer.default_size());
            PlanLimit {
                limit_expr: Some(expr),
                ..Default::default()
            }
        }
    }
}

/// Find the receive a limit could be pushed below.
///
/// Walks down from the root, only passing through nodes that don't change
/// which rows a limit would keep: coordinating aggregates, sorts, and
/// projections.
pub(super) fn check_push_down_viability(root: &PlanNode) -> Option<&Node<PlanReceive>> {
    let children = match root {
        PlanNode::Receive(receive) => return Some(receive),
        PlanNode::Aggregate(n) | PlanNode::HashAggregate(n) if n.node.coordinating => &n.children,
        PlanNode::OrderBy(n) => &n.children,
        PlanNode::Projection(n) => &n.children,
        _ => return None,
    };
    match children.as_slice() {
        [child] => check_push_down_viability(child),
        _ => None,
    }
}

fn find_receive_mut(root: &mut PlanNode) -> Option<&mut Node<PlanReceive>> {
    let children = match root {
        PlanNode::Receive(receive) => return Some(receive),
        PlanNode::Aggregate(n) | PlanNode::HashAggregate(n) if n.node.coordinating => {
            &mut n.children
        }
        PlanNode::OrderBy(n) => &mut n.children,
        PlanNode::Projection(n) => &mut n.children,
        _ => return None,
    };
    match children.as_mut_slice() {
        [child] => find_receive_mut(child),
        _ => None,
    }
}
