use fragplan_error::{DbError, OptionExt, Result};
use tracing::debug;

use super::distinct;
use crate::config::planner::PlannerConfig;
use crate::expr::Expression;
use crate::expr::aggregate_expr::{AggregateExpr, AggregateFunction};
use crate::expr::column_expr::ColumnExpr;
use crate::plan::operator::{Node, PlanNode};
use crate::plan::plan_aggregate::PlanAggregate;
use crate::schema::{SchemaColumn, TEMP_TABLE_NAME};
use crate::statement::ParsedSelect;

/// Add aggregation for grouped or aggregating statements, or DISTINCT
/// handling for everything else.
///
/// Partial aggregates are computed on every partition where the aggregate
/// functions allow it, with a coordinating aggregate combining the results.
pub(super) fn handle_aggregation_operators(
    root: PlanNode,
    select: &ParsedSelect,
    config: &PlannerConfig,
) -> Result<PlanNode> {
    if !select.is_aggregated() {
        return distinct::handle_distinct(root, select, config);
    }

    let input = root.output_schema()?;

    let mut dist = PlanAggregate::default();
    let mut coord = PlanAggregate::default();
    let mut has_aggregates = false;
    let mut push_down = true;

    for (idx, col) in select.display_columns.iter().enumerate() {
        if !col.expr.contains_aggregate() {
            // Pass-through column, must already be in the input.
            let column = col.to_schema_column();
            coord.output.push(SchemaColumn {
                expr: column.as_column_ref(idx),
                ..column.clone()
            });
            dist.output.push(column);
            continue;
        }

        has_aggregates = true;

        let Some(agg) = col.expr.as_aggregate() else {
            // Expressions of aggregates only run at the coordinator.
            push_down = false;
            let output = temp_column(&col.alias, idx, &col.expr);
            dist.add_aggregate(col.expr.clone(), idx);
            dist.output.push(output.clone());
            coord.output.push(output);
            continue;
        };

        let mut agg = agg.clone();
        if agg.is_count_star() {
            // The input is never evaluated, it only has to exist.
            let first = input.get(0).required("input column for COUNT(*)")?;
            agg.function = AggregateFunction::CountStar;
            agg.input = Some(Box::new(first.as_column_ref(0)));
        }

        let output = temp_column(&col.alias, idx, &col.expr);
        let partial = output.expr.clone();
        dist.add_aggregate(Expression::Aggregate(agg.clone()), idx);
        dist.output.push(output.clone());

        match (agg.distinct, agg.function) {
            (
                false,
                AggregateFunction::Count | AggregateFunction::CountStar | AggregateFunction::Sum,
            ) => {
                let sum = AggregateExpr::new(AggregateFunction::Sum, false, Some(partial));
                let sum = Expression::Aggregate(sum);
                coord.output.push(temp_column(&col.alias, idx, &sum));
                coord.add_aggregate(sum, idx);
            }
            (false, AggregateFunction::Min | AggregateFunction::Max) => {
                let combine = AggregateExpr::new(agg.function, false, Some(partial));
                coord.add_aggregate(Expression::Aggregate(combine), idx);
                coord.output.push(output);
            }
            _ => {
                debug!(aggregate = %agg, "aggregate can't be computed in parts");
                push_down = false;
                coord.output.push(output);
            }
        }
    }

    for col in &select.group_by_columns {
        if dist.output.find(&col.table, &col.column, &col.alias).is_none() {
            let alias = &col.alias;
            return Err(DbError::planning(format!(
                "GROUP BY column {alias} is not in the display columns. \
                 Please specify {alias} as a display column."
            )));
        }
        dist.add_group_by(col.expr.clone());
        coord.add_group_by(col.expr.clone());
    }

    let ordered = root.is_index_sorted();
    let coord = if has_aggregates && push_down && config.enable_push_down {
        Some(coord)
    } else {
        None
    };

    debug!(
        ordered,
        pushed_down = coord.is_some(),
        has_aggregates,
        "planned aggregation"
    );

    push_down_aggregate(root, dist, coord, ordered)
}

/// Output column of an aggregate node, referenced by alias by the nodes
/// above it.
fn temp_column(alias: &str, idx: usize, expr: &Expression) -> SchemaColumn {
    let column = Expression::Column(ColumnExpr::new(
        TEMP_TABLE_NAME,
        "",
        alias,
        idx,
        expr.value_type(),
        expr.value_size(),
    ));
    SchemaColumn::new(TEMP_TABLE_NAME, "", alias, column)
}

fn aggregate_node(agg: PlanAggregate, input: PlanNode, ordered: bool) -> PlanNode {
    if ordered {
        PlanNode::Aggregate(Node::with_child(agg, input))
    } else {
        PlanNode::HashAggregate(Node::with_child(agg, input))
    }
}

/// Place the distributed aggregate below the send/receive boundary and the
/// coordinating aggregate above it.
///
/// Without a coordinating aggregate, or without a boundary, the distributed
/// aggregate goes on top of the plan and does all the work.
fn push_down_aggregate(
    root: PlanNode,
    dist: PlanAggregate,
    coord: Option<PlanAggregate>,
    ordered: bool,
) -> Result<PlanNode> {
    match (coord, root) {
        (Some(mut coord), PlanNode::Receive(mut receive)) => {
            coord.coordinating = true;
            let input = receive.take_distributed_input()?;
            receive.set_distributed_input(aggregate_node(dist, input, ordered))?;
            Ok(aggregate_node(coord, PlanNode::Receive(receive), ordered))
        }
        (_, root) => Ok(aggregate_node(dist, root, ordered)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnEntry, TableEntry};
    use crate::expr::{add, aggregate, column, distinct_aggregate, lit};
    use crate::plan::operator::PlanNodeType;
    use crate::plan::plan_exchange::add_send_receive_pair;
    use crate::plan::plan_scan::PlanScan;
    use crate::statement::{ParsedColInfo, StatementCommon};
    use crate::types::ValueType;

    fn scan() -> PlanNode {
        let table = TableEntry::new(
            "t",
            vec![
                ColumnEntry::new("a", 0, ValueType::Integer),
                ColumnEntry::new("b", 1, ValueType::Integer),
            ],
        );
        PlanNode::Scan(Node::new(PlanScan::new(&table)))
    }

    fn distributed() -> PlanNode {
        let mut root = add_send_receive_pair(scan());
        root.generate_output_schema().unwrap();
        root
    }

    fn col(name: &str) -> ParsedColInfo {
        ParsedColInfo::from_expr(column("t", name, ValueType::Integer))
    }

    fn agg(alias: &str, function: AggregateFunction, input: Option<&str>) -> ParsedColInfo {
        ParsedColInfo::computed(
            alias,
            aggregate(function, input.map(|c| column("t", c, ValueType::Integer))),
        )
    }

    fn select(display: Vec<ParsedColInfo>, group_by: Vec<ParsedColInfo>) -> ParsedSelect {
        ParsedSelect {
            common: StatementCommon::new("", ["t"]),
            display_columns: display,
            group_by_columns: group_by,
            ..Default::default()
        }
    }

    fn plan(select: &ParsedSelect, root: PlanNode) -> PlanNode {
        let mut root =
            handle_aggregation_operators(root, select, &PlannerConfig::default()).unwrap();
        root.generate_output_schema().unwrap();
        root
    }

    #[test]
    fn sum_and_count_pushed_down() {
        let s = select(
            vec![
                agg("s", AggregateFunction::Sum, Some("a")),
                agg("c", AggregateFunction::Count, None),
            ],
            Vec::new(),
        );
        let root = plan(&s, distributed());
        assert_eq!(
            vec![
                PlanNodeType::HashAggregate,
                PlanNodeType::Receive,
                PlanNodeType::Send,
                PlanNodeType::HashAggregate,
                PlanNodeType::Scan,
            ],
            root.node_types()
        );

        let PlanNode::HashAggregate(coord) = &root else {
            panic!("expected aggregate");
        };
        assert!(coord.node.coordinating);
        let functions: Vec<_> = coord
            .node
            .aggregates
            .iter()
            .map(|a| a.expr.as_aggregate().unwrap().function)
            .collect();
        assert_eq!(vec![AggregateFunction::Sum, AggregateFunction::Sum], functions);

        let dist = &coord.children[0].children()[0].children()[0];
        let PlanNode::HashAggregate(dist) = dist else {
            panic!("expected aggregate");
        };
        assert!(!dist.node.coordinating);
        let count = dist.node.aggregates[1].expr.as_aggregate().unwrap();
        assert_eq!(AggregateFunction::CountStar, count.function);
        assert_eq!("COUNT(*)", count.to_string());

        let schema = root.output_schema().unwrap();
        assert_eq!(vec!["s", "c"], schema.iter().map(|c| c.name()).collect::<Vec<_>>());
        assert_eq!(ValueType::BigInt, schema.columns[1].value_type);
    }

    #[test]
    fn min_max_combined_with_same_function() {
        let s = select(vec![agg("m", AggregateFunction::Max, Some("b"))], Vec::new());
        let root = plan(&s, distributed());
        let PlanNode::HashAggregate(coord) = &root else {
            panic!("expected aggregate");
        };
        assert_eq!(
            AggregateFunction::Max,
            coord.node.aggregates[0].expr.as_aggregate().unwrap().function
        );
    }

    #[test]
    fn avg_disables_push_down() {
        let s = select(
            vec![
                agg("s", AggregateFunction::Sum, Some("a")),
                agg("v", AggregateFunction::Avg, Some("b")),
            ],
            Vec::new(),
        );
        let root = plan(&s, distributed());
        assert_eq!(
            vec![
                PlanNodeType::HashAggregate,
                PlanNodeType::Receive,
                PlanNodeType::Send,
                PlanNodeType::Scan,
            ],
            root.node_types()
        );
        let PlanNode::HashAggregate(agg) = &root else {
            panic!("expected aggregate");
        };
        assert!(!agg.node.coordinating);
    }

    #[test]
    fn distinct_aggregate_disables_push_down() {
        let s = select(
            vec![ParsedColInfo::computed(
                "c",
                distinct_aggregate(AggregateFunction::Count, column("t", "a", ValueType::Integer)),
            )],
            Vec::new(),
        );
        let root = plan(&s, distributed());
        let aggregates = root
            .node_types()
            .into_iter()
            .filter(|t| *t == PlanNodeType::HashAggregate)
            .count();
        assert_eq!(1, aggregates);
    }

    #[test]
    fn expression_of_aggregates_not_pushed_down() {
        let s = select(
            vec![ParsedColInfo::computed(
                "m1",
                add(
                    aggregate(AggregateFunction::Max, Some(column("t", "a", ValueType::Integer))),
                    lit(1),
                ),
            )],
            Vec::new(),
        );
        let root = plan(&s, distributed());
        assert_eq!(PlanNodeType::Receive, root.children()[0].node_type());
    }

    #[test]
    fn group_by_pass_through() {
        let s = select(
            vec![col("a"), agg("c", AggregateFunction::Count, Some("b"))],
            vec![col("a")],
        );
        let root = plan(&s, distributed());
        let PlanNode::HashAggregate(coord) = &root else {
            panic!("expected aggregate");
        };
        assert_eq!(1, coord.node.group_by.len());
        assert_eq!(0, coord.node.group_by[0].as_column().unwrap().column_idx);

        let schema = root.output_schema().unwrap();
        assert_eq!("a", schema.columns[0].name());
        assert_eq!("c", schema.columns[1].name());
    }

    #[test]
    fn group_by_without_aggregates() {
        let s = select(vec![col("a")], vec![col("a")]);
        let root = plan(&s, distributed());
        // Nothing to combine, grouping happens once at the coordinator.
        assert_eq!(
            vec![
                PlanNodeType::HashAggregate,
                PlanNodeType::Receive,
                PlanNodeType::Send,
                PlanNodeType::Scan,
            ],
            root.node_types()
        );
    }

    #[test]
    fn group_by_column_must_be_displayed() {
        let s = select(vec![agg("c", AggregateFunction::Count, None)], vec![col("b")]);
        let err = handle_aggregation_operators(distributed(), &s, &PlannerConfig::default())
            .unwrap_err();
        assert!(err.is_planning_error());
        assert_eq!(
            "GROUP BY column b is not in the display columns. \
             Please specify b as a display column.",
            err.get_msg()
        );
    }

    #[test]
    fn single_partition_aggregate() {
        let s = select(vec![agg("s", AggregateFunction::Sum, Some("a"))], Vec::new());
        let mut root = scan();
        root.generate_output_schema().unwrap();
        let root = plan(&s, root);
        assert_eq!(vec![PlanNodeType::HashAggregate, PlanNodeType::Scan], root.node_types());
    }

    #[test]
    fn push_down_disabled_by_config() {
        let s = select(vec![agg("s", AggregateFunction::Sum, Some("a"))], Vec::new());
        let config = PlannerConfig {
            enable_push_down: false,
            ..Default::default()
        };
        let root = handle_aggregation_operators(distributed(), &s, &config).unwrap();
        assert_eq!(PlanNodeType::Receive, root.children()[0].node_type());
    }
}
