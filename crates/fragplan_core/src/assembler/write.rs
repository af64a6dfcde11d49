use std::collections::HashMap;

use fragplan_error::{DbError, OptionExt, Result};
use tracing::debug;

use crate::catalog::{Catalog, TableEntry};
use crate::config::planner::PlannerConfig;
use crate::expr::aggregate_expr::AggregateFunction;
use crate::expr::coerce::coerce_for_write;
use crate::expr::{Expression, aggregate};
use crate::partitioning::PartitioningForStatement;
use crate::plan::operator::{Node, PlanNode};
use crate::plan::plan_aggregate::PlanAggregate;
use crate::plan::plan_dml::{PlanDelete, PlanUpdate};
use crate::plan::plan_exchange::{PlanSend, add_send_receive_pair};
use crate::plan::plan_project::PlanProjection;
use crate::schema::{
    NodeSchema,
    SchemaColumn,
    TEMP_TABLE_NAME,
    TUPLE_ADDRESS_COLUMN,
    modified_tuples_column_ref,
};
use crate::statement::{ParsedDelete, ParsedUpdate, StatementCommon};
use crate::subplan::SubPlanSource;
use crate::types::ValueType;

/// Build an UPDATE plan on top of the next candidate scan.
pub(super) fn next_update_plan(
    catalog: &Catalog,
    source: &mut dyn SubPlanSource,
    update: &ParsedUpdate,
    partitioning: &PartitioningForStatement,
    param_overrides: &mut HashMap<usize, ValueType>,
) -> Result<Option<PlanNode>> {
    let table = target_table(catalog, &update.common)?;
    let Some(mut scan) = next_scan(source, partitioning)? else {
        return Ok(None);
    };

    let indexed = table.indexed_column_names();
    let mut projection = tuple_address_projection();
    let mut update_indexes = false;

    for (name, value) in &update.assignments {
        let column = table.get_column(name).ok_or_else(|| {
            DbError::new("Update of unknown column")
                .with_field("table", &table.name)
                .with_field("column", name)
        })?;

        let mut expr = value.clone();
        coerce_for_write(&mut expr, column.value_type, column.value_size(), param_overrides)?;
        projection.columns.push(SchemaColumn::new(
            TEMP_TABLE_NAME,
            column.name.clone(),
            column.name.clone(),
            expr,
        ));

        if indexed.contains(&column.name.to_ascii_lowercase()) {
            update_indexes = true;
        }
    }

    scan.set_inline(PlanNode::Projection(Node::new(projection)))?;
    let root = PlanNode::Update(Node::with_child(
        PlanUpdate {
            target_table: table.name.clone(),
            update_indexes,
        },
        scan,
    ));

    Ok(Some(distribute_write(root, partitioning)))
}

/// Build a DELETE plan on top of the next candidate scan.
///
/// A single-partition delete of every row truncates the table instead of
/// scanning it.
pub(super) fn next_delete_plan(
    catalog: &Catalog,
    source: &mut dyn SubPlanSource,
    delete: &ParsedDelete,
    partitioning: &PartitioningForStatement,
    config: &PlannerConfig,
) -> Result<Option<PlanNode>> {
    let table = target_table(catalog, &delete.common)?;
    let Some(mut scan) = next_scan(source, partitioning)? else {
        return Ok(None);
    };

    if partitioning.was_specified_as_single()
        && config.enable_truncate_delete
        && scan.scan_predicate()?.is_none()
    {
        debug!(table = %table.name, "truncating delete");
        return Ok(Some(PlanNode::Delete(Node::new(PlanDelete {
            target_table: table.name.clone(),
            truncate: true,
        }))));
    }

    scan.set_inline(PlanNode::Projection(Node::new(tuple_address_projection())))?;
    let root = PlanNode::Delete(Node::with_child(
        PlanDelete {
            target_table: table.name.clone(),
            truncate: false,
        },
        scan,
    ));

    Ok(Some(distribute_write(root, partitioning)))
}

/// Aggregate the modified tuple counts reported by every partition into a
/// single count, and send it to the client.
pub(super) fn sum_and_send(root: PlanNode) -> PlanNode {
    let mut sum = PlanAggregate {
        output: NodeSchema::modified_tuples(),
        ..Default::default()
    };
    sum.add_aggregate(
        aggregate(AggregateFunction::Sum, Some(modified_tuples_column_ref())),
        0,
    );

    PlanNode::Send(Node::with_child(
        PlanSend {
            multi_partition: false,
        },
        PlanNode::Aggregate(Node::with_child(sum, root)),
    ))
}

fn distribute_write(root: PlanNode, partitioning: &PartitioningForStatement) -> PlanNode {
    if partitioning.is_single_partition() {
        root
    } else {
        sum_and_send(add_send_receive_pair(root))
    }
}

fn target_table<'a>(catalog: &'a Catalog, common: &StatementCommon) -> Result<&'a TableEntry> {
    let name = common.tables.first().required("write target table")?;
    catalog.table_required(name)
}

fn next_scan(
    source: &mut dyn SubPlanSource,
    partitioning: &PartitioningForStatement,
) -> Result<Option<PlanNode>> {
    match source.next_plan(partitioning)? {
        Some(node) if node.is_scan() => Ok(Some(node)),
        Some(node) => Err(DbError::new("Write candidate must be a scan")
            .with_field("node", node.node_type())),
        None => Ok(None),
    }
}

/// Projection producing the address of each row to modify.
fn tuple_address_projection() -> PlanProjection {
    PlanProjection {
        columns: NodeSchema::new(vec![SchemaColumn::new(
            TEMP_TABLE_NAME,
            TUPLE_ADDRESS_COLUMN,
            TUPLE_ADDRESS_COLUMN,
            Expression::TupleAddress,
        )]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnEntry, IndexEntry};
    use crate::expr::{column, eq, lit, param};
    use crate::plan::operator::PlanNodeType;
    use crate::plan::plan_scan::PlanScan;
    use crate::subplan::CandidateList;

    fn table() -> TableEntry {
        TableEntry::new(
            "t",
            vec![
                ColumnEntry::new("a", 0, ValueType::Integer),
                ColumnEntry::new("b", 1, ValueType::Integer),
                ColumnEntry::new("c", 2, ValueType::Varchar).with_size(8),
            ],
        )
        .partitioned_on("a")
        .with_index(IndexEntry::new("t_b", ["b"]))
    }

    fn catalog() -> Catalog {
        Catalog::new().with_table(table())
    }

    fn scan(predicate: Option<Expression>) -> CandidateList {
        CandidateList::new([PlanNode::Scan(Node::new(
            PlanScan::new(&table()).with_predicate(predicate),
        ))])
    }

    fn update(assignments: Vec<(&str, Expression)>) -> ParsedUpdate {
        ParsedUpdate {
            common: StatementCommon::new("UPDATE t", ["t"]),
            assignments: assignments.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    fn delete() -> ParsedDelete {
        ParsedDelete {
            common: StatementCommon::new("DELETE FROM t", ["t"]),
        }
    }

    fn inlined_columns(root: &PlanNode) -> Vec<String> {
        let scan = match root {
            PlanNode::Update(n) => &n.children[0],
            PlanNode::Delete(n) => &n.children[0],
            other => panic!("unexpected root: {}", other.node_type()),
        };
        match scan.inline() {
            Some(PlanNode::Projection(p)) => {
                p.node.columns.iter().map(|c| c.name().to_string()).collect()
            }
            other => panic!("unexpected inline: {other:?}"),
        }
    }

    #[test]
    fn single_partition_update() {
        let mut overrides = HashMap::new();
        let mut root = next_update_plan(
            &catalog(),
            &mut scan(None),
            &update(vec![("c", param(0, ValueType::BigInt))]),
            &PartitioningForStatement::single_partition(),
            &mut overrides,
        )
        .unwrap()
        .unwrap();
        root.generate_output_schema().unwrap();

        assert_eq!(vec![PlanNodeType::Update, PlanNodeType::Scan], root.node_types());
        assert_eq!(vec!["tuple_address", "c"], inlined_columns(&root));
        assert_eq!(Some(&ValueType::Varchar), overrides.get(&0));

        let PlanNode::Update(update) = &root else {
            panic!("expected update");
        };
        assert!(!update.node.update_indexes);
        assert_eq!(&NodeSchema::modified_tuples(), root.output_schema().unwrap());
    }

    #[test]
    fn indexed_column_update() {
        let root = next_update_plan(
            &catalog(),
            &mut scan(None),
            &update(vec![("B", lit(4))]),
            &PartitioningForStatement::single_partition(),
            &mut HashMap::new(),
        )
        .unwrap()
        .unwrap();
        let PlanNode::Update(update) = &root else {
            panic!("expected update");
        };
        assert!(update.node.update_indexes);
    }

    #[test]
    fn multi_partition_update_sums_counts() {
        let mut root = next_update_plan(
            &catalog(),
            &mut scan(None),
            &update(vec![("b", lit(4))]),
            &PartitioningForStatement::multi_partition(),
            &mut HashMap::new(),
        )
        .unwrap()
        .unwrap();
        root.generate_output_schema().unwrap();

        assert_eq!(
            vec![
                PlanNodeType::Send,
                PlanNodeType::Aggregate,
                PlanNodeType::Receive,
                PlanNodeType::Send,
                PlanNodeType::Update,
                PlanNodeType::Scan,
            ],
            root.node_types()
        );
        assert_eq!(&NodeSchema::modified_tuples(), root.output_schema().unwrap());
    }

    #[test]
    fn update_unknown_column() {
        let err = next_update_plan(
            &catalog(),
            &mut scan(None),
            &update(vec![("z", lit(4))]),
            &PartitioningForStatement::single_partition(),
            &mut HashMap::new(),
        )
        .unwrap_err();
        assert_eq!(Some("z"), err.get_field("column"));
    }

    #[test]
    fn write_candidate_must_be_scan() {
        let mut source = CandidateList::new([add_send_receive_pair(PlanNode::Scan(Node::new(
            PlanScan::new(&table()),
        )))]);
        let err = next_delete_plan(
            &catalog(),
            &mut source,
            &delete(),
            &PartitioningForStatement::single_partition(),
            &PlannerConfig::default(),
        )
        .unwrap_err();
        assert!(!err.is_planning_error());
    }

    #[test]
    fn unfiltered_single_partition_delete_truncates() {
        let mut root = next_delete_plan(
            &catalog(),
            &mut scan(None),
            &delete(),
            &PartitioningForStatement::single_partition(),
            &PlannerConfig::default(),
        )
        .unwrap()
        .unwrap();
        root.generate_output_schema().unwrap();

        assert_eq!(vec![PlanNodeType::Delete], root.node_types());
        let PlanNode::Delete(delete) = &root else {
            panic!("expected delete");
        };
        assert!(delete.node.truncate);
    }

    #[test]
    fn truncate_disabled_by_config() {
        let config = PlannerConfig {
            enable_truncate_delete: false,
            ..Default::default()
        };
        let root = next_delete_plan(
            &catalog(),
            &mut scan(None),
            &delete(),
            &PartitioningForStatement::single_partition(),
            &config,
        )
        .unwrap()
        .unwrap();
        assert_eq!(vec![PlanNodeType::Delete, PlanNodeType::Scan], root.node_types());
    }

    #[test]
    fn filtered_delete_scans() {
        let predicate = eq(column("t", "b", ValueType::Integer), lit(1));
        let mut root = next_delete_plan(
            &catalog(),
            &mut scan(Some(predicate)),
            &delete(),
            &PartitioningForStatement::single_partition(),
            &PlannerConfig::default(),
        )
        .unwrap()
        .unwrap();
        root.generate_output_schema().unwrap();

        assert_eq!(vec![PlanNodeType::Delete, PlanNodeType::Scan], root.node_types());
        assert_eq!(vec!["tuple_address"], inlined_columns(&root));
    }

    #[test]
    fn multi_partition_delete_never_truncates() {
        let root = next_delete_plan(
            &catalog(),
            &mut scan(None),
            &delete(),
            &PartitioningForStatement::multi_partition(),
            &PlannerConfig::default(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(PlanNodeType::Send, root.node_type());
        let receive = match &root.children()[0].children()[0] {
            PlanNode::Receive(receive) => receive,
            other => panic!("unexpected node: {}", other.node_type()),
        };
        let PlanNode::Delete(delete) = &receive.children[0].children()[0] else {
            panic!("expected delete below send");
        };
        assert!(!delete.node.truncate);
    }

    #[test]
    fn exhausted_source() {
        let root = next_delete_plan(
            &catalog(),
            &mut CandidateList::new(Vec::new()),
            &delete(),
            &PartitioningForStatement::single_partition(),
            &PlannerConfig::default(),
        )
        .unwrap();
        assert!(root.is_none());
    }
}
