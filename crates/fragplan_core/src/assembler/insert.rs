use std::collections::HashMap;

use fragplan_error::{DbError, OptionExt, Result};
use tracing::debug;

use super::write::sum_and_send;
use crate::catalog::Catalog;
use crate::expr::coerce::coerce_for_write;
use crate::expr::literal_expr::LiteralExpr;
use crate::expr::{Expression, lit};
use crate::partitioning::{PartitioningForStatement, PartitioningValue};
use crate::plan::operator::{Node, PlanNode};
use crate::plan::plan_dml::PlanInsert;
use crate::plan::plan_exchange::add_send_receive_pair;
use crate::plan::plan_project::PlanMaterialize;
use crate::schema::{SchemaColumn, TEMP_TABLE_NAME};
use crate::statement::ParsedInsert;
use crate::types::ValueType;

/// Build the only plan for an INSERT.
///
/// A single row is materialized with a value for every column of the
/// target table, in table order.
pub(super) fn insert_plan(
    catalog: &Catalog,
    insert: &ParsedInsert,
    partitioning: &mut PartitioningForStatement,
    param_overrides: &mut HashMap<usize, ValueType>,
) -> Result<PlanNode> {
    let table_name = insert.common.tables.first().required("insert target table")?;
    let table = catalog.table_required(table_name)?;

    if let Some(name) = insert.columns.keys().find(|name| table.get_column(name).is_none()) {
        return Err(DbError::new("Insert into unknown column")
            .with_field("table", &table.name)
            .with_field("column", name));
    }

    let mut materialize = PlanMaterialize::default();
    for column in table.sorted_columns() {
        let explicit = insert
            .columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&column.name))
            .map(|(_, expr)| expr.clone());

        let mut expr = match (explicit, &column.default) {
            (Some(expr), _) => expr,
            (None, Some(default)) => lit(default.clone()),
            (None, None) if column.nullable => Expression::Literal(LiteralExpr::null()),
            (None, None) => {
                return Err(DbError::planning(format!(
                    "Column {} has no default and is not nullable.",
                    column.name
                )));
            }
        };

        coerce_for_write(&mut expr, column.value_type, column.value_size(), param_overrides)?;

        let is_partition_column = partitioning
            .partitioning_column()
            .is_some_and(|pc| pc.matches(&table.name, &column.name));
        if is_partition_column {
            let name = format!("{}.{}", table.name, column.name);
            partitioning.add_partitioning_expression(name, expr.clone());
            if let Some(value) = PartitioningValue::from_expression(&expr) {
                debug!(%value, "insert partitioning value locked in");
                partitioning.set_effective_value(Some(value));
            }
        }

        materialize.columns.push(SchemaColumn::new(
            TEMP_TABLE_NAME,
            column.name.clone(),
            column.name.clone(),
            expr,
        ));
    }

    let insert_node = PlanNode::Insert(Node::with_child(
        PlanInsert {
            target_table: table.name.clone(),
            multi_partition: !partitioning.was_specified_as_single(),
        },
        PlanNode::Materialize(Node::new(materialize)),
    ));

    if partitioning.is_single_partition() {
        return Ok(insert_node);
    }

    // Send the row to every partition, each keeps it only if it owns it.
    Ok(sum_and_send(add_send_receive_pair(insert_node)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnEntry, TableEntry};
    use crate::expr::param;
    use crate::partitioning::PartitionColumn;
    use crate::plan::operator::PlanNodeType;
    use crate::statement::StatementCommon;
    use crate::types::ScalarValue;

    fn catalog() -> Catalog {
        Catalog::new().with_table(
            TableEntry::new(
                "t",
                vec![
                    ColumnEntry::new("b", 1, ValueType::SmallInt).with_default(7),
                    ColumnEntry::new("a", 0, ValueType::Integer).not_null(),
                    ColumnEntry::new("c", 2, ValueType::Varchar).with_size(16),
                ],
            )
            .partitioned_on("a"),
        )
    }

    fn insert(values: Vec<(&str, Expression)>) -> ParsedInsert {
        ParsedInsert {
            common: StatementCommon::new("INSERT INTO t", ["t"]),
            columns: values.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    fn multi_partition() -> PartitioningForStatement {
        let mut partitioning = PartitioningForStatement::multi_partition();
        partitioning.set_partitioning_column(Some(PartitionColumn {
            table: "t".to_string(),
            column: "a".to_string(),
        }));
        partitioning
    }

    fn materialized(root: &PlanNode) -> &PlanMaterialize {
        match root {
            PlanNode::Materialize(m) => &m.node,
            other => materialized(&other.children()[0]),
        }
    }

    #[test]
    fn fills_defaults_in_table_order() {
        let mut partitioning = PartitioningForStatement::single_partition();
        let mut overrides = HashMap::new();
        let mut root = insert_plan(
            &catalog(),
            &insert(vec![("A", lit(1))]),
            &mut partitioning,
            &mut overrides,
        )
        .unwrap();
        root.generate_output_schema().unwrap();

        assert_eq!(vec![PlanNodeType::Insert, PlanNodeType::Materialize], root.node_types());
        let mat = materialized(&root);
        let names: Vec<_> = mat.columns.iter().map(|c| c.name()).collect();
        assert_eq!(vec!["a", "b", "c"], names);

        let Expression::Literal(b) = &mat.columns.columns[1].expr else {
            panic!("expected literal");
        };
        assert_eq!(ScalarValue::Int(7), b.value);
        assert_eq!(ValueType::SmallInt, b.value_type);

        let Expression::Literal(c) = &mat.columns.columns[2].expr else {
            panic!("expected literal");
        };
        assert_eq!(ScalarValue::Null, c.value);
    }

    #[test]
    fn missing_required_column() {
        let err = insert_plan(
            &catalog(),
            &insert(vec![("c", lit("x"))]),
            &mut PartitioningForStatement::single_partition(),
            &mut HashMap::new(),
        )
        .unwrap_err();
        assert!(err.is_planning_error());
        assert_eq!("Column a has no default and is not nullable.", err.get_msg());
    }

    #[test]
    fn unknown_column() {
        let err = insert_plan(
            &catalog(),
            &insert(vec![("a", lit(1)), ("z", lit(1))]),
            &mut PartitioningForStatement::single_partition(),
            &mut HashMap::new(),
        )
        .unwrap_err();
        assert!(!err.is_planning_error());
    }

    #[test]
    fn constant_partition_key_locks_in() {
        let mut partitioning = multi_partition();
        let root = insert_plan(
            &catalog(),
            &insert(vec![("a", lit(42))]),
            &mut partitioning,
            &mut HashMap::new(),
        )
        .unwrap();

        assert_eq!(vec![PlanNodeType::Insert, PlanNodeType::Materialize], root.node_types());
        assert_eq!(
            Some(&PartitioningValue::Constant(ScalarValue::Int(42))),
            partitioning.effective_partitioning_value()
        );
        assert!(partitioning.partitioning_expressions().contains_key("t.a"));
        let PlanNode::Insert(insert) = &root else {
            panic!("expected insert");
        };
        assert!(insert.node.multi_partition);
    }

    #[test]
    fn null_partition_key_not_locked_in() {
        let mut partitioning = multi_partition();
        let root = insert_plan(
            &catalog(),
            &insert(vec![("a", Expression::Literal(LiteralExpr::null()))]),
            &mut partitioning,
            &mut HashMap::new(),
        )
        .unwrap();

        assert!(partitioning.effective_partitioning_value().is_none());
        assert!(!partitioning.is_single_partition());
        assert_eq!(PlanNodeType::Send, root.node_type());
        assert!(root.has_any_node_of_type(PlanNodeType::Receive));
    }

    #[test]
    fn parameter_partition_key_sums_counts() {
        let mut partitioning = multi_partition();
        let mut overrides = HashMap::new();
        let mut root = insert_plan(
            &catalog(),
            &insert(vec![("a", param(0, ValueType::BigInt)), ("b", param(1, ValueType::BigInt))]),
            &mut partitioning,
            &mut overrides,
        )
        .unwrap();
        root.generate_output_schema().unwrap();

        assert_eq!(
            vec![
                PlanNodeType::Send,
                PlanNodeType::Aggregate,
                PlanNodeType::Receive,
                PlanNodeType::Send,
                PlanNodeType::Insert,
                PlanNodeType::Materialize,
            ],
            root.node_types()
        );
        assert!(partitioning.effective_partitioning_value().is_none());
        assert_eq!(Some(&ValueType::Integer), overrides.get(&0));
        assert_eq!(Some(&ValueType::SmallInt), overrides.get(&1));
    }
}
