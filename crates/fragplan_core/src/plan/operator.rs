use std::fmt;

use fragplan_error::{DbError, OptionExt, Result};

use super::plan_aggregate::PlanAggregate;
use super::plan_distinct::PlanDistinct;
use super::plan_dml::{PlanDelete, PlanInsert, PlanUpdate};
use super::plan_exchange::{PlanReceive, PlanSend};
use super::plan_limit::PlanLimit;
use super::plan_order::{PlanOrderBy, SortDirection};
use super::plan_project::{PlanMaterialize, PlanProjection};
use super::plan_scan::{PlanIndexScan, PlanScan};
use crate::expr::Expression;
use crate::schema::NodeSchema;

/// Derive the output schema of a plan node from the schema of its input.
///
/// Implementations resolve the node's own expressions against the input as a
/// side effect.
pub trait DeriveSchema {
    fn derive_schema(&mut self, input: Option<&NodeSchema>) -> Result<NodeSchema>;
}

/// Wrapper around nodes in the plan tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<N> {
    /// Node specific logic.
    pub node: N,
    /// Inputs to this node.
    pub children: Vec<PlanNode>,
    /// Node evaluated as part of this node instead of as a separate step.
    ///
    /// Only projections inlined into scans.
    pub inline: Option<Box<PlanNode>>,
    /// Output schema, None until generated or after the subtree below this
    /// node was changed.
    pub output_schema: Option<NodeSchema>,
}

impl<N> Node<N> {
    pub fn new(node: N) -> Self {
        Node {
            node,
            children: Vec::new(),
            inline: None,
            output_schema: None,
        }
    }

    pub fn with_child(node: N, child: PlanNode) -> Self {
        Node {
            node,
            children: vec![child],
            inline: None,
            output_schema: None,
        }
    }

    /// Take the only child of this node, leaving the node without children.
    ///
    /// Errors if the node doesn't have exactly one child.
    pub fn take_one_child_exact(&mut self) -> Result<PlanNode> {
        if self.children.len() != 1 {
            return Err(DbError::new("Expected exactly one child")
                .with_field("children", self.children.len()));
        }
        self.output_schema = None;
        self.children.pop().required("single child")
    }

    pub fn get_one_child_exact_mut(&mut self) -> Result<&mut PlanNode> {
        if self.children.len() != 1 {
            return Err(DbError::new("Expected exactly one child")
                .with_field("children", self.children.len()));
        }
        Ok(&mut self.children[0])
    }

    pub fn output_schema(&self) -> Result<&NodeSchema> {
        self.output_schema
            .as_ref()
            .ok_or_else(|| DbError::new("Output schema has not been generated"))
    }
}

impl<N: DeriveSchema> Node<N> {
    /// Generate output schemas for this node and everything below it.
    fn generate_output_schema(&mut self) -> Result<()> {
        for child in &mut self.children {
            child.generate_output_schema()?;
        }

        let input = match self.children.as_slice() {
            [] => None,
            [child] => Some(child.output_schema()?),
            children => {
                return Err(DbError::new("Plan nodes take at most one input")
                    .with_field("children", children.len()));
            }
        };

        let mut schema = self.node.derive_schema(input)?;
        if let Some(inline) = self.inline.as_deref_mut() {
            schema = inline.generate_inline_schema(&schema)?;
        }
        self.output_schema = Some(schema);

        Ok(())
    }
}

impl<N> AsRef<N> for Node<N> {
    fn as_ref(&self) -> &N {
        &self.node
    }
}

impl<N> AsMut<N> for Node<N> {
    fn as_mut(&mut self) -> &mut N {
        &mut self.node
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanNodeType {
    Scan,
    IndexScan,
    Aggregate,
    HashAggregate,
    Distinct,
    OrderBy,
    Limit,
    Projection,
    Materialize,
    Insert,
    Update,
    Delete,
    Send,
    Receive,
}

impl fmt::Display for PlanNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Scan => "Scan",
            Self::IndexScan => "IndexScan",
            Self::Aggregate => "Aggregate",
            Self::HashAggregate => "HashAggregate",
            Self::Distinct => "Distinct",
            Self::OrderBy => "OrderBy",
            Self::Limit => "Limit",
            Self::Projection => "Projection",
            Self::Materialize => "Materialize",
            Self::Insert => "Insert",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Send => "Send",
            Self::Receive => "Receive",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    Scan(Node<PlanScan>),
    IndexScan(Node<PlanIndexScan>),
    /// Aggregate over input already sorted on the group by keys.
    Aggregate(Node<PlanAggregate>),
    HashAggregate(Node<PlanAggregate>),
    Distinct(Node<PlanDistinct>),
    OrderBy(Node<PlanOrderBy>),
    Limit(Node<PlanLimit>),
    Projection(Node<PlanProjection>),
    Materialize(Node<PlanMaterialize>),
    Insert(Node<PlanInsert>),
    Update(Node<PlanUpdate>),
    Delete(Node<PlanDelete>),
    Send(Node<PlanSend>),
    Receive(Node<PlanReceive>),
}

impl PlanNode {
    pub fn node_type(&self) -> PlanNodeType {
        match self {
            Self::Scan(_) => PlanNodeType::Scan,
            Self::IndexScan(_) => PlanNodeType::IndexScan,
            Self::Aggregate(_) => PlanNodeType::Aggregate,
            Self::HashAggregate(_) => PlanNodeType::HashAggregate,
            Self::Distinct(_) => PlanNodeType::Distinct,
            Self::OrderBy(_) => PlanNodeType::OrderBy,
            Self::Limit(_) => PlanNodeType::Limit,
            Self::Projection(_) => PlanNodeType::Projection,
            Self::Materialize(_) => PlanNodeType::Materialize,
            Self::Insert(_) => PlanNodeType::Insert,
            Self::Update(_) => PlanNodeType::Update,
            Self::Delete(_) => PlanNodeType::Delete,
            Self::Send(_) => PlanNodeType::Send,
            Self::Receive(_) => PlanNodeType::Receive,
        }
    }

    pub fn children(&self) -> &[PlanNode] {
        match self {
            Self::Scan(n) => &n.children,
            Self::IndexScan(n) => &n.children,
            Self::Aggregate(n) => &n.children,
            Self::HashAggregate(n) => &n.children,
            Self::Distinct(n) => &n.children,
            Self::OrderBy(n) => &n.children,
            Self::Limit(n) => &n.children,
            Self::Projection(n) => &n.children,
            Self::Materialize(n) => &n.children,
            Self::Insert(n) => &n.children,
            Self::Update(n) => &n.children,
            Self::Delete(n) => &n.children,
            Self::Send(n) => &n.children,
            Self::Receive(n) => &n.children,
        }
    }

    pub fn inline(&self) -> Option<&PlanNode> {
        match self {
            Self::Scan(n) => n.inline.as_deref(),
            Self::IndexScan(n) => n.inline.as_deref(),
            _ => None,
        }
    }

    /// Get the generated output schema.
    ///
    /// Errors if the schema hasn't been generated, or if it was invalidated
    /// by changing the subtree.
    pub fn output_schema(&self) -> Result<&NodeSchema> {
        let schema = match self {
            Self::Scan(n) => &n.output_schema,
            Self::IndexScan(n) => &n.output_schema,
            Self::Aggregate(n) => &n.output_schema,
            Self::HashAggregate(n) => &n.output_schema,
            Self::Distinct(n) => &n.output_schema,
            Self::OrderBy(n) => &n.output_schema,
            Self::Limit(n) => &n.output_schema,
            Self::Projection(n) => &n.output_schema,
            Self::Materialize(n) => &n.output_schema,
            Self::Insert(n) => &n.output_schema,
            Self::Update(n) => &n.output_schema,
            Self::Delete(n) => &n.output_schema,
            Self::Send(n) => &n.output_schema,
            Self::Receive(n) => &n.output_schema,
        };
        schema.as_ref().ok_or_else(|| {
            DbError::new("Output schema has not been generated")
                .with_field("node", self.node_type())
        })
    }

    /// Generate output schemas bottom up for the whole subtree.
    pub fn generate_output_schema(&mut self) -> Result<()> {
        match self {
            Self::Scan(n) => n.generate_output_schema(),
            Self::IndexScan(n) => n.generate_output_schema(),
            Self::Aggregate(n) => n.generate_output_schema(),
            Self::HashAggregate(n) => n.generate_output_schema(),
            Self::Distinct(n) => n.generate_output_schema(),
            Self::OrderBy(n) => n.generate_output_schema(),
            Self::Limit(n) => n.generate_output_schema(),
            Self::Projection(n) => n.generate_output_schema(),
            Self::Materialize(n) => n.generate_output_schema(),
            Self::Insert(n) => n.generate_output_schema(),
            Self::Update(n) => n.generate_output_schema(),
            Self::Delete(n) => n.generate_output_schema(),
            Self::Send(n) => n.generate_output_schema(),
            Self::Receive(n) => n.generate_output_schema(),
        }
    }

    /// Generate the schema for an inlined node operating on rows of `input`.
    fn generate_inline_schema(&mut self, input: &NodeSchema) -> Result<NodeSchema> {
        match self {
            Self::Projection(n) => {
                let schema = n.node.derive_schema(Some(input))?;
                n.output_schema = Some(schema.clone());
                Ok(schema)
            }
            other => Err(DbError::new("Only projections can be inlined")
                .with_field("node", other.node_type())),
        }
    }

    /// Check if this node, any node below it, or any inlined node is of the
    /// given type.
    pub fn has_any_node_of_type(&self, ty: PlanNodeType) -> bool {
        if self.node_type() == ty {
            return true;
        }
        if self.inline().is_some_and(|n| n.has_any_node_of_type(ty)) {
            return true;
        }
        self.children().iter().any(|c| c.has_any_node_of_type(ty))
    }

    /// Node types of this subtree in pre-order, not including inlined nodes.
    pub fn node_types(&self) -> Vec<PlanNodeType> {
        let mut types = Vec::new();
        self.collect_node_types(&mut types);
        types
    }

    fn collect_node_types(&self, types: &mut Vec<PlanNodeType>) {
        types.push(self.node_type());
        for child in self.children() {
            child.collect_node_types(types);
        }
    }

    pub fn is_scan(&self) -> bool {
        matches!(self, Self::Scan(_) | Self::IndexScan(_))
    }

    /// Get the predicate of a scan node.
    pub fn scan_predicate(&self) -> Result<Option<&Expression>> {
        match self {
            Self::Scan(n) => Ok(n.node.predicate.as_ref()),
            Self::IndexScan(n) => Ok(n.node.scan.predicate.as_ref()),
            other => {
                Err(DbError::new("Expected a scan node").with_field("node", other.node_type()))
            }
        }
    }

    /// Inline a projection into a scan node.
    pub fn set_inline(&mut self, inline: PlanNode) -> Result<()> {
        if inline.node_type() != PlanNodeType::Projection {
            return Err(DbError::new("Only projections can be inlined")
                .with_field("node", inline.node_type()));
        }
        match self {
            Self::Scan(n) => {
                n.inline = Some(Box::new(inline));
                n.output_schema = None;
            }
            Self::IndexScan(n) => {
                n.inline = Some(Box::new(inline));
                n.output_schema = None;
            }
            other => {
                return Err(DbError::new("Inlined nodes only supported on scans")
                    .with_field("node", other.node_type()));
            }
        }
        Ok(())
    }

    /// Direction of the order an index scan produces rows in.
    ///
    /// None for anything other than an index scan.
    pub fn index_sort_direction(&self) -> Option<SortDirection> {
        match self {
            Self::IndexScan(n) => Some(n.node.sort_direction),
            _ => None,
        }
    }

    /// If this node produces rows sorted by an index.
    pub fn is_index_sorted(&self) -> bool {
        self.index_sort_direction().is_some_and(|d| d.is_valid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnEntry, TableEntry};
    use crate::plan::plan_exchange::add_send_receive_pair;
    use crate::types::ValueType;

    fn table() -> TableEntry {
        TableEntry::new(
            "t",
            vec![
                ColumnEntry::new("a", 0, ValueType::Integer),
                ColumnEntry::new("b", 1, ValueType::Varchar).with_size(8),
            ],
        )
    }

    #[test]
    fn output_schema_missing_before_generate() {
        let node = PlanNode::Scan(Node::new(PlanScan::new(&table())));
        node.output_schema().unwrap_err();
    }

    #[test]
    fn generate_scan_schema() {
        let mut node = PlanNode::Scan(Node::new(PlanScan::new(&table())));
        node.generate_output_schema().unwrap();
        let schema = node.output_schema().unwrap();
        assert_eq!(2, schema.len());
        assert_eq!("b", schema.columns[1].name());
        assert_eq!(8, schema.columns[1].value_size);
    }

    #[test]
    fn node_types_preorder() {
        let scan = PlanNode::Scan(Node::new(PlanScan::new(&table())));
        let plan = add_send_receive_pair(scan);
        assert_eq!(
            vec![PlanNodeType::Receive, PlanNodeType::Send, PlanNodeType::Scan],
            plan.node_types()
        );
        assert!(plan.has_any_node_of_type(PlanNodeType::Scan));
        assert!(!plan.has_any_node_of_type(PlanNodeType::Limit));
    }

    #[test]
    fn inline_only_on_scans() {
        let mut limit = PlanNode::Limit(Node::new(PlanLimit::default()));
        let proj = PlanNode::Projection(Node::new(PlanProjection::default()));
        limit.set_inline(proj.clone()).unwrap_err();

        let mut scan = PlanNode::Scan(Node::new(PlanScan::new(&table())));
        scan.set_inline(proj).unwrap();
        assert!(scan.has_any_node_of_type(PlanNodeType::Projection));
        assert_eq!(vec![PlanNodeType::Scan], scan.node_types());
    }
}
