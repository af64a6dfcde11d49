use crate::explain::explainable::ExplainConfig;
use crate::explain::node::ExplainNode;
use crate::expr::Expression;
use crate::partitioning::PartitioningValue;
use crate::plan::operator::PlanNode;
use crate::schema::NodeSchema;
use crate::statement::ParameterInfo;

/// A complete candidate plan for a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPlan {
    /// Root of the coordinator fragment.
    pub root: PlanNode,
    /// Parameter types, with any types forced during planning applied.
    pub parameters: Vec<ParameterInfo>,
    pub output_schema: NodeSchema,
    /// The set of rows returned doesn't depend on execution order.
    pub content_deterministic: bool,
    /// The order of rows returned doesn't depend on execution order.
    pub order_deterministic: bool,
    /// Partitioning value the statement was found to be routed by, if any.
    pub partitioning_key: Option<PartitioningValue>,
    /// Statement modifies a replicated table.
    pub replicated_table_dml: bool,
    pub read_only: bool,
    pub sql: String,
    pub full_where_clause: Option<Expression>,
}

/// A piece of a plan executed as one unit.
#[derive(Debug, Clone, Copy)]
pub struct Fragment<'a> {
    pub root: &'a PlanNode,
    /// Executed on every partition.
    pub multi_partition: bool,
}

impl CompiledPlan {
    /// Split the plan into fragments at each send/receive boundary.
    ///
    /// The coordinator fragment comes first, followed by distributed
    /// fragments in the order they're found.
    pub fn fragments(&self) -> Vec<Fragment<'_>> {
        let mut fragments = vec![Fragment {
            root: &self.root,
            multi_partition: false,
        }];
        collect_fragments(&self.root, &mut fragments);
        fragments
    }

    pub fn is_multi_fragment(&self) -> bool {
        self.fragments().len() > 1
    }

    /// Explain each fragment of the plan.
    pub fn explain(&self, verbose: bool) -> Vec<ExplainNode> {
        let conf = ExplainConfig { verbose };
        self.fragments()
            .into_iter()
            .map(|frag| ExplainNode::walk_fragment(conf, frag.root))
            .collect()
    }
}

fn collect_fragments<'a>(node: &'a PlanNode, fragments: &mut Vec<Fragment<'a>>) {
    if let PlanNode::Receive(receive) = node {
        for child in &receive.children {
            if let PlanNode::Send(send) = child {
                fragments.push(Fragment {
                    root: child,
                    multi_partition: send.node.multi_partition,
                });
            }
        }
    }
    for child in node.children() {
        collect_fragments(child, fragments);
    }
}
