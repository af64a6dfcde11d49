use fragplan_error::{DbError, OptionExt, Result};

use super::operator::{DeriveSchema, Node, PlanNode};
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};
use crate::schema::NodeSchema;

/// Send rows from a fragment to whoever consumes its results.
///
/// The root of every plan is a send, and the distributed fragment of a
/// multi-partition plan is rooted by one too.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSend {
    pub multi_partition: bool,
}

impl DeriveSchema for PlanSend {
    fn derive_schema(&mut self, input: Option<&NodeSchema>) -> Result<NodeSchema> {
        let input = input.required("input to send")?;
        Ok(input.clone())
    }
}

impl Explainable for PlanSend {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Send").with_value("multi_partition", self.multi_partition)
    }
}

/// Collect rows sent by every partition executing the fragment below.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanReceive;

impl DeriveSchema for PlanReceive {
    fn derive_schema(&mut self, input: Option<&NodeSchema>) -> Result<NodeSchema> {
        let input = input.required("input to receive")?;
        Ok(input.clone())
    }
}

impl Explainable for PlanReceive {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Receive")
    }
}

/// Split `distributed` off into its own fragment, returning the coordinator
/// side receive.
pub fn add_send_receive_pair(distributed: PlanNode) -> PlanNode {
    let send = PlanNode::Send(Node::with_child(
        PlanSend {
            multi_partition: true,
        },
        distributed,
    ));
    PlanNode::Receive(Node::with_child(PlanReceive, send))
}

impl Node<PlanReceive> {
    fn send_mut(&mut self) -> Result<&mut Node<PlanSend>> {
        match self.get_one_child_exact_mut()? {
            PlanNode::Send(send) => Ok(send),
            other => Err(DbError::new("Expected send below receive")
                .with_field("node", other.node_type())),
        }
    }

    /// Detach the subtree the partitions execute, leaving the send below this
    /// receive without an input.
    ///
    /// Output schemas of the receive and send are cleared.
    pub fn take_distributed_input(&mut self) -> Result<PlanNode> {
        self.output_schema = None;
        let send = self.send_mut()?;
        send.take_one_child_exact()
    }

    /// Reattach a (possibly extended) distributed subtree below the send.
    pub fn set_distributed_input(&mut self, input: PlanNode) -> Result<()> {
        self.output_schema = None;
        let send = self.send_mut()?;
        if !send.children.is_empty() {
            return Err(DbError::new("Send already has an input"));
        }
        send.output_schema = None;
        send.children.push(input);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnEntry, TableEntry};
    use crate::plan::operator::PlanNodeType;
    use crate::plan::plan_limit::PlanLimit;
    use crate::plan::plan_scan::PlanScan;
    use crate::types::ValueType;

    fn scan() -> PlanNode {
        let table = TableEntry::new("t", vec![ColumnEntry::new("a", 0, ValueType::Integer)]);
        PlanNode::Scan(Node::new(PlanScan::new(&table)))
    }

    #[test]
    fn detach_reattach() {
        let mut plan = add_send_receive_pair(scan());
        plan.generate_output_schema().unwrap();

        let PlanNode::Receive(receive) = &mut plan else {
            panic!("expected receive");
        };
        let input = receive.take_distributed_input().unwrap();
        assert_eq!(PlanNodeType::Scan, input.node_type());
        // Stale schema can't be read.
        receive.output_schema().unwrap_err();

        let limit = PlanNode::Limit(Node::with_child(PlanLimit::default(), input));
        receive.set_distributed_input(limit).unwrap();

        plan.generate_output_schema().unwrap();
        assert_eq!(
            vec![
                PlanNodeType::Receive,
                PlanNodeType::Send,
                PlanNodeType::Limit,
                PlanNodeType::Scan,
            ],
            plan.node_types()
        );
        assert_eq!(1, plan.output_schema().unwrap().len());
    }

    #[test]
    fn set_input_twice_fails() {
        let mut plan = add_send_receive_pair(scan());
        let PlanNode::Receive(receive) = &mut plan else {
            panic!("expected receive");
        };
        receive.set_distributed_input(scan()).unwrap_err();
    }
}
