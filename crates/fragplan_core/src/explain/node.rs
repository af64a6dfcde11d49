use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::explainable::{ExplainConfig, ExplainEntry, Explainable};
use crate::plan::operator::PlanNode;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExplainNode {
    pub entry: ExplainEntry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<Box<ExplainNode>>,
    pub children: Vec<ExplainNode>,
}

impl ExplainNode {
    /// Explain an entire plan tree, including everything below receives.
    pub fn walk_plan(config: ExplainConfig, plan: &PlanNode) -> Self {
        Self::walk(config, plan, false)
    }

    /// Explain a single fragment, stopping at receive nodes.
    pub fn walk_fragment(config: ExplainConfig, plan: &PlanNode) -> Self {
        Self::walk(config, plan, true)
    }

    fn walk(config: ExplainConfig, plan: &PlanNode, stop_at_receive: bool) -> Self {
        let mut entry = match plan {
            PlanNode::Scan(n) => n.node.explain_entry(config),
            PlanNode::IndexScan(n) => n.node.explain_entry(config),
            PlanNode::Aggregate(n) => n.node.explain_entry(config),
            PlanNode::HashAggregate(n) => n.node.explain_named("HashAggregate", config),
            PlanNode::Distinct(n) => n.node.explain_entry(config),
            PlanNode::OrderBy(n) => n.node.explain_entry(config),
            PlanNode::Limit(n) => n.node.explain_entry(config),
            PlanNode::Projection(n) => n.node.explain_entry(config),
            PlanNode::Materialize(n) => n.node.explain_entry(config),
            PlanNode::Insert(n) => n.node.explain_entry(config),
            PlanNode::Update(n) => n.node.explain_entry(config),
            PlanNode::Delete(n) => n.node.explain_entry(config),
            PlanNode::Send(n) => n.node.explain_entry(config),
            PlanNode::Receive(n) => n.node.explain_entry(config),
        };

        if config.verbose {
            if let Ok(schema) = plan.output_schema() {
                entry = entry.with_values("output", schema.iter().map(|c| c.name()));
            }
        }

        let inline = plan
            .inline()
            .map(|inline| Box::new(Self::walk(config, inline, stop_at_receive)));

        let children = if stop_at_receive && matches!(plan, PlanNode::Receive(_)) {
            Vec::new()
        } else {
            plan.children()
                .iter()
                .map(|c| Self::walk(config, c, stop_at_receive))
                .collect()
        };

        ExplainNode {
            entry,
            inline,
            children,
        }
    }

    /// Render as an indented tree, one node per line.
    pub fn format_text(&self) -> String {
        let mut buf = String::new();
        self.format_indented(&mut buf, 0);
        buf
    }

    fn format_indented(&self, buf: &mut String, indent: usize) {
        // Writing to a string can't fail.
        let _ = writeln!(buf, "{:indent$}{}", "", self.entry, indent = indent);
        if let Some(inline) = &self.inline {
            let _ = writeln!(buf, "{:indent$}inline: {}", "", inline.entry, indent = indent + 2);
        }
        for child in &self.children {
            child.format_indented(buf, indent + 2);
        }
    }
}
