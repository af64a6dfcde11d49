//! Sources of candidate access paths for a statement.
//!
//! The assembler doesn't decide how tables are accessed. It pulls candidate
//! scan trees one at a time from a [`SubPlanSource`] and builds a complete
//! plan on top of each.

pub mod access_path;

use std::collections::VecDeque;
use std::fmt::Debug;

use fragplan_error::Result;

use crate::catalog::Catalog;
use crate::config::planner::PlannerConfig;
use crate::partitioning::PartitioningForStatement;
use crate::plan::operator::PlanNode;
use crate::statement::ParsedStatement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubPlanMode {
    /// Candidates feed a SELECT.
    Read,
    /// Candidates locate rows for an UPDATE or DELETE.
    Write,
}

/// Produces candidate access paths for a single statement.
pub trait SubPlanSource: Debug {
    /// Get the next candidate, or None once every candidate was produced.
    fn next_plan(&mut self, partitioning: &PartitioningForStatement) -> Result<Option<PlanNode>>;
}

/// Creates sub-plan sources for statements.
pub trait SubPlanProvider: Debug {
    fn create_source(
        &self,
        catalog: &Catalog,
        statement: &ParsedStatement,
        mode: SubPlanMode,
        config: &PlannerConfig,
    ) -> Result<Box<dyn SubPlanSource>>;
}

/// Source replaying a fixed list of candidates.
#[derive(Debug, Clone, Default)]
pub struct CandidateList {
    candidates: VecDeque<PlanNode>,
}

impl CandidateList {
    pub fn new(candidates: impl IntoIterator<Item = PlanNode>) -> Self {
        CandidateList {
            candidates: candidates.into_iter().collect(),
        }
    }
}

impl SubPlanSource for CandidateList {
    fn next_plan(&mut self, _partitioning: &PartitioningForStatement) -> Result<Option<PlanNode>> {
        Ok(self.candidates.pop_front())
    }
}

impl SubPlanProvider for CandidateList {
    /// Every source created replays the full list.
    fn create_source(
        &self,
        _catalog: &Catalog,
        _statement: &ParsedStatement,
        _mode: SubPlanMode,
        _config: &PlannerConfig,
    ) -> Result<Box<dyn SubPlanSource>> {
        Ok(Box::new(self.clone()))
    }
}
