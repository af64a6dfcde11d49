//! Coordinator side reduction of modified tuple counts.

use std::collections::BTreeMap;

use fragplan_error::{DbError, Result};
use tracing::warn;

/// Modified tuple counts reported by the sites executing a multi-partition
/// write.
///
/// Every replica of a partition reports the same count. Only one count per
/// partition contributes to the total.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifiedTupleCounts {
    counts: BTreeMap<u32, u64>,
}

impl ModifiedTupleCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the count reported for a partition.
    ///
    /// Errors if a replica of the partition already reported a different
    /// count.
    pub fn record(&mut self, partition_id: u32, count: u64) -> Result<()> {
        match self.counts.get(&partition_id) {
            Some(&existing) if existing != count => {
                warn!(partition_id, existing, count, "replicas disagree on modified tuple count");
                Err(DbError::planning("received different tuple mod counts from two replicas")
                    .with_field("partition", partition_id)
                    .with_field("first", existing)
                    .with_field("second", count))
            }
            Some(_) => Ok(()),
            None => {
                self.counts.insert(partition_id, count);
                Ok(())
            }
        }
    }

    pub fn partition_count(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replicas_counted_once() {
        let mut counts = ModifiedTupleCounts::new();
        counts.record(0, 3).unwrap();
        counts.record(1, 4).unwrap();
        counts.record(0, 3).unwrap();

        assert_eq!(2, counts.partition_count());
        assert_eq!(7, counts.total());
    }

    #[test]
    fn empty() {
        assert_eq!(0, ModifiedTupleCounts::new().total());
    }

    #[test]
    fn replicas_disagree() {
        let mut counts = ModifiedTupleCounts::new();
        counts.record(2, 1).unwrap();
        let err = counts.record(2, 5).unwrap_err();

        assert!(err.is_planning_error());
        assert_eq!("received different tuple mod counts from two replicas", err.get_msg());
        assert_eq!(Some("2"), err.get_field("partition"));
        assert_eq!(1, counts.total());
    }
}
