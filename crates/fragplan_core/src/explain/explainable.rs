use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An entry in an output for explaining a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainEntry {
    /// Name of the node.
    pub name: String,
    /// Items to display in the explain entry.
    ///
    /// Using a btree to ensure consistent ordering (mostly for test ouput).
    pub items: BTreeMap<String, ExplainValue>,
}

impl ExplainEntry {
    /// Create a new explain entry for a plan node.
    pub fn new(name: impl Into<String>) -> Self {
        ExplainEntry {
            name: name.into(),
            items: BTreeMap::new(),
        }
    }

    /// Put a value in the explain entry.
    pub fn with_value(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        let key = key.into();
        let val = ExplainValue::Value(value.to_string());
        self.items.insert(key, val);
        self
    }

    /// Put a list of values in the explain entry.
    pub fn with_values<S: fmt::Display>(
        mut self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        let key = key.into();
        let vals = ExplainValue::Values(values.into_iter().map(|s| s.to_string()).collect());
        self.items.insert(key, vals);
        self
    }

    pub fn with_named_map<S1: fmt::Display, S2: fmt::Display>(
        mut self,
        key: impl Into<String>,
        map_name: impl Into<String>,
        map: impl IntoIterator<Item = (S1, S2)>,
    ) -> Self {
        let key = key.into();
        let vals = ExplainValue::NamedMap(
            map_name.into(),
            map.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self.items.insert(key, vals);
        self
    }
}

impl fmt::Display for ExplainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.items.is_empty() {
            write!(f, " (")?;
            for (idx, (k, v)) in self.items.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{k} = {v}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExplainValue {
    Value(String),
    Values(Vec<String>),
    NamedMap(String, Vec<(String, String)>),
}

impl fmt::Display for ExplainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Values(v) => write!(f, "[{}]", v.join(", ")),
            Self::NamedMap(name, map) => {
                let entries = map
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{name} {{{entries}}}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExplainConfig {
    /// Include output schemas and resolved column indexes.
    pub verbose: bool,
}

/// Trait for explaining a plan node.
pub trait Explainable {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_display() {
        let ent = ExplainEntry::new("Limit")
            .with_value("offset", 5)
            .with_value("limit", 10)
            .with_values("columns", ["a", "b"]);
        // Keys are ordered.
        assert_eq!("Limit (columns = [a, b], limit = 10, offset = 5)", ent.to_string());
    }

    #[test]
    fn named_map_display() {
        let ent = ExplainEntry::new("Plan").with_named_map(
            "params",
            "overrides",
            [(0, "INTEGER")],
        );
        assert_eq!("Plan (params = overrides {0: INTEGER})", ent.to_string());
    }
}
