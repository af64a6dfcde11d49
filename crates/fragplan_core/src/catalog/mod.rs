//! Read-only view of the schema catalog consumed during planning.

use std::collections::HashSet;

use fragplan_error::{DbError, Result};
use serde::{Deserialize, Serialize};

use crate::types::{ScalarValue, ValueType};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub tables: Vec<TableEntry>,
    /// Tables that are exported to an external system.
    #[serde(default)]
    pub export_tables: Vec<ExportTableInfo>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: TableEntry) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_export_table(mut self, export: ExportTableInfo) -> Self {
        self.export_tables.push(export);
        self
    }

    /// Look up a table by name, ignoring case.
    pub fn get_table(&self, name: &str) -> Option<&TableEntry> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Look up a table that must exist.
    ///
    /// The parser only produces statements over known tables, so a miss
    /// here is an internal error.
    pub fn table_required(&self, name: &str) -> Result<&TableEntry> {
        self.get_table(name)
            .ok_or_else(|| DbError::new("Missing table in catalog").with_field("table", name))
    }

    /// Check if a table is an export-only (append only) table.
    pub fn is_export_only(&self, name: &str) -> bool {
        self.export_tables
            .iter()
            .any(|e| e.append_only && e.table.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub name: String,
    pub columns: Vec<ColumnEntry>,
    #[serde(default)]
    pub indexes: Vec<IndexEntry>,
    /// A full copy of the table lives on every partition.
    #[serde(default)]
    pub replicated: bool,
    #[serde(default)]
    pub partition_column: Option<String>,
    /// Source table if this table is a materialized view.
    #[serde(default)]
    pub materializer: Option<String>,
}

impl TableEntry {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnEntry>) -> Self {
        TableEntry {
            name: name.into(),
            columns,
            indexes: Vec::new(),
            replicated: false,
            partition_column: None,
            materializer: None,
        }
    }

    pub fn partitioned_on(mut self, column: impl Into<String>) -> Self {
        self.partition_column = Some(column.into());
        self.replicated = false;
        self
    }

    pub fn replicated(mut self) -> Self {
        self.replicated = true;
        self.partition_column = None;
        self
    }

    pub fn materialized_from(mut self, source: impl Into<String>) -> Self {
        self.materializer = Some(source.into());
        self
    }

    pub fn with_index(mut self, index: IndexEntry) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn is_materialized_view(&self) -> bool {
        self.materializer.is_some()
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnEntry> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Columns ordered by their position in the table.
    pub fn sorted_columns(&self) -> Vec<&ColumnEntry> {
        let mut cols: Vec<_> = self.columns.iter().collect();
        cols.sort_by_key(|c| c.index);
        cols
    }

    /// Names of all columns covered by at least one index.
    pub fn indexed_column_names(&self) -> HashSet<String> {
        self.indexes
            .iter()
            .flat_map(|idx| idx.columns.iter())
            .map(|c| c.to_ascii_lowercase())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnEntry {
    pub name: String,
    pub index: usize,
    pub value_type: ValueType,
    /// Declared size, only meaningful for variable length types.
    #[serde(default)]
    pub size: usize,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<ScalarValue>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnEntry {
    pub fn new(name: impl Into<String>, index: usize, value_type: ValueType) -> Self {
        ColumnEntry {
            name: name.into(),
            index,
            value_type,
            size: value_type.default_size(),
            nullable: true,
            default: None,
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: impl Into<ScalarValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Storage size of values in this column.
    pub fn value_size(&self) -> usize {
        self.value_type.fixed_size().unwrap_or(self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    /// Indexed columns in key order.
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexEntry {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        IndexEntry {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTableInfo {
    pub table: String,
    #[serde(default = "default_append_only")]
    pub append_only: bool,
}

fn default_append_only() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::new()
            .with_table(
                TableEntry::new(
                    "Orders",
                    vec![
                        ColumnEntry::new("id", 0, ValueType::BigInt).not_null(),
                        ColumnEntry::new("name", 1, ValueType::Varchar).with_size(32),
                    ],
                )
                .partitioned_on("id")
                .with_index(IndexEntry::new("orders_name", ["name"])),
            )
            .with_export_table(ExportTableInfo {
                table: "events".to_string(),
                append_only: true,
            })
    }

    #[test]
    fn lookup_ignores_case() {
        let catalog = catalog();
        assert_eq!("Orders", catalog.get_table("ORDERS").unwrap().name);
        assert!(catalog.get_table("missing").is_none());
        catalog.table_required("missing").unwrap_err();
    }

    #[test]
    fn export_only() {
        let catalog = catalog();
        assert!(catalog.is_export_only("EVENTS"));
        assert!(!catalog.is_export_only("orders"));
    }

    #[test]
    fn indexed_columns() {
        let catalog = catalog();
        let table = catalog.get_table("orders").unwrap();
        let indexed = table.indexed_column_names();
        assert!(indexed.contains("name"));
        assert!(!indexed.contains("id"));
    }

    #[test]
    fn deserialize_with_defaults() {
        let json = r#"{
            "tables": [{
                "name": "t",
                "columns": [{"name": "a", "index": 0, "value_type": "integer"}]
            }]
        }"#;
        let catalog: Catalog = serde_json::from_str(json).unwrap();
        let table = catalog.get_table("t").unwrap();
        assert!(!table.replicated);
        assert!(table.columns[0].nullable);
        assert_eq!(0, table.columns[0].size);
        assert_eq!(4, table.columns[0].value_size());
    }
}
