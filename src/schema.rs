//! Warehouse schema representation.
//!
//! A [`Schema`] is built from `INFORMATION_SCHEMA.COLUMNS` rows and rendered
//! into the text block the model sees in its prompt.
//!
//! # Example
//!
//! ```
//! use sql_query_agent::{schema::Schema, warehouse::MetadataRow};
//!
//! let schema = Schema::from_rows(vec![
//!     MetadataRow::new("orders", "id", "INT64", false),
//!     MetadataRow::new("orders", "total", "FLOAT64", true)
//! ]);
//!
//! assert_eq!(schema.list_tables(), vec!["orders"]);
//! assert!(schema.to_summary().contains("  - id (INT64, NOT NULL)"));
//! ```

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;

use crate::warehouse::MetadataRow;

/// Matches the `Table: <name>` lines written by [`Schema::to_summary`].
static TABLE_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Table:\s*([a-zA-Z_][a-zA-Z0-9_]*)").expect("valid regex"));

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    /// Column name
    pub name:        String,
    /// Warehouse data type (e.g., "INT64", "STRING")
    pub data_type:   String,
    /// Whether NULL values are allowed
    pub is_nullable: bool
}

/// Tables of one dataset with their columns.
///
/// Tables keep the order the metadata arrived in, so rendering is
/// deterministic for a given fetch.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    /// Map of table name to ordered columns
    pub tables: IndexMap<String, Vec<ColumnInfo>>
}

impl Schema {
    /// Group metadata rows by table.
    ///
    /// Rows for a table that reappears later are appended to its first
    /// occurrence, so table names stay unique.
    pub fn from_rows(rows: impl IntoIterator<Item = MetadataRow>) -> Self {
        let mut tables: IndexMap<String, Vec<ColumnInfo>> = IndexMap::new();
        for row in rows {
            tables.entry(row.table_name).or_default().push(ColumnInfo {
                name:        row.column_name,
                data_type:   row.data_type,
                is_nullable: row.is_nullable.eq_ignore_ascii_case("YES")
            });
        }
        Self {
            tables
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Table names in schema order
    pub fn list_tables(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Get summary of schema for the generation prompt
    pub fn to_summary(&self) -> String {
        let mut lines = vec![
            String::from("Database Schema:"),
            String::from("================")
        ];
        for (table, columns) in &self.tables {
            lines.push(format!("\nTable: {}", table));
            lines.push(String::from("Columns:"));
            for col in columns {
                let nullable = if col.is_nullable { "NULL" } else { "NOT NULL" };
                lines.push(format!(
                    "  - {name} ({data_type}, {nullable})",
                    name = col.name,
                    data_type = col.data_type,
                    nullable = nullable
                ));
            }
        }
        lines.join("\n")
    }
}

/// Table names mentioned in a rendered schema, in order of appearance.
pub fn extract_tables_from_text(schema_text: &str) -> Vec<String> {
    TABLE_LINE_REGEX
        .captures_iter(schema_text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}
