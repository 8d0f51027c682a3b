//! Table reference validation.
//!
//! Before a generated query is sent to the warehouse, every table it names
//! must exist in the dataset. References are found with regular expressions:
//!
//! - `` `project.dataset.table` `` (backticks optional) counts as a
//!   fully-qualified reference when project and dataset are the configured
//!   ones.
//! - A bare `FROM table` is only looked for when no qualified reference
//!   exists, to tell "forgot the prefix" apart from "no table at all".
//!
//! This is a pattern match, not a SQL parser. Aliases, CTE names and
//! subqueries are not understood: a CTE selected with `FROM cte_name` and no
//! qualified table anywhere is reported as unqualified.
//!
//! # Example
//!
//! ```
//! use sql_query_agent::{validator::TableValidator, warehouse::DatasetRef};
//!
//! let validator = TableValidator::new(DatasetRef::new("proj", "ds"));
//! let tables = vec!["orders".to_string()];
//!
//! assert!(validator.validate("SELECT * FROM proj.ds.orders", &tables).is_valid);
//! assert!(!validator.validate("SELECT * FROM orders", &tables).is_valid);
//! ```

use std::sync::LazyLock;

use indexmap::IndexSet;
use regex::Regex;
use serde::Serialize;

use crate::warehouse::DatasetRef;

/// Three-part `project.dataset.table` identifier, backticks optional.
///
/// Project ids may contain hyphens; dataset and table names may not.
static QUALIFIED_TABLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"`?([a-zA-Z0-9_-]+)\.([a-zA-Z0-9_]+)\.([a-zA-Z_][a-zA-Z0-9_]*)`?")
        .expect("valid regex")
});

/// `FROM <identifier>`, case-insensitive.
static BARE_FROM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bFROM\s+([a-zA-Z_][a-zA-Z0-9_]*)").expect("valid regex"));

/// Outcome of checking one query's table references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid:          bool,
    /// Empty when valid
    pub error_message:     String,
    /// Trailing identifiers of the qualified references, first occurrence
    /// order
    pub referenced_tables: Vec<String>,
    pub available_tables:  Vec<String>
}

impl ValidationResult {
    fn valid(referenced_tables: Vec<String>, available_tables: &[String]) -> Self {
        Self {
            is_valid: true,
            error_message: String::new(),
            referenced_tables,
            available_tables: available_tables.to_vec()
        }
    }

    fn invalid(
        message: impl Into<String>,
        referenced_tables: Vec<String>,
        available_tables: &[String]
    ) -> Self {
        Self {
            is_valid: false,
            error_message: message.into(),
            referenced_tables,
            available_tables: available_tables.to_vec()
        }
    }
}

/// Checks generated SQL against the dataset's real table list.
#[derive(Debug, Clone)]
pub struct TableValidator {
    dataset: DatasetRef
}

impl TableValidator {
    pub fn new(dataset: DatasetRef) -> Self {
        Self {
            dataset
        }
    }

    pub fn dataset(&self) -> &DatasetRef {
        &self.dataset
    }

    /// Validate table references in `sql`.
    ///
    /// Valid only when there is at least one qualified reference and every
    /// one of them names a table in `available_tables`. On a partial match
    /// the message names the first unknown table.
    pub fn validate(&self, sql: &str, available_tables: &[String]) -> ValidationResult {
        let referenced = extract_qualified_tables(sql, &self.dataset);
        let available_list = available_tables.join(", ");

        if referenced.is_empty() {
            let message = if BARE_FROM_REGEX.is_match(sql) {
                format!(
                    "Table names should include full path ({}<table>`). Available tables: {}",
                    self.dataset.schema_prefix(),
                    available_list
                )
            } else {
                String::from("No valid table names found in query")
            };
            return ValidationResult::invalid(message, referenced, available_tables);
        }

        if let Some(missing) = referenced
            .iter()
            .find(|table| !available_tables.contains(table))
        {
            let message = format!(
                "Table '{}' does not exist. Available tables: {}",
                missing, available_list
            );
            return ValidationResult::invalid(message, referenced, available_tables);
        }

        ValidationResult::valid(referenced, available_tables)
    }
}

/// Table names referenced as `project.dataset.<table>` for this dataset.
///
/// Three-part identifiers pointing at other projects or datasets are ignored.
pub fn extract_qualified_tables(sql: &str, dataset: &DatasetRef) -> Vec<String> {
    let mut tables = IndexSet::new();
    for caps in QUALIFIED_TABLE_REGEX.captures_iter(sql) {
        if let (Some(project), Some(ds), Some(table)) = (caps.get(1), caps.get(2), caps.get(3))
            && project.as_str() == dataset.project
            && ds.as_str() == dataset.dataset
        {
            tables.insert(table.as_str().to_string());
        }
    }
    tables.into_iter().collect()
}

