//! Warehouse access.
//!
//! The agent talks to the warehouse through the [`Warehouse`] trait: a
//! metadata call for the schema, a table-listing call used as the validator's
//! fallback ground truth, and query execution. Authentication and transport
//! belong to the implementation; [`bigquery::BigQueryClient`] is the one the
//! binary uses.

pub mod bigquery;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::WarehouseError;

/// One result record, keyed by output column name.
pub type Row = Map<String, Value>;

/// Project and dataset the agent answers questions about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DatasetRef {
    pub project: String,
    pub dataset: String
}

impl DatasetRef {
    pub fn new(project: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into()
        }
    }

    /// Prefix the model is told to put in front of every table name,
    /// e.g. `` `my-project.sales. ``
    pub fn schema_prefix(&self) -> String {
        format!("`{}.{}.", self.project, self.dataset)
    }

    /// Fully-qualified, backticked reference to `table`
    pub fn qualify(&self, table: &str) -> String {
        format!("`{}.{}.{}`", self.project, self.dataset, table)
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.project, self.dataset)
    }
}

/// One `INFORMATION_SCHEMA.COLUMNS` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
    pub table_name:  String,
    pub column_name: String,
    pub data_type:   String,
    /// `"YES"` or `"NO"`
    pub is_nullable: String
}

impl MetadataRow {
    pub fn new(table: &str, column: &str, data_type: &str, nullable: bool) -> Self {
        Self {
            table_name:  table.to_string(),
            column_name: column.to_string(),
            data_type:   data_type.to_string(),
            is_nullable: if nullable { "YES" } else { "NO" }.to_string()
        }
    }
}

/// Rows and statistics returned by a successful query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionOutput {
    pub row_count:       u64,
    pub bytes_processed: u64,
    pub rows:            Vec<Row>
}

/// Opaque warehouse RPC surface.
///
/// Every method is a single, potentially slow, network round-trip. Timeouts
/// are whatever the implementation's client enforces.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Identity of the underlying connection, used in schema cache keys.
    fn connection_id(&self) -> String;

    /// Column metadata for every table in `dataset`, ordered by table then
    /// column ordinal.
    async fn fetch_metadata(&self, dataset: &DatasetRef) -> Result<Vec<MetadataRow>, WarehouseError>;

    /// Table identifiers in `dataset`.
    async fn list_tables(&self, dataset: &DatasetRef) -> Result<Vec<String>, WarehouseError>;

    /// Run a query and return its rows.
    async fn execute(&self, sql: &str) -> Result<ExecutionOutput, WarehouseError>;
}
