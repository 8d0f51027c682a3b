//! # SQL Query Agent
//!
//! Answers natural-language questions about a warehouse dataset by having an
//! LLM write SQL, checking that SQL against the dataset's real tables and
//! running it.
//!
//! # Architecture
//!
//! A question goes through a bounded loop:
//!
//! 1. **Schema** - [`catalog::SchemaCatalog`] fetches column metadata once per
//!    TTL and renders it as prompt text.
//! 2. **Generation** - [`generator::QueryGenerator`] asks an
//!    [`llm::LlmBackend`] for a `{"query": "..."}` object.
//! 3. **Validation** - [`validator::TableValidator`] requires every table to
//!    be written as `` `project.dataset.table` `` and to exist.
//! 4. **Regeneration** - on a validation failure the error and the list of
//!    real tables are fed back, up to `max_regenerations` times.
//! 5. **Execution** - [`warehouse::Warehouse::execute`] runs the validated
//!    query.
//!
//! The result is always a [`orchestrator::QueryResult`], success or failure
//! with the stage it failed in.
//!
//! # Quick Start
//!
//! ```bash
//! export PROJECT_ID=my-project DATASET_ID=sales
//! export BIGQUERY_ACCESS_TOKEN="$(gcloud auth print-access-token)"
//! export GEMINI_API_KEY=...
//!
//! sql-query-agent ask "How many orders were placed last month?"
//! sql-query-agent ask "Top 5 customers by revenue" -f json
//! sql-query-agent schema
//! ```
//!
//! # Exit Codes
//!
//! - `0` - The question was answered
//! - `1` - The request failed, or configuration/schema loading failed
//!
//! # Modules
//!
//! - [`schema`] - Schema model and prompt rendering
//! - [`catalog`] - Schema fetching with a TTL cache
//! - [`generator`] - Prompting and structured-output parsing
//! - [`validator`] - Table-reference validation
//! - [`orchestrator`] - The generate/validate/execute loop
//! - [`session`] - Per-user question answering
//! - [`llm`] - LLM provider integrations
//! - [`warehouse`] - Warehouse trait and the BigQuery client
//! - [`config`] - Configuration loading and validation
//! - [`output`] - Result formatting

pub mod app;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod llm;
pub mod orchestrator;
pub mod output;
pub mod schema;
pub mod session;
pub mod validator;
pub mod warehouse;
