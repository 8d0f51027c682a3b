//! Generate, validate, regenerate, execute.
//!
//! [`QueryOrchestrator::run`] drives one question through a bounded loop:
//!
//! ```text
//! GENERATING -> VALIDATING -> VALID   -> EXECUTING -> DONE
//!                          -> INVALID -> REGENERATING -> VALIDATING ...
//! ```
//!
//! Only a failed validation leads to another generation, at most
//! `max_regenerations` times. A generation error, an empty query and an
//! execution error all end the request at once. Every outcome is returned as
//! a [`QueryResult`]; nothing in this module returns `Err`.

use std::{fmt, sync::Arc};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    generator::{GenerationRequest, QueryGenerator},
    schema::extract_tables_from_text,
    validator::{TableValidator, ValidationResult},
    warehouse::{ExecutionOutput, Row, Warehouse}
};

/// Default number of corrective regenerations per question
pub const DEFAULT_MAX_REGENERATIONS: u32 = 2;

/// Stage a request ended in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Generation,
    Validation,
    Execution
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generation => write!(f, "generation"),
            Self::Validation => write!(f, "validation"),
            Self::Execution => write!(f, "execution")
        }
    }
}

/// One pass through generation and validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    /// Zero-based attempt index
    pub attempt:    u32,
    pub sql:        String,
    pub validation: ValidationResult
}

/// Terminal outcome of one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryResult {
    Success {
        sql:             String,
        rows:            Vec<Row>,
        row_count:       u64,
        bytes_processed: u64,
        attempts:        Vec<AttemptRecord>
    },
    Error {
        stage:    Stage,
        message:  String,
        /// Most recent SQL the model produced, if any
        last_sql: Option<String>,
        attempts: Vec<AttemptRecord>
    }
}

impl QueryResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn rows(&self) -> &[Row] {
        match self {
            Self::Success {
                rows, ..
            } => rows,
            Self::Error {
                ..
            } => &[]
        }
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            Self::Success {
                attempts, ..
            }
            | Self::Error {
                attempts, ..
            } => attempts
        }
    }

    /// Failure message, None on success
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success {
                ..
            } => None,
            Self::Error {
                message, ..
            } => Some(message)
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Success {
                ..
            } => None,
            Self::Error {
                stage, ..
            } => Some(*stage)
        }
    }

    fn failed(
        stage: Stage,
        message: String,
        last_sql: Option<String>,
        attempts: Vec<AttemptRecord>
    ) -> Self {
        Self::Error {
            stage,
            message,
            last_sql,
            attempts
        }
    }
}

/// Correction block fed into the next generation after a failed validation.
pub fn build_correction_prompt(previous_sql: &str, validation: &ValidationResult) -> String {
    format!(
        "Previous SQL:\n{}\n\nError: {}\n\nAvailable tables (authoritative list): {}\n\
         Retry with corrected table names.",
        previous_sql,
        validation.error_message,
        validation.available_tables.join(", ")
    )
}

pub struct QueryOrchestrator {
    generator:         QueryGenerator,
    validator:         TableValidator,
    warehouse:         Arc<dyn Warehouse>,
    max_regenerations: u32
}

impl QueryOrchestrator {
    pub fn new(
        generator: QueryGenerator,
        validator: TableValidator,
        warehouse: Arc<dyn Warehouse>,
        max_regenerations: u32
    ) -> Self {
        Self {
            generator,
            validator,
            warehouse,
            max_regenerations
        }
    }

    pub fn max_regenerations(&self) -> u32 {
        self.max_regenerations
    }

    pub fn generator(&self) -> &QueryGenerator {
        &self.generator
    }

    /// Answer `question` against `schema_text`.
    pub async fn run(&self, question: &str, schema_text: &str) -> QueryResult {
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut regenerations: u32 = 0;
        let mut correction: Option<String> = None;
        let mut available_tables: Option<Vec<String>> = None;

        let sql = loop {
            let attempt = attempts.len() as u32;
            let mut request = GenerationRequest::new(question, schema_text);
            request.correction_context = correction.take();
            info!(
                attempt = attempt + 1,
                regenerating = request.correction_context.is_some(),
                "Generating SQL"
            );

            let sql = match self.generator.generate(&request).await {
                Ok(generated) if !generated.query.trim().is_empty() => {
                    generated.query.trim().to_string()
                }
                Ok(_) => {
                    warn!(attempt = attempt + 1, "Model returned an empty query");
                    return QueryResult::failed(
                        Stage::Generation,
                        String::from("Failed: could not generate SQL (the model returned an empty query)"),
                        last_sql(&attempts),
                        attempts
                    );
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, reason = e.reason(), error = %e, "SQL generation failed");
                    return QueryResult::failed(
                        Stage::Generation,
                        format!("Failed: could not generate SQL ({}): {}", e.reason(), e),
                        last_sql(&attempts),
                        attempts
                    );
                }
            };
            debug!(attempt = attempt + 1, sql = %sql, "Generated SQL");

            if available_tables.is_none() {
                available_tables = Some(self.resolve_available_tables(schema_text).await);
            }
            let tables = available_tables.as_deref().unwrap_or_default();
            let validation = self.validator.validate(&sql, tables);

            if validation.is_valid {
                attempts.push(AttemptRecord {
                    attempt,
                    sql: sql.clone(),
                    validation
                });
                break sql;
            }

            warn!(
                attempt = attempt + 1,
                error = %validation.error_message,
                "Generated SQL failed table validation"
            );
            let exhausted = regenerations >= self.max_regenerations;
            let error_message = validation.error_message.clone();
            if !exhausted {
                correction = Some(build_correction_prompt(&sql, &validation));
                regenerations += 1;
            }
            attempts.push(AttemptRecord {
                attempt,
                sql: sql.clone(),
                validation
            });
            if exhausted {
                let message = format!("Failed after {} attempts: {}", regenerations, error_message);
                return QueryResult::failed(Stage::Validation, message, Some(sql), attempts);
            }
        };

        info!(attempts = attempts.len(), "Executing validated SQL");
        match self.warehouse.execute(&sql).await {
            Ok(ExecutionOutput {
                row_count,
                bytes_processed,
                rows
            }) => QueryResult::Success {
                sql,
                rows,
                row_count,
                bytes_processed,
                attempts
            },
            Err(e) => {
                warn!(error = %e, "Warehouse execution failed");
                let message = format!(
                    "Warehouse execution failed. The query was invalid or timed out. Please try to \
                     rephrase your question. Error: {}",
                    e
                );
                QueryResult::failed(Stage::Execution, message, Some(sql), attempts)
            }
        }
    }

    /// Tables the validator checks against.
    ///
    /// Names are read from the schema text first; the warehouse is asked
    /// directly only when that yields nothing. A failed listing leaves the
    /// list empty, which fails validation with a readable message.
    async fn resolve_available_tables(&self, schema_text: &str) -> Vec<String> {
        let from_schema = extract_tables_from_text(schema_text);
        if !from_schema.is_empty() {
            return from_schema;
        }
        debug!("No tables in schema text, listing tables from the warehouse");
        match self.warehouse.list_tables(self.validator.dataset()).await {
            Ok(tables) => tables,
            Err(e) => {
                warn!(error = %e, "Error fetching table list");
                Vec::new()
            }
        }
    }
}

fn last_sql(attempts: &[AttemptRecord]) -> Option<String> {
    attempts.last().map(|a| a.sql.clone())
}
