//! SQL generation.
//!
//! Turns a question and the schema text into a single SQL query by prompting
//! an [`LlmBackend`] and holding it to a one-field JSON contract:
//!
//! ```json
//! {"query": "SELECT ..."}
//! ```
//!
//! Anything else (extra keys, prose around the object, a missing `query`) is
//! a [`GenerationError::UnparseableOutput`]. The generator keeps no state
//! between calls and never retries; that decision belongs to the
//! orchestrator.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::GenerationError,
    llm::{CompletionRequest, LlmBackend},
    warehouse::DatasetRef
};

/// Structured output the model must produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratedSql {
    /// The SQL query, with no other text
    pub query: String
}

/// Input of one generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub question:           String,
    pub schema_text:        String,
    /// Feedback from a failed validation, present on regeneration
    pub correction_context: Option<String>
}

impl GenerationRequest {
    pub fn new(question: impl Into<String>, schema_text: impl Into<String>) -> Self {
        Self {
            question:           question.into(),
            schema_text:        schema_text.into(),
            correction_context: None
        }
    }

    pub fn with_correction(mut self, correction: impl Into<String>) -> Self {
        self.correction_context = Some(correction.into());
        self
    }
}

pub struct QueryGenerator {
    backend:     Arc<dyn LlmBackend>,
    dataset:     DatasetRef,
    temperature: f32
}

impl QueryGenerator {
    pub fn new(backend: Arc<dyn LlmBackend>, dataset: DatasetRef, temperature: f32) -> Self {
        Self {
            backend,
            dataset,
            temperature
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Fixed instructions: output contract and table-prefix rule
    pub fn system_prompt(&self) -> String {
        let prefix = self.dataset.schema_prefix();
        format!(
            "You are a helpful AI assistant that writes valid SQL queries for a data warehouse.\n\
             You will be given:\n\
             - A user's question.\n\
             - The available tables, their columns and data types (the schema).\n\
             Your task is to:\n\
             1. Write one syntactically correct SQL query that best answers the question.\n\
             2. Only use table and column names that appear in the provided schema. \
             Do not guess or invent names.\n\
             3. Make the best possible guess about which tables and columns to use, from the \
             given schema only.\n\
             4. Always write table names with the full dataset prefix: instead of \
             SELECT * FROM table_name, write SELECT * FROM {prefix}table_name`\n\
             5. Double-check that every table you use exists in the schema.\n\
             6. Return your output as strict JSON with exactly one key, \"query\", for example \
             {{\"query\": \"SELECT ...\"}}.\n\
             If a relevant field does not exist, answer with what is available or omit that \
             part.\n\
             Do NOT include any explanation, notes, comments or Markdown; only the JSON object.",
            prefix = prefix
        )
    }

    /// Question, schema and, on regeneration, the correction block
    pub fn user_prompt(&self, request: &GenerationRequest) -> String {
        let mut prompt = format!(
            "User Question: {}\n\nAvailable Table and Column Schema:\n{}\n",
            request.question, request.schema_text
        );
        if let Some(correction) = &request.correction_context {
            prompt.push_str("\nPrevious attempt was rejected.\n");
            prompt.push_str(correction);
            prompt.push_str(
                "\nRetry: write the query again using only the available table names above, each \
                 with the full dataset prefix.\n"
            );
        }
        prompt
    }

    /// Completion request for `request`, as it would be sent
    pub fn completion_request(&self, request: &GenerationRequest) -> CompletionRequest {
        CompletionRequest {
            system_prompt: self.system_prompt(),
            user_prompt:   self.user_prompt(request),
            temperature:   self.temperature
        }
    }

    /// Generate SQL for one attempt.
    ///
    /// # Errors
    ///
    /// Backend failures are passed through; a response that is not the
    /// `{"query": ...}` object becomes `UnparseableOutput`.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedSql, GenerationError> {
        let completion = self.completion_request(request);
        let raw = self.backend.complete(&completion).await?;
        debug!(response_len = raw.len(), "Model responded");
        parse_generated_sql(&raw)
    }
}

/// Parse the model's answer into [`GeneratedSql`].
///
/// A single surrounding Markdown code fence is tolerated; any other text
/// around the JSON object is not.
pub fn parse_generated_sql(raw: &str) -> Result<GeneratedSql, GenerationError> {
    let body = strip_code_fence(raw);
    serde_json::from_str::<GeneratedSql>(body).map_err(|e| {
        GenerationError::UnparseableOutput(format!("{} (response: {})", e, truncate(raw, 200)))
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let inner = if let Some(s) = trimmed.strip_prefix("```json") {
        s
    } else if let Some(s) = trimmed.strip_prefix("```") {
        s
    } else {
        return trimmed;
    };
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn truncate(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
