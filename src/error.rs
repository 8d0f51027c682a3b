//! Error types and constructors.
//!
//! Startup and process-level failures are [`AppError`] values built through
//! the small constructor functions below. Components that can fail for a
//! reason the orchestrator has to act on return their own typed errors
//! instead, so the retry loop can match on them rather than on strings.

pub use masterror::{AppError, AppResult};
use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single SQL generation attempt.
///
/// Every variant is terminal for the attempt that produced it. Whether the
/// whole request is retried is decided by the orchestrator, never here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The selected provider needs a key and none was configured
    #[error("{provider} API key must be set (see GEMINI_API_KEY / OPENAI_API_KEY / ANTHROPIC_API_KEY)")]
    MissingApiKey { provider: String },
    /// The provider rejected the configured key
    #[error("{provider} rejected the API key: {message}")]
    InvalidApiKey { provider: String, message: String },
    /// Provider name not known to the backend factory
    #[error("Unsupported LLM provider '{0}' (expected gemini, openai, anthropic or ollama)")]
    UnsupportedProvider(String),
    /// Transport failure or non-success response from the backend
    #[error("LLM backend failure: {message}")]
    Backend { message: String, transient: bool },
    /// The model answered, but not with a `{"query": "..."}` object
    #[error("Model output is not a valid {{\"query\": ...}} object: {0}")]
    UnparseableOutput(String)
}

impl GenerationError {
    /// Stable snake_case name of the failure reason.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingApiKey {
                ..
            } => "missing_api_key",
            Self::InvalidApiKey {
                ..
            } => "invalid_api_key",
            Self::UnsupportedProvider(_) => "unsupported_provider",
            Self::Backend {
                ..
            } => "backend_failure",
            Self::UnparseableOutput(_) => "unparseable_output"
        }
    }

    /// Whether the HTTP layer may resend the same request.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Backend {
                transient: true,
                ..
            }
        )
    }
}

/// Failure talking to the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WarehouseError {
    #[error("Warehouse request failed: {0}")]
    Request(String),
    #[error("Warehouse API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Unexpected warehouse response: {0}")]
    Decode(String),
    #[error("Query job failed: {0}")]
    JobFailed(String)
}

/// Failure to build the schema a session needs before it can take questions.
#[derive(Debug, Error)]
pub enum SchemaFetchError {
    #[error("Error retrieving schema from dataset '{dataset}': {source}")]
    Metadata {
        dataset: String,
        #[source]
        source:  WarehouseError
    },
    #[error("No schema information found for dataset '{project}.{dataset}'")]
    Empty { project: String, dataset: String }
}

impl From<SchemaFetchError> for AppError {
    fn from(err: SchemaFetchError) -> Self {
        schema_fetch_error(&err)
    }
}

/// Create config error
pub fn config_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(message.into())
}

/// Create schema fetch error
pub fn schema_fetch_error(err: &SchemaFetchError) -> AppError {
    AppError::service(format!(
        "Cannot proceed without a valid warehouse schema: {}",
        err
    ))
}

/// Create file read error
pub fn file_read_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to read file '{}': {}", path, source))
}

/// Create output write error
pub fn output_write_error(source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to write output: {}", source))
}

/// Describe a reqwest failure
pub fn http_error_message(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("Request timeout: {}", err)
    } else if err.is_connect() {
        format!("Connection failed: {}", err)
    } else if err.is_status() {
        format!("HTTP error {}: {}", err.status().unwrap_or_default(), err)
    } else {
        err.to_string()
    }
}

/// Map a transport failure from an LLM call
pub fn llm_http_error(err: reqwest::Error) -> GenerationError {
    GenerationError::Backend {
        message:   http_error_message(&err),
        transient: err.is_timeout() || err.is_connect()
    }
}

/// Map a non-success LLM response status
pub fn llm_status_error(provider: &str, status: StatusCode, body: &str) -> GenerationError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationError::InvalidApiKey {
            provider: provider.to_string(),
            message:  format!("{} {}", status, body)
        },
        _ => GenerationError::Backend {
            message:   format!("{} API error {}: {}", provider, status, body),
            transient: status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
    }
}

/// Map a transport failure from a warehouse call
pub fn warehouse_http_error(err: reqwest::Error) -> WarehouseError {
    WarehouseError::Request(http_error_message(&err))
}

/// Rewrite a warehouse job error so its `[line:column]` marker reads plainly.
///
/// BigQuery reports positions as `... at [3:15]`.
pub fn format_job_error(message: &str) -> String {
    match extract_position(message) {
        Some(pos) => format!(
            "{} (line {}, column {})",
            message.trim(),
            pos.line,
            pos.column
        ),
        None => message.trim().to_string()
    }
}

struct SqlPosition {
    line:   usize,
    column: usize
}

fn extract_position(message: &str) -> Option<SqlPosition> {
    let start = message.rfind(" at [")? + " at [".len();
    let end = start + message[start..].find(']')?;
    let (line, column) = message[start..end].split_once(':')?;
    Some(SqlPosition {
        line:   line.trim().parse().ok()?,
        column: column.trim().parse().ok()?
    })
}
