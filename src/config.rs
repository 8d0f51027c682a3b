//! Configuration loading and management.
//!
//! Configuration is loaded from multiple sources with the following precedence
//! (highest to lowest):
//!
//! 1. Command-line arguments
//! 2. Environment variables (a `.env` file is read first by the binary)
//! 3. `.sql-agent.toml` in current directory
//! 4. `~/.config/sql-agent/config.toml`
//! 5. Default values
//!
//! The result is validated once at startup and then only read.
//!
//! # Configuration File Format
//!
//! ```toml
//! [warehouse]
//! project_id = "my-project"
//! dataset_id = "sales"
//! access_token = "ya29...."     # or BIGQUERY_ACCESS_TOKEN env var
//! location = "US"
//!
//! [llm]
//! provider = "gemini"           # gemini, openai, anthropic, ollama
//! model = "gemini-2.5-flash"
//! temperature = 0.0
//! gemini_api_key = "..."        # or GEMINI_API_KEY env var
//!
//! [agent]
//! max_regenerations = 2
//! schema_cache_ttl_secs = 3600
//!
//! [retry]
//! max_retries = 3
//! initial_delay_ms = 1000
//! max_delay_ms = 30000
//! backoff_factor = 2.0
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `PROJECT_ID` | Warehouse project (falls back to `GOOGLE_CLOUD_PROJECT`) |
//! | `DATASET_ID` | Dataset questions are asked about |
//! | `BIGQUERY_ACCESS_TOKEN` | OAuth access token for the BigQuery API |
//! | `BIGQUERY_LOCATION` | Job location |
//! | `LLM_PROVIDER` | Provider name |
//! | `MODEL_NAME` | Model identifier |
//! | `TEMPERATURE` | Sampling temperature |
//! | `GEMINI_API_KEY` | Gemini API key |
//! | `OPENAI_API_KEY` | OpenAI API key |
//! | `ANTHROPIC_API_KEY` | Anthropic API key |
//! | `OLLAMA_URL` | Ollama base URL |
//! | `SCHEMA_CACHE_TTL` | Schema cache lifetime in seconds |
//! | `MAX_REGENERATIONS` | Corrective regenerations per question |

use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration
};

use serde::Deserialize;

use crate::{
    cache::DEFAULT_SCHEMA_TTL,
    error::{AppResult, config_error, file_read_error},
    llm::ProviderKind,
    orchestrator::DEFAULT_MAX_REGENERATIONS,
    warehouse::DatasetRef
};

pub const DEFAULT_BIGQUERY_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub llm:       LlmConfig,
    #[serde(default)]
    pub agent:     AgentConfig,
    #[serde(default)]
    pub retry:     RetryConfig
}

/// Warehouse connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub project_id:       Option<String>,
    pub dataset_id:       Option<String>,
    pub access_token:     Option<String>,
    pub base_url:         String,
    pub location:         Option<String>,
    /// Server-side wait per query request
    pub query_timeout_ms: u64
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            project_id:       None,
            dataset_id:       None,
            access_token:     None,
            base_url:         String::from(DEFAULT_BIGQUERY_URL),
            location:         None,
            query_timeout_ms: 30_000
        }
    }
}

impl WarehouseConfig {
    /// Configured project and dataset
    pub fn dataset_ref(&self) -> AppResult<DatasetRef> {
        let project = non_empty(&self.project_id)
            .ok_or_else(|| config_error("PROJECT_ID must be set (env or [warehouse] project_id)"))?;
        let dataset = non_empty(&self.dataset_id)
            .ok_or_else(|| config_error("DATASET_ID must be set (env or [warehouse] dataset_id)"))?;
        Ok(DatasetRef::new(project, dataset))
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider:          Option<String>,
    pub model:             Option<String>,
    pub temperature:       f32,
    pub gemini_api_key:    Option<String>,
    pub openai_api_key:    Option<String>,
    pub anthropic_api_key: Option<String>,
    pub ollama_url:        Option<String>
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider:          None,
            model:             None,
            temperature:       0.0,
            gemini_api_key:    None,
            openai_api_key:    None,
            anthropic_api_key: None,
            ollama_url:        Some(String::from(DEFAULT_OLLAMA_URL))
        }
    }
}

impl LlmConfig {
    /// Selected provider name, `gemini` when unset
    pub fn provider_name(&self) -> &str {
        self.provider.as_deref().unwrap_or("gemini")
    }

    /// Configured model, or the provider's default
    pub fn effective_model(&self, kind: ProviderKind) -> String {
        non_empty(&self.model)
            .map(str::to_string)
            .unwrap_or_else(|| kind.default_model().to_string())
    }

    pub fn api_key_for(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::Gemini => non_empty(&self.gemini_api_key),
            ProviderKind::OpenAI => non_empty(&self.openai_api_key),
            ProviderKind::Anthropic => non_empty(&self.anthropic_api_key),
            ProviderKind::Ollama => None
        }
    }

    pub fn ollama_url(&self) -> String {
        non_empty(&self.ollama_url)
            .unwrap_or(DEFAULT_OLLAMA_URL)
            .to_string()
    }
}

/// Question-answering behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Corrective regenerations after a failed validation
    pub max_regenerations:     u32,
    pub schema_cache_ttl_secs: u64
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_regenerations:     DEFAULT_MAX_REGENERATIONS,
            schema_cache_ttl_secs: DEFAULT_SCHEMA_TTL.as_secs()
        }
    }
}

impl AgentConfig {
    pub fn schema_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.schema_cache_ttl_secs)
    }
}

/// Retry configuration for LLM requests
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries:      u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms:     u64,
    pub backoff_factor:   f64
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries:      3,
            initial_delay_ms: 1000,
            max_delay_ms:     30000,
            backoff_factor:   2.0
        }
    }
}

/// Validated values a session is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub dataset:           DatasetRef,
    pub temperature:       f32,
    pub max_regenerations: u32
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file in current directory (.sql-agent.toml)
    /// 3. Config file in home directory (~/.config/sql-agent/config.toml)
    /// 4. Default values
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        // Try to load from home directory config
        if let Some(home) = env::var_os("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("sql-agent")
                .join("config.toml");

            if home_config.exists() {
                config = Self::read_file(&home_config)?;
            }
        }

        // Try to load from current directory config (overrides home config)
        let local_config = PathBuf::from(".sql-agent.toml");
        if local_config.exists() {
            config = Self::read_file(&local_config)?;
        }

        config.apply_env(|name| env::var(name).ok())?;
        Ok(config)
    }

    /// Load an explicit config file, then apply environment overrides
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env(|name| env::var(name).ok())?;
        Ok(config)
    }

    /// Parse TOML configuration text
    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| config_error(format!("Invalid config file: {}", e)))
    }

    fn read_file(path: &Path) -> AppResult<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| file_read_error(&path.display().to_string(), e))?;
        Self::from_toml(&content)
    }

    /// Override values from environment variables resolved by `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>
    {
        if let Some(project) = lookup("PROJECT_ID").or_else(|| lookup("GOOGLE_CLOUD_PROJECT")) {
            self.warehouse.project_id = Some(project);
        }
        if let Some(dataset) = lookup("DATASET_ID") {
            self.warehouse.dataset_id = Some(dataset);
        }
        if let Some(token) = lookup("BIGQUERY_ACCESS_TOKEN") {
            self.warehouse.access_token = Some(token);
        }
        if let Some(location) = lookup("BIGQUERY_LOCATION") {
            self.warehouse.location = Some(location);
        }
        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.llm.provider = Some(provider);
        }
        if let Some(model) = lookup("MODEL_NAME") {
            self.llm.model = Some(model);
        }
        if let Some(temperature) = parse_env(&lookup, "TEMPERATURE")? {
            self.llm.temperature = temperature;
        }
        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.llm.gemini_api_key = Some(key);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(key);
        }
        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            self.llm.anthropic_api_key = Some(key);
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.llm.ollama_url = Some(url);
        }
        if let Some(ttl) = parse_env(&lookup, "SCHEMA_CACHE_TTL")? {
            self.agent.schema_cache_ttl_secs = ttl;
        }
        if let Some(max) = parse_env(&lookup, "MAX_REGENERATIONS")? {
            self.agent.max_regenerations = max;
        }
        Ok(())
    }

    /// Check the warehouse section
    pub fn validate_warehouse(&self) -> AppResult<DatasetRef> {
        self.warehouse.dataset_ref()
    }

    /// Check the LLM section
    pub fn validate_llm(&self) -> AppResult<ProviderKind> {
        let kind =
            ProviderKind::parse(self.llm.provider_name()).map_err(|e| config_error(e.to_string()))?;
        if kind.requires_api_key() && self.llm.api_key_for(kind).is_none() {
            return Err(config_error(format!(
                "{}_API_KEY must be set to use the {} provider",
                kind.as_str().to_uppercase(),
                kind.as_str()
            )));
        }
        if self.llm.effective_model(kind).trim().is_empty() {
            return Err(config_error("MODEL_NAME must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(config_error(format!(
                "TEMPERATURE must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }
        Ok(kind)
    }

    /// Validate everything a question-answering session needs
    pub fn validate(&self) -> AppResult<SessionSettings> {
        let dataset = self.validate_warehouse()?;
        self.validate_llm()?;
        Ok(self.session_settings(dataset))
    }

    /// Settings for a session against `dataset`
    pub fn session_settings(&self, dataset: DatasetRef) -> SessionSettings {
        SessionSettings {
            dataset,
            temperature: self.llm.temperature,
            max_regenerations: self.agent.max_regenerations
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_env<T, F>(lookup: &F, name: &str) -> AppResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| config_error(format!("Invalid value for {}: '{}' ({})", name, raw, e))),
        None => Ok(None)
    }
}
