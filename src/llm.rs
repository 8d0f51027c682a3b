//! LLM provider integrations for SQL generation.
//!
//! This module provides a unified interface for interacting with multiple LLM
//! providers. It handles authentication, request formatting, response parsing,
//! and automatic retry of transport-level failures with exponential backoff.
//!
//! # Supported Providers
//!
//! | Provider | Endpoint | Authentication |
//! |----------|----------|----------------|
//! | Gemini | `generativelanguage.googleapis.com` | x-goog-api-key header |
//! | OpenAI | `api.openai.com` | Bearer token |
//! | Anthropic | `api.anthropic.com` | x-api-key header |
//! | Ollama | Local (configurable) | None |
//!
//! Every provider is asked for a JSON answer where its API allows it. The
//! returned text is handed back unparsed; interpreting it is the generator's
//! job.
//!
//! # Retry Behavior
//!
//! The client resends the identical request on transient errors:
//! - Connection failures and timeouts
//! - Rate limiting (429)
//! - Server errors (5xx)
//!
//! Invalid keys and other client errors are returned immediately.
//!
//! # Example
//!
//! ```
//! use sql_query_agent::{
//!     config::RetryConfig,
//!     llm::{LlmClient, LlmProvider}
//! };
//!
//! let provider = LlmProvider::Ollama {
//!     base_url: "http://localhost:11434".into(),
//!     model:    "llama3.2".into()
//! };
//!
//! let client = LlmClient::with_retry_config(provider, RetryConfig::default());
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    config::{LlmConfig, RetryConfig},
    error::{GenerationError, llm_http_error, llm_status_error}
};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 1024;

/// Supported provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    OpenAI,
    Anthropic,
    Ollama
}

impl ProviderKind {
    /// Parse a configured provider name (case-insensitive).
    ///
    /// `google` is accepted as an alias for Gemini.
    pub fn parse(name: &str) -> Result<Self, GenerationError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" | "open-ai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            _ => Err(GenerationError::UnsupportedProvider(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama"
        }
    }

    /// Get default model for provider
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.5-flash",
            Self::OpenAI => "gpt-4o-mini",
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::Ollama => "llama3.2"
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

/// LLM provider configuration with authentication credentials.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Google Gemini API
    Gemini {
        /// API key
        api_key: String,
        /// Model identifier (e.g., "gemini-2.5-flash")
        model:   String
    },
    /// OpenAI API (GPT-4o, GPT-4, etc.)
    OpenAI {
        /// API key (sk-...)
        api_key: String,
        /// Model identifier (e.g., "gpt-4o-mini")
        model:   String
    },
    /// Anthropic API (Claude models)
    Anthropic {
        /// API key
        api_key: String,
        /// Model identifier (e.g., "claude-sonnet-4-20250514")
        model:   String
    },
    /// Local Ollama instance
    Ollama {
        /// Base URL (e.g., "http://localhost:11434")
        base_url: String,
        /// Model name (e.g., "llama3.2", "codellama")
        model:    String
    }
}

impl LlmProvider {
    /// Build the provider selected by configuration.
    ///
    /// # Errors
    ///
    /// `UnsupportedProvider` for an unknown name, `MissingApiKey` when the
    /// provider needs a key and none is set.
    pub fn from_config(config: &LlmConfig) -> Result<Self, GenerationError> {
        let kind = ProviderKind::parse(config.provider_name())?;
        let model = config.effective_model(kind);
        let api_key = || {
            config
                .api_key_for(kind)
                .map(str::to_string)
                .ok_or_else(|| GenerationError::MissingApiKey {
                    provider: kind.as_str().to_string()
                })
        };
        Ok(match kind {
            ProviderKind::Gemini => Self::Gemini {
                api_key: api_key()?,
                model
            },
            ProviderKind::OpenAI => Self::OpenAI {
                api_key: api_key()?,
                model
            },
            ProviderKind::Anthropic => Self::Anthropic {
                api_key: api_key()?,
                model
            },
            ProviderKind::Ollama => Self::Ollama {
                base_url: config.ollama_url(),
                model
            }
        })
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Gemini {
                ..
            } => ProviderKind::Gemini,
            Self::OpenAI {
                ..
            } => ProviderKind::OpenAI,
            Self::Anthropic {
                ..
            } => ProviderKind::Anthropic,
            Self::Ollama {
                ..
            } => ProviderKind::Ollama
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::Gemini {
                model, ..
            }
            | Self::OpenAI {
                model, ..
            }
            | Self::Anthropic {
                model, ..
            }
            | Self::Ollama {
                model, ..
            } => model
        }
    }
}

/// One model invocation: fixed instructions, the user turn, sampling
/// temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt:   String,
    pub temperature:   f32
}

/// Text completion capability every provider offers.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Provider name for logs and messages
    fn name(&self) -> &str;

    /// Model identifier requests are sent to
    fn model(&self) -> &str;

    /// Send one request and return the raw response text
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError>;
}

/// HTTP client for LLM API communication with retry support.
///
/// Handles provider-specific request formatting and response parsing.
/// Automatically retries transient failures with exponential backoff.
pub struct LlmClient {
    provider:     LlmProvider,
    client:       reqwest::Client,
    retry_config: RetryConfig
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents:           Vec<GeminiContent>,
    generation_config:  GeminiGenerationConfig
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role:  Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature:        f32,
    response_mime_type: String
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>
}

#[derive(Serialize)]
struct OpenAIRequest {
    model:           String,
    temperature:     f32,
    messages:        Vec<OpenAIRequestMessage>,
    response_format: OpenAIResponseFormat
}

#[derive(Serialize)]
struct OpenAIRequestMessage {
    role:    String,
    content: String
}

#[derive(Serialize)]
struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    kind: String
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>
}

#[derive(Serialize)]
struct AnthropicRequest {
    model:       String,
    max_tokens:  u32,
    temperature: f32,
    system:      String,
    messages:    Vec<AnthropicMessage>
}

#[derive(Serialize)]
struct AnthropicMessage {
    role:    String,
    content: String
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String
}

#[derive(Serialize)]
struct OllamaRequest {
    model:   String,
    system:  String,
    prompt:  String,
    format:  String,
    stream:  bool,
    options: OllamaOptions
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String
}

impl LlmClient {
    /// Create new LLM client with default retry configuration
    pub fn new(provider: LlmProvider) -> Self {
        Self::with_retry_config(provider, RetryConfig::default())
    }

    /// Create new LLM client with custom retry configuration
    pub fn with_retry_config(provider: LlmProvider, retry_config: RetryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            provider,
            client,
            retry_config
        }
    }

    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    async fn call_with_retry(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let mut last_error = None;
        let mut delay = self.retry_config.initial_delay_ms;
        for attempt in 0..=self.retry_config.max_retries {
            if attempt > 0 {
                warn!(
                    provider = self.name(),
                    attempt = attempt + 1,
                    max_attempts = self.retry_config.max_retries + 1,
                    delay_ms = delay,
                    "Retrying LLM request"
                );
                sleep(Duration::from_millis(delay)).await;
                delay = ((delay as f64 * self.retry_config.backoff_factor) as u64)
                    .min(self.retry_config.max_delay_ms);
            }
            match self.call_provider(request).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() => {
                    last_error = Some(e);
                }
                Err(e) => return Err(e)
            }
        }
        Err(last_error.unwrap_or_else(|| GenerationError::Backend {
            message:   String::from("All retry attempts failed"),
            transient: false
        }))
    }

    async fn call_provider(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        match &self.provider {
            LlmProvider::Gemini {
                api_key,
                model
            } => self.call_gemini(api_key, model, request).await,
            LlmProvider::OpenAI {
                api_key,
                model
            } => self.call_openai(api_key, model, request).await,
            LlmProvider::Anthropic {
                api_key,
                model
            } => self.call_anthropic(api_key, model, request).await,
            LlmProvider::Ollama {
                base_url,
                model
            } => self.call_ollama(base_url, model, request).await
        }
    }

    async fn call_gemini(
        &self,
        api_key: &str,
        model: &str,
        request: &CompletionRequest
    ) -> Result<String, GenerationError> {
        let body = GeminiRequest {
            system_instruction: GeminiContent {
                role:  None,
                parts: vec![GeminiPart {
                    text: request.system_prompt.clone()
                }]
            },
            contents:           vec![GeminiContent {
                role:  Some(String::from("user")),
                parts: vec![GeminiPart {
                    text: request.user_prompt.clone()
                }]
            }],
            generation_config:  GeminiGenerationConfig {
                temperature:        request.temperature,
                response_mime_type: String::from("application/json")
            }
        };
        let url = format!("{}/models/{}:generateContent", GEMINI_BASE_URL, model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(llm_http_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            // Gemini reports a bad key as 400 INVALID_ARGUMENT
            if text.contains("API_KEY_INVALID") {
                return Err(GenerationError::InvalidApiKey {
                    provider: String::from("gemini"),
                    message:  format!("{} {}", status, text)
                });
            }
            return Err(llm_status_error("Gemini", status, &text));
        }
        let result: GeminiResponse = response.json().await.map_err(llm_http_error)?;
        result
            .candidates
            .into_iter()
            .find_map(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<String>()
            })
            .ok_or_else(|| backend_error("Empty response from Gemini"))
    }

    async fn call_openai(
        &self,
        api_key: &str,
        model: &str,
        request: &CompletionRequest
    ) -> Result<String, GenerationError> {
        let body = OpenAIRequest {
            model:           model.to_string(),
            temperature:     request.temperature,
            messages:        vec![
                OpenAIRequestMessage {
                    role:    String::from("system"),
                    content: request.system_prompt.clone()
                },
                OpenAIRequestMessage {
                    role:    String::from("user"),
                    content: request.user_prompt.clone()
                }
            ],
            response_format: OpenAIResponseFormat {
                kind: String::from("json_object")
            }
        };
        let response = self
            .client
            .post(OPENAI_CHAT_URL)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(llm_http_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(llm_status_error("OpenAI", status, &text));
        }
        let result: OpenAIResponse = response.json().await.map_err(llm_http_error)?;
        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| backend_error("Empty response from OpenAI"))
    }

    async fn call_anthropic(
        &self,
        api_key: &str,
        model: &str,
        request: &CompletionRequest
    ) -> Result<String, GenerationError> {
        let body = AnthropicRequest {
            model:       model.to_string(),
            max_tokens:  ANTHROPIC_MAX_TOKENS,
            temperature: request.temperature,
            system:      request.system_prompt.clone(),
            messages:    vec![AnthropicMessage {
                role:    String::from("user"),
                content: request.user_prompt.clone()
            }]
        };
        let response = self
            .client
            .post(ANTHROPIC_MESSAGES_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(llm_http_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(llm_status_error("Anthropic", status, &text));
        }
        let result: AnthropicResponse = response.json().await.map_err(llm_http_error)?;
        result
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| backend_error("Empty response from Anthropic"))
    }

    async fn call_ollama(
        &self,
        base_url: &str,
        model: &str,
        request: &CompletionRequest
    ) -> Result<String, GenerationError> {
        let body = OllamaRequest {
            model:   model.to_string(),
            system:  request.system_prompt.clone(),
            prompt:  request.user_prompt.clone(),
            format:  String::from("json"),
            stream:  false,
            options: OllamaOptions {
                temperature: request.temperature
            }
        };
        let url = format!("{}/api/generate", base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(llm_http_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(llm_status_error("Ollama", status, &text));
        }
        let result: OllamaResponse = response.json().await.map_err(llm_http_error)?;
        Ok(result.response)
    }
}

#[async_trait]
impl LlmBackend for LlmClient {
    fn name(&self) -> &str {
        self.provider.kind().as_str()
    }

    fn model(&self) -> &str {
        self.provider.model()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        debug!(
            provider = self.name(),
            model = self.model(),
            system_len = request.system_prompt.len(),
            user_len = request.user_prompt.len(),
            "Sending completion request"
        );
        self.call_with_retry(request).await
    }
}

fn backend_error(message: &str) -> GenerationError {
    GenerationError::Backend {
        message:   message.to_string(),
        transient: false
    }
}
