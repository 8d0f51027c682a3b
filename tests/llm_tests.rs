use sql_query_agent::{
    config::{LlmConfig, RetryConfig},
    error::GenerationError,
    llm::{CompletionRequest, LlmBackend, LlmClient, LlmProvider, ProviderKind}
};

fn llm_config(provider: &str) -> LlmConfig {
    LlmConfig {
        provider: Some(provider.to_string()),
        ..LlmConfig::default()
    }
}

#[test]
fn test_provider_kind_parse() {
    assert_eq!(ProviderKind::parse("Gemini").unwrap(), ProviderKind::Gemini);
    assert_eq!(ProviderKind::parse("google").unwrap(), ProviderKind::Gemini);
    assert_eq!(ProviderKind::parse("open-ai").unwrap(), ProviderKind::OpenAI);
    assert_eq!(ProviderKind::parse(" anthropic ").unwrap(), ProviderKind::Anthropic);
    assert_eq!(ProviderKind::parse("ollama").unwrap(), ProviderKind::Ollama);
}

#[test]
fn test_provider_kind_parse_unknown() {
    let err = ProviderKind::parse("watson").unwrap_err();
    assert_eq!(err, GenerationError::UnsupportedProvider(String::from("watson")));
    assert_eq!(err.reason(), "unsupported_provider");
}

#[test]
fn test_default_models() {
    assert_eq!(ProviderKind::Gemini.default_model(), "gemini-2.5-flash");
    assert_eq!(ProviderKind::OpenAI.default_model(), "gpt-4o-mini");
    assert_eq!(ProviderKind::Anthropic.default_model(), "claude-sonnet-4-20250514");
    assert_eq!(ProviderKind::Ollama.default_model(), "llama3.2");
}

#[test]
fn test_from_config_missing_key() {
    let err = LlmProvider::from_config(&llm_config("gemini")).unwrap_err();
    assert_eq!(err.reason(), "missing_api_key");
}

#[test]
fn test_from_config_with_key_and_model() {
    let config = LlmConfig {
        model: Some(String::from("claude-3-haiku")),
        anthropic_api_key: Some(String::from("sk-ant")),
        ..llm_config("anthropic")
    };
    let provider = LlmProvider::from_config(&config).unwrap();
    assert_eq!(provider.kind(), ProviderKind::Anthropic);
    assert_eq!(provider.model(), "claude-3-haiku");
}

#[test]
fn test_from_config_ollama_uses_configured_url() {
    let config = LlmConfig {
        ollama_url: Some(String::from("http://gpu-box:11434")),
        ..llm_config("ollama")
    };
    match LlmProvider::from_config(&config).unwrap() {
        LlmProvider::Ollama {
            base_url,
            model
        } => {
            assert_eq!(base_url, "http://gpu-box:11434");
            assert_eq!(model, "llama3.2");
        }
        other => panic!("expected ollama, got {:?}", other)
    }
}

#[test]
fn test_client_reports_name_and_model() {
    let client = LlmClient::new(LlmProvider::OpenAI {
        api_key: String::from("sk"),
        model:   String::from("gpt-4o-mini")
    });
    assert_eq!(client.name(), "openai");
    assert_eq!(client.model(), "gpt-4o-mini");
}

#[tokio::test]
async fn test_unreachable_backend_is_backend_failure() {
    let provider = LlmProvider::Ollama {
        base_url: String::from("http://127.0.0.1:1"),
        model:    String::from("llama3.2")
    };
    let client = LlmClient::with_retry_config(
        provider,
        RetryConfig {
            max_retries:      1,
            initial_delay_ms: 1,
            max_delay_ms:     1,
            backoff_factor:   1.0
        }
    );
    let request = CompletionRequest {
        system_prompt: String::from("system"),
        user_prompt:   String::from("user"),
        temperature:   0.0
    };

    let err = client.complete(&request).await.unwrap_err();

    assert_eq!(err.reason(), "backend_failure");
}
