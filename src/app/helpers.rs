//! Helpers shared by the command runners: configuration overrides, backend
//! construction and exit codes.

use std::{sync::Arc, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    cli::LlmArgs,
    config::Config,
    error::{AppResult, config_error},
    llm::{LlmBackend, LlmClient, LlmProvider},
    orchestrator::QueryResult,
    warehouse::{Warehouse, bigquery::BigQueryClient}
};

/// Apply command-line model overrides on top of file and environment
/// configuration.
pub fn apply_llm_overrides(config: &mut Config, args: &LlmArgs) {
    if let Some(provider) = args.provider {
        config.llm.provider = Some(provider.as_str().to_string());
    }
    if let Some(model) = &args.model {
        config.llm.model = Some(model.clone());
    }
    if let Some(temperature) = args.temperature {
        config.llm.temperature = temperature;
    }
    if let Some(max) = args.max_regenerations {
        config.agent.max_regenerations = max;
    }
}

/// LLM backend selected by configuration.
///
/// # Errors
///
/// Returns a config error for an unknown provider or a missing key.
pub fn build_backend(config: &Config) -> AppResult<Arc<dyn LlmBackend>> {
    config.validate_llm()?;
    let provider = LlmProvider::from_config(&config.llm).map_err(|e| config_error(e.to_string()))?;
    Ok(Arc::new(LlmClient::with_retry_config(provider, config.retry.clone())))
}

/// Warehouse client for the configured project
pub fn build_warehouse(config: &Config) -> AppResult<Arc<dyn Warehouse>> {
    Ok(Arc::new(BigQueryClient::from_config(&config.warehouse)?))
}

/// 0 for a successful request, 1 otherwise
pub fn exit_code_for(result: &QueryResult) -> i32 {
    if result.is_success() { 0 } else { 1 }
}

pub(crate) fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Provider;

    #[test]
    fn test_apply_llm_overrides_replaces_only_given_values() {
        let mut config = Config::default();
        config.llm.model = Some(String::from("from-file"));
        let args = LlmArgs {
            provider:          Some(Provider::Ollama),
            model:             None,
            temperature:       Some(0.5),
            max_regenerations: Some(4)
        };
        apply_llm_overrides(&mut config, &args);
        assert_eq!(config.llm.provider.as_deref(), Some("ollama"));
        assert_eq!(config.llm.model.as_deref(), Some("from-file"));
        assert_eq!(config.llm.temperature, 0.5);
        assert_eq!(config.agent.max_regenerations, 4);
    }

    #[test]
    fn test_build_backend_ollama_needs_no_key() {
        let mut config = Config::default();
        config.llm.provider = Some(String::from("ollama"));
        let backend = build_backend(&config).unwrap();
        assert_eq!(backend.name(), "ollama");
        assert_eq!(backend.model(), "llama3.2");
    }

    #[test]
    fn test_build_backend_missing_key() {
        let mut config = Config::default();
        config.llm.provider = Some(String::from("openai"));
        assert!(build_backend(&config).is_err());
    }
}
