//! Provider router — builds the configured reasoning provider.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use wayfarer_config::ProviderConfig;
use wayfarer_core::error::ProviderError;
use wayfarer_core::provider::Provider;

use crate::openai_compat::OpenAiCompatProvider;

/// Provider kinds that run locally and need no API key.
const KEYLESS: &[&str] = &["ollama", "vllm", "llamacpp"];

/// Build the reasoning provider described by `config`.
pub fn build_from_config(config: &ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let kind = config.kind.as_str();

    let base_url = match (&config.api_url, default_base_url(kind)) {
        (Some(url), _) => url.clone(),
        (None, Some(url)) => url.to_string(),
        (None, None) => {
            return Err(ProviderError::NotConfigured(format!(
                "unknown provider kind '{kind}' and no api_url set"
            )));
        }
    };

    let api_key = match (&config.api_key, KEYLESS.contains(&kind)) {
        (Some(key), _) => key.clone(),
        (None, true) => kind.to_string(),
        (None, false) => {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for provider '{kind}' (set WAYFARER_API_KEY or provider.api_key)"
            )));
        }
    };

    info!(provider = %kind, model = %config.model, base_url = %base_url, "Reasoning provider configured");

    Ok(Arc::new(OpenAiCompatProvider::with_timeout(
        kind,
        base_url,
        api_key,
        Duration::from_secs(config.timeout_secs),
    )))
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "gemini" => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "openai" => Some("https://api.openai.com/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "vllm" => Some("http://localhost:8000/v1"),
        "llamacpp" => Some("http://localhost:8080/v1"),
        _ => None,
    }
}
