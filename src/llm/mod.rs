//! LLM integration for inbox-digest.
//!
//! The digest core only sees the `LlmProvider` trait. `OpenAiProvider` is
//! the production backend; it works against OpenAI and any server exposing
//! the same chat-completions API with JSON Schema response formats.

pub mod openai;
pub mod provider;

pub use openai::OpenAiProvider;
pub use provider::*;

use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConfigError, LlmError};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: secrecy::SecretString,
    pub model: String,
    pub base_url: String,
    /// Transport-level timeout for a single HTTP request.
    pub request_timeout: Duration,
}

impl LlmConfig {
    /// Build config from environment variables.
    ///
    /// `OPENAI_API_KEY` is required; `DIGEST_MODEL` and `OPENAI_BASE_URL`
    /// are optional.
    pub fn from_env(request_timeout: Duration) -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;
        let model = std::env::var("DIGEST_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            api_key: secrecy::SecretString::from(api_key),
            model,
            base_url,
            request_timeout,
        })
    }
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = OpenAiProvider::new(
        config.api_key.clone(),
        config.base_url.clone(),
        config.model.clone(),
        config.request_timeout,
    )?;
    tracing::info!("Using OpenAI-compatible provider (model: {})", config.model);
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_with_any_key() {
        // The key is only checked by the server on the first request.
        let config = LlmConfig {
            api_key: secrecy::SecretString::from("sk-test"),
            model: "gpt-4o-mini".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        };
        let provider = create_provider(&config);
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap().model_name(), "gpt-4o-mini");
    }
}
