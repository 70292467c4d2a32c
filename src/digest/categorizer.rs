//! Structured generation client.
//!
//! `Categorizer` is the one capability the rest of the pipeline depends on:
//! batch in, validated `EmailCategories` out. `LlmCategorizer` implements it
//! with a single schema-constrained completion guarded by a timeout.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::prompt::PromptComposer;
use super::schema::{self, EmailCategories, ValidationPolicy};
use crate::error::DigestError;
use crate::llm::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};
use crate::mail::Batch;

/// Classify a batch into validated categories.
#[async_trait]
pub trait Categorizer: Send + Sync {
    async fn categorize(&self, batch: &Batch) -> Result<EmailCategories, DigestError>;
}

/// Settings for `LlmCategorizer`.
#[derive(Debug, Clone)]
pub struct CategorizerConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub language: String,
    pub policy: ValidationPolicy,
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 8192,
            timeout: Duration::from_secs(120),
            language: "English".to_string(),
            policy: ValidationPolicy::default(),
        }
    }
}

/// LLM-backed categorizer.
pub struct LlmCategorizer {
    llm: Arc<dyn LlmProvider>,
    composer: PromptComposer,
    config: CategorizerConfig,
}

impl LlmCategorizer {
    pub fn new(llm: Arc<dyn LlmProvider>, config: CategorizerConfig) -> Self {
        let composer = PromptComposer::new(config.policy.clone(), config.language.clone());
        Self {
            llm,
            composer,
            config,
        }
    }
}

#[async_trait]
impl Categorizer for LlmCategorizer {
    async fn categorize(&self, batch: &Batch) -> Result<EmailCategories, DigestError> {
        if batch.is_empty() {
            return Err(DigestError::EmptyBatch);
        }

        let prompt = self.composer.compose(batch);
        let request = CompletionRequest::new(vec![
            ChatMessage::system(prompt.system),
            ChatMessage::user(prompt.user),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens)
        .with_json_schema(schema::SCHEMA_NAME, schema::response_schema());

        info!(
            model = self.llm.model_name(),
            emails = batch.len(),
            "Requesting email categorization"
        );

        let response = tokio::time::timeout(self.config.timeout, self.llm.complete(request))
            .await
            .map_err(|_| {
                warn!(timeout = ?self.config.timeout, "Categorization timed out");
                DigestError::Timeout {
                    after: self.config.timeout,
                }
            })??;

        debug!(
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            finish_reason = ?response.finish_reason,
            "Categorization response received"
        );

        match response.finish_reason {
            FinishReason::Length => {
                return Err(DigestError::schema_violation(
                    "response was truncated at the token limit",
                ));
            }
            FinishReason::ContentFilter => {
                return Err(DigestError::schema_violation(
                    "response was cut by the provider's content filter",
                ));
            }
            FinishReason::Stop | FinishReason::Unknown => {}
        }

        let categories = parse_categories(&response.content)?;
        let batch_ids: HashSet<u32> = batch.iter().map(|r| r.id).collect();
        if let Err(e) = schema::validate(&categories, &self.config.policy, &batch_ids) {
            warn!(error = %e, "Categorization failed validation");
            return Err(e);
        }

        info!(
            categories = categories.summaries.len(),
            "Categorization validated"
        );
        Ok(categories)
    }
}

/// Decode the model output into `EmailCategories`.
pub fn parse_categories(raw: &str) -> Result<EmailCategories, DigestError> {
    let json_str = extract_json_object(raw);
    serde_json::from_str(json_str)
        .map_err(|e| DigestError::schema_violation(format!("response does not match schema: {e}")))
}

/// Extract a JSON object from model output (handles markdown wrapping).
fn extract_json_object(text: &str) -> &str {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed;
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner;
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return &trimmed[start..=end];
    }

    trimmed
}
