//! Error types for inbox-digest.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Mail source errors. Surfaced to callers as an ingestion failure.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Failed to connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Authentication failed for {username}")]
    AuthFailed { username: String },

    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    #[error("Mail fetch task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Provider {provider} refused the request: {reason}")]
    Refused { provider: String, reason: String },
}

/// Failure of a single analysis call.
///
/// Every variant fails the whole operation; no partial result is ever
/// returned alongside one of these.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("Ingestion failed: {0}")]
    Ingestion(#[from] MailError),

    #[error("Generation failed: {reason}")]
    Generation { reason: String },

    #[error("Generation timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Schema violation: {}", summarize_violations(.violations))]
    SchemaViolation { violations: Vec<String> },

    #[error("Cannot analyze an empty batch")]
    EmptyBatch,
}

impl DigestError {
    pub fn schema_violation(violation: impl Into<String>) -> Self {
        Self::SchemaViolation {
            violations: vec![violation.into()],
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Generation { .. } | Self::Timeout { .. })
    }

    /// Stable machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ingestion(_) => "ingestion_failure",
            Self::Generation { .. } | Self::Timeout { .. } => "generation_failure",
            Self::SchemaViolation { .. } => "schema_violation",
            Self::EmptyBatch => "empty_batch",
        }
    }
}

impl From<LlmError> for DigestError {
    fn from(e: LlmError) -> Self {
        match e {
            // The provider answered, but with something we can't decode.
            LlmError::InvalidResponse { reason, .. } => Self::schema_violation(reason),
            // A refusal repeats on retry.
            LlmError::Refused { reason, .. } => {
                Self::schema_violation(format!("provider refused the request: {reason}"))
            }
            other => Self::Generation {
                reason: other.to_string(),
            },
        }
    }
}

fn summarize_violations(violations: &[String]) -> String {
    match violations {
        [] => "unknown".to_string(),
        [only] => only.clone(),
        [first, rest @ ..] => format!("{first} (+{} more)", rest.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_only_for_generation_failures() {
        assert!(
            DigestError::Generation {
                reason: "502".into()
            }
            .is_retryable()
        );
        assert!(
            DigestError::Timeout {
                after: Duration::from_secs(1)
            }
            .is_retryable()
        );
        assert!(!DigestError::schema_violation("too few categories").is_retryable());
        assert!(!DigestError::EmptyBatch.is_retryable());
        assert!(!DigestError::Ingestion(MailError::Protocol("bye".into())).is_retryable());
    }

    #[test]
    fn timeout_reports_as_generation_failure() {
        let err = DigestError::Timeout {
            after: Duration::from_secs(30),
        };
        assert_eq!(err.kind(), "generation_failure");
    }

    #[test]
    fn schema_violation_message_counts_extra_violations() {
        let err = DigestError::SchemaViolation {
            violations: vec!["a".into(), "b".into(), "c".into()],
        };
        assert_eq!(err.to_string(), "Schema violation: a (+2 more)");
    }

    #[test]
    fn llm_error_mapping() {
        let transport: DigestError = LlmError::RequestFailed {
            provider: "openai".into(),
            reason: "connection reset".into(),
        }
        .into();
        assert_eq!(transport.kind(), "generation_failure");

        let decode: DigestError = LlmError::InvalidResponse {
            provider: "openai".into(),
            reason: "missing summaries".into(),
        }
        .into();
        assert_eq!(decode.kind(), "schema_violation");
    }

    #[test]
    fn refusal_is_not_retryable() {
        let refused: DigestError = LlmError::Refused {
            provider: "openai".into(),
            reason: "I can't help with that".into(),
        }
        .into();
        assert_eq!(refused.kind(), "schema_violation");
        assert!(!refused.is_retryable());
        assert!(refused.to_string().contains("refused"));
    }
}
