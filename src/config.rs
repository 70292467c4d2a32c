//! Configuration types.
//!
//! Everything is read from environment variables. Unset variables fall back
//! to defaults; set-but-unparseable ones are an error.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::digest::ValidationPolicy;
use crate::error::ConfigError;

/// Which mail source the service reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailSourceKind {
    Imap,
    Fixture,
}

impl FromStr for MailSourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "imap" => Ok(Self::Imap),
            "fixture" => Ok(Self::Fixture),
            other => Err(ConfigError::InvalidValue {
                key: "DIGEST_MAIL_SOURCE".to_string(),
                message: format!("expected 'imap' or 'fixture', got '{other}'"),
            }),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Emails fetched when a request gives no `limit`.
    pub default_limit: usize,
    /// Upper bound accepted for `limit`.
    pub max_limit: usize,
    /// Hard bound on one generation call.
    pub generation_timeout: Duration,
    /// Sampling temperature for generation.
    pub temperature: f32,
    /// Completion token cap for generation.
    pub max_tokens: u32,
    /// Language the summaries are written in.
    pub language: String,
    pub mail_source: MailSourceKind,
    pub policy: ValidationPolicy,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            default_limit: 20,
            max_limit: 100,
            generation_timeout: Duration::from_secs(120),
            temperature: 0.7,
            max_tokens: 8192,
            language: "English".to_string(),
            mail_source: MailSourceKind::Fixture,
            policy: ValidationPolicy::default(),
        }
    }
}

impl DigestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mail_source = match std::env::var("DIGEST_MAIL_SOURCE") {
            Ok(value) => value.parse()?,
            Err(_) if std::env::var("EMAIL_IMAP_HOST").is_ok() => MailSourceKind::Imap,
            Err(_) => MailSourceKind::Fixture,
        };

        let config = Self {
            bind_addr: env_parse("DIGEST_BIND_ADDR", defaults.bind_addr)?,
            default_limit: env_parse("DIGEST_DEFAULT_LIMIT", defaults.default_limit)?,
            max_limit: env_parse("DIGEST_MAX_LIMIT", defaults.max_limit)?,
            generation_timeout: Duration::from_secs(env_parse(
                "DIGEST_GENERATION_TIMEOUT_SECS",
                defaults.generation_timeout.as_secs(),
            )?),
            temperature: env_parse("DIGEST_TEMPERATURE", defaults.temperature)?,
            max_tokens: env_parse("DIGEST_MAX_TOKENS", defaults.max_tokens)?,
            language: std::env::var("DIGEST_LANGUAGE").unwrap_or(defaults.language),
            mail_source,
            policy: defaults.policy,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that could never serve a request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_limit == 0 {
            return Err(invalid("DIGEST_MAX_LIMIT", "must be at least 1"));
        }
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(invalid(
                "DIGEST_DEFAULT_LIMIT",
                format!("must be between 1 and {}", self.max_limit),
            ));
        }
        if self.generation_timeout.is_zero() {
            return Err(invalid("DIGEST_GENERATION_TIMEOUT_SECS", "must be positive"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("DIGEST_TEMPERATURE", "must be between 0.0 and 2.0"));
        }
        Ok(())
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

/// Parse an environment variable, using `default` when it is unset.
pub(crate) fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, format!("'{raw}': {e}"))),
        Err(_) => Ok(default),
    }
}
