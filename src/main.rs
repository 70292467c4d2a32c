use std::sync::Arc;
use std::time::Duration;

use inbox_digest::api::{AppState, digest_routes};
use inbox_digest::config::{DigestConfig, MailSourceKind};
use inbox_digest::digest::{CategorizerConfig, DigestService, LlmCategorizer};
use inbox_digest::error::ConfigError;
use inbox_digest::llm::{LlmConfig, create_provider};
use inbox_digest::mail::{FixtureMailSource, ImapConfig, ImapMailSource, MailSource};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Both ring and aws-lc-rs are compiled in, so pick one before any TLS usage.
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::warn!("A rustls crypto provider was already installed");
    }

    let config = DigestConfig::from_env()?;

    // The HTTP client gets a little slack over the generation timeout so the
    // outer bound is the one that fires.
    let llm_config = LlmConfig::from_env(config.generation_timeout + Duration::from_secs(10))?;
    let llm = create_provider(&llm_config)?;

    let (source, mail_desc) = match config.mail_source {
        MailSourceKind::Imap => {
            let imap = ImapConfig::from_env()?
                .ok_or_else(|| ConfigError::MissingEnvVar("EMAIL_IMAP_HOST".to_string()))?;
            let desc = format!("imap://{}:{}/{}", imap.host, imap.port, imap.mailbox);
            (Arc::new(ImapMailSource::new(imap)) as Arc<dyn MailSource>, desc)
        }
        MailSourceKind::Fixture => (
            Arc::new(FixtureMailSource::sample()) as Arc<dyn MailSource>,
            "built-in sample inbox".to_string(),
        ),
    };

    let categorizer = Arc::new(LlmCategorizer::new(
        llm,
        CategorizerConfig {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.generation_timeout,
            language: config.language.clone(),
            policy: config.policy.clone(),
        },
    ));
    let service = Arc::new(DigestService::new(source, categorizer));

    eprintln!("📬 Inbox Digest v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", llm_config.model);
    eprintln!("   Mail: {}", mail_desc);
    eprintln!("   Language: {}", config.language);
    eprintln!("   Emails API: http://{}/emails", config.bind_addr);
    eprintln!("   Analysis API: http://{}/analyse\n", config.bind_addr);

    let app = digest_routes(AppState {
        service,
        default_limit: config.default_limit,
        max_limit: config.max_limit,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Inbox digest server started");
    axum::serve(listener, app).await?;

    Ok(())
}
