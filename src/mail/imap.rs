//! Read-only IMAP mail source.
//!
//! Opens the mailbox with `EXAMINE` and fetches with `BODY.PEEK[]`, so no
//! flags are ever changed on the server. The protocol exchange is blocking
//! and runs inside `spawn_blocking`.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mail_parser::MessageParser;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use super::{MailSource, RawEmail};
use crate::config::env_parse;
use crate::error::{ConfigError, MailError};

const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// IMAP connection settings, built from environment variables.
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub mailbox: String,
}

impl ImapConfig {
    /// Returns `Ok(None)` if `EMAIL_IMAP_HOST` is not set.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(host) = std::env::var("EMAIL_IMAP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            host,
            port: env_parse("EMAIL_IMAP_PORT", 993)?,
            username: std::env::var("EMAIL_USERNAME").unwrap_or_default(),
            password: SecretString::from(std::env::var("EMAIL_PASSWORD").unwrap_or_default()),
            mailbox: std::env::var("EMAIL_MAILBOX").unwrap_or_else(|_| "INBOX".to_string()),
        }))
    }
}

/// Mail source backed by an IMAP server over TLS.
pub struct ImapMailSource {
    config: ImapConfig,
}

impl ImapMailSource {
    pub fn new(config: ImapConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailSource for ImapMailSource {
    fn name(&self) -> &str {
        "imap"
    }

    async fn fetch(&self, n: usize) -> Result<Vec<RawEmail>, MailError> {
        let config = self.config.clone();
        let emails = tokio::task::spawn_blocking(move || fetch_recent_imap(&config, n))
            .await
            .map_err(|e| MailError::Task(e.to_string()))??;

        info!(
            host = %self.config.host,
            mailbox = %self.config.mailbox,
            count = emails.len(),
            "Fetched emails over IMAP"
        );
        Ok(emails)
    }
}

// ── Session ─────────────────────────────────────────────────────────

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Tagged response to one command: untagged lines, literals, final line.
struct CommandResponse {
    lines: Vec<String>,
    literals: Vec<Vec<u8>>,
    status: String,
}

impl CommandResponse {
    fn is_ok(&self, tag: &str) -> bool {
        self.status
            .strip_prefix(tag)
            .is_some_and(|rest| rest.trim_start().starts_with("OK"))
    }
}

struct ImapSession {
    stream: TlsStream,
    next_tag: u32,
}

impl ImapSession {
    fn connect(config: &ImapConfig) -> Result<Self, MailError> {
        let tcp = TcpStream::connect((config.host.as_str(), config.port)).map_err(|e| {
            MailError::Connect {
                host: config.host.clone(),
                port: config.port,
                reason: e.to_string(),
            }
        })?;
        tcp.set_read_timeout(Some(READ_TIMEOUT))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = rustls::pki_types::ServerName::try_from(config.host.clone())
            .map_err(|e| MailError::Tls(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| MailError::Tls(e.to_string()))?;

        let mut session = Self {
            stream: rustls::StreamOwned::new(conn, tcp),
            next_tag: 1,
        };
        let greeting = session.read_line()?;
        if !greeting.starts_with("* OK") && !greeting.starts_with("* PREAUTH") {
            return Err(MailError::Protocol(format!(
                "unexpected greeting: {}",
                greeting.trim_end()
            )));
        }
        Ok(session)
    }

    fn read_line(&mut self) -> Result<String, MailError> {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.stream.read(&mut byte)? {
                0 => return Err(MailError::Protocol("connection closed".into())),
                _ => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).into_owned());
                    }
                }
            }
        }
    }

    fn command(&mut self, cmd: &str) -> Result<(String, CommandResponse), MailError> {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;

        self.stream.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        self.stream.flush()?;

        let mut lines = Vec::new();
        let mut literals = Vec::new();
        loop {
            let line = self.read_line()?;
            if line.starts_with(&tag) {
                let response = CommandResponse {
                    lines,
                    literals,
                    status: line,
                };
                return Ok((tag, response));
            }
            if let Some(len) = parse_literal_len(&line) {
                let mut literal = vec![0u8; len];
                self.stream.read_exact(&mut literal)?;
                literals.push(literal);
            }
            lines.push(line);
        }
    }
}

/// Fetch the `n` most recent messages, newest first, without marking them seen.
fn fetch_recent_imap(config: &ImapConfig, n: usize) -> Result<Vec<RawEmail>, MailError> {
    let mut session = ImapSession::connect(config)?;

    let (tag, login) = session.command(&format!(
        "LOGIN {} {}",
        quote_imap(&config.username),
        quote_imap(config.password.expose_secret())
    ))?;
    if !login.is_ok(&tag) {
        return Err(MailError::AuthFailed {
            username: config.username.clone(),
        });
    }

    let (tag, examine) = session.command(&format!("EXAMINE {}", quote_imap(&config.mailbox)))?;
    if !examine.is_ok(&tag) {
        return Err(MailError::Protocol(format!(
            "EXAMINE {} failed: {}",
            config.mailbox,
            examine.status.trim_end()
        )));
    }
    let exists = examine.lines.iter().find_map(|l| parse_exists(l)).unwrap_or(0);
    debug!(mailbox = %config.mailbox, exists, "Mailbox opened read-only");

    let mut emails = Vec::new();
    for seq in recent_sequence_numbers(exists, n) {
        let (tag, fetch) = session.command(&format!("FETCH {seq} BODY.PEEK[]"))?;
        if !fetch.is_ok(&tag) {
            warn!(seq, status = %fetch.status.trim_end(), "FETCH failed, skipping message");
            continue;
        }
        let Some(raw) = fetch.literals.first() else {
            warn!(seq, "FETCH returned no message body, skipping");
            continue;
        };
        match parse_raw_email(raw) {
            Some(email) => emails.push(email),
            None => warn!(seq, "Failed to parse message, skipping"),
        }
    }

    // Best effort; the data is already in hand.
    let _ = session.command("LOGOUT");

    Ok(emails)
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Quote a string for use as an IMAP quoted-string.
fn quote_imap(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Parse `* 42 EXISTS`.
fn parse_exists(line: &str) -> Option<u32> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "*" {
        return None;
    }
    let count = parts.next()?.parse().ok()?;
    (parts.next()? == "EXISTS").then_some(count)
}

/// Parse a trailing literal marker like `... {1234}\r\n`.
fn parse_literal_len(line: &str) -> Option<usize> {
    let trimmed = line.trim_end();
    let inner = trimmed.strip_suffix('}')?;
    let start = inner.rfind('{')?;
    inner[start + 1..].parse().ok()
}

/// Sequence numbers of the `n` newest messages, newest first.
fn recent_sequence_numbers(exists: u32, n: usize) -> Vec<u32> {
    let n = u32::try_from(n).unwrap_or(u32::MAX);
    let oldest = exists.saturating_sub(n) + 1;
    (oldest..=exists).rev().collect()
}

fn parse_raw_email(raw: &[u8]) -> Option<RawEmail> {
    let parsed = MessageParser::default().parse(raw)?;
    let subject = parsed.subject().unwrap_or("(no subject)").to_string();
    Some(RawEmail {
        subject,
        body: extract_text(&parsed),
    })
}

/// Readable text of a parsed message, preferring the plain-text part.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.trim().to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    "(no readable content)".to_string()
}

/// Strip HTML tags and normalize whitespace.
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_escapes_specials() {
        assert_eq!(quote_imap("user"), "\"user\"");
        assert_eq!(quote_imap(r#"pa"ss\word"#), r#""pa\"ss\\word""#);
    }

    #[test]
    fn exists_line_parsing() {
        assert_eq!(parse_exists("* 42 EXISTS\r\n"), Some(42));
        assert_eq!(parse_exists("* 3 RECENT\r\n"), None);
        assert_eq!(parse_exists("* OK [UIDVALIDITY 1]\r\n"), None);
        assert_eq!(parse_exists("A2 OK done\r\n"), None);
    }

    #[test]
    fn literal_length_parsing() {
        assert_eq!(parse_literal_len("* 5 FETCH (BODY[] {1234}\r\n"), Some(1234));
        assert_eq!(parse_literal_len("* 5 FETCH (FLAGS (\\Seen))\r\n"), None);
        assert_eq!(parse_literal_len("{abc}\r\n"), None);
    }

    #[test]
    fn recent_sequence_numbers_newest_first() {
        assert_eq!(recent_sequence_numbers(10, 3), vec![10, 9, 8]);
        assert_eq!(recent_sequence_numbers(2, 5), vec![2, 1]);
        assert!(recent_sequence_numbers(0, 5).is_empty());
        assert!(recent_sequence_numbers(10, 0).is_empty());
    }

    #[test]
    fn tagged_ok_detection() {
        let response = CommandResponse {
            lines: vec![],
            literals: vec![],
            status: "A1 OK LOGIN completed\r\n".into(),
        };
        assert!(response.is_ok("A1"));

        let failed = CommandResponse {
            lines: vec![],
            literals: vec![],
            status: "A1 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n".into(),
        };
        assert!(!failed.is_ok("A1"));
    }

    #[test]
    fn parse_plain_text_message() {
        let raw = b"From: alice@example.com\r\n\
                    Subject: Quarterly numbers\r\n\
                    Content-Type: text/plain; charset=utf-8\r\n\
                    \r\n\
                    Revenue is up 8%.\r\n";
        let email = parse_raw_email(raw).unwrap();
        assert_eq!(email.subject, "Quarterly numbers");
        assert_eq!(email.body, "Revenue is up 8%.");
    }

    #[test]
    fn parse_message_without_subject() {
        let raw = b"From: bob@example.com\r\n\r\nHello\r\n";
        let email = parse_raw_email(raw).unwrap();
        assert_eq!(email.subject, "(no subject)");
    }

    #[test]
    fn strip_html_basic() {
        assert_eq!(strip_html("<p>Hello</p>"), "Hello");
        assert_eq!(
            strip_html("<div><b>Bold</b> and   <i>italic</i></div>"),
            "Bold and italic"
        );
        assert_eq!(strip_html(""), "");
    }

    #[test]
    fn config_from_env_returns_none_when_no_host() {
        // SAFETY: no other test in this crate reads EMAIL_IMAP_HOST.
        unsafe { std::env::remove_var("EMAIL_IMAP_HOST") };
        assert!(ImapConfig::from_env().unwrap().is_none());
    }
}
