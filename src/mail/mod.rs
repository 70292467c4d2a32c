//! Email records, batch ingestion, and mail sources.
//!
//! A `MailSource` yields raw `{subject, body}` pairs in arrival order.
//! `Batch::ingest` assigns each one a sequential id and freezes it as an
//! `EmailRecord`. Records are shared by `Arc` from then on and never mutated.

pub mod fixtures;
pub mod imap;

pub use fixtures::FixtureMailSource;
pub use imap::{ImapConfig, ImapMailSource};

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MailError;

/// An email as delivered by a mail source, before ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEmail {
    pub subject: String,
    pub body: String,
}

impl RawEmail {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// An ingested email. Ids are unique within their batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: u32,
    pub subject: String,
    pub body: String,
}

/// The ordered, id-assigned set of records for one analysis call.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    records: Vec<Arc<EmailRecord>>,
}

impl Batch {
    /// Assign sequential ids (from 0) in arrival order.
    pub fn ingest(raw: Vec<RawEmail>) -> Self {
        let records = raw
            .into_iter()
            .zip(0u32..)
            .map(|(email, id)| {
                Arc::new(EmailRecord {
                    id,
                    subject: email.subject,
                    body: email.body,
                })
            })
            .collect();
        Self { records }
    }

    /// Build a batch from records whose ids were assigned elsewhere.
    ///
    /// Keeps the first record for any repeated id.
    pub fn from_records(records: Vec<EmailRecord>) -> Self {
        let mut seen = HashSet::new();
        let records = records
            .into_iter()
            .filter(|r| seen.insert(r.id))
            .map(Arc::new)
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &[Arc<EmailRecord>] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EmailRecord>> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Source of recent emails. Retrieval details stay behind this trait.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Short name for logging (e.g. "imap", "fixture").
    fn name(&self) -> &str;

    /// Fetch up to `n` of the most recent emails, in arrival order.
    async fn fetch(&self, n: usize) -> Result<Vec<RawEmail>, MailError>;
}
