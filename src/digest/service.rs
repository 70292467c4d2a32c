//! Request-scoped orchestration: fetch → ingest → categorize → resolve.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::categorizer::Categorizer;
use super::resolver::{self, CategorizedResult, ResolutionWarning};
use crate::error::DigestError;
use crate::mail::{Batch, MailSource};

/// Outcome of one analysis call. Owns the batch it was computed from.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub id: Uuid,
    pub batch: Batch,
    pub result: CategorizedResult,
    pub warnings: Vec<ResolutionWarning>,
}

/// Ties a mail source to a categorizer. Holds no per-request state.
pub struct DigestService {
    source: Arc<dyn MailSource>,
    categorizer: Arc<dyn Categorizer>,
}

impl DigestService {
    pub fn new(source: Arc<dyn MailSource>, categorizer: Arc<dyn Categorizer>) -> Self {
        Self {
            source,
            categorizer,
        }
    }

    /// Fetch up to `n` recent emails and assign them ids.
    pub async fn fetch_emails(&self, n: usize) -> Result<Batch, DigestError> {
        let raw = self.source.fetch(n).await.map_err(|e| {
            warn!(source = self.source.name(), error = %e, "Mail fetch failed");
            DigestError::from(e)
        })?;
        let batch = Batch::ingest(raw);
        info!(
            source = self.source.name(),
            requested = n,
            fetched = batch.len(),
            "Fetched emails"
        );
        Ok(batch)
    }

    /// Fetch a fresh batch and analyze it.
    pub async fn analyze(&self, n: usize) -> Result<Analysis, DigestError> {
        let batch = self.fetch_emails(n).await?;
        self.analyze_batch(batch).await
    }

    /// Analyze a batch that was already ingested.
    pub async fn analyze_batch(&self, batch: Batch) -> Result<Analysis, DigestError> {
        let id = Uuid::new_v4();
        info!(analysis_id = %id, emails = batch.len(), "Starting analysis");

        let categories = self.categorizer.categorize(&batch).await.map_err(|e| {
            warn!(
                analysis_id = %id,
                kind = e.kind(),
                retryable = e.is_retryable(),
                error = %e,
                "Analysis failed"
            );
            e
        })?;

        let resolution = resolver::resolve(&batch, &categories);
        info!(
            analysis_id = %id,
            categories = resolution.result.len(),
            warnings = resolution.warnings.len(),
            "Analysis complete"
        );

        Ok(Analysis {
            id,
            batch,
            result: resolution.result,
            warnings: resolution.warnings,
        })
    }
}
