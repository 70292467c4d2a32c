//! Response resolver: maps validated categories back onto the batch.
//!
//! Deterministic, no I/O. Given the same `(batch, categories)` it always
//! produces the same `CategorizedResult`, down to serialization order.

use std::collections::HashSet;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, warn};

use super::schema::EmailCategories;
use crate::mail::{Batch, EmailRecord};

/// One resolved category.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CategoryDigest {
    global_summary: String,
    emails: Vec<Arc<EmailRecord>>,
    email_count: usize,
}

impl CategoryDigest {
    fn new(global_summary: String, emails: Vec<Arc<EmailRecord>>) -> Self {
        let email_count = emails.len();
        Self {
            global_summary,
            emails,
            email_count,
        }
    }

    pub fn global_summary(&self) -> &str {
        &self.global_summary
    }

    /// Matched records, in batch order.
    pub fn emails(&self) -> &[Arc<EmailRecord>] {
        &self.emails
    }

    pub fn email_count(&self) -> usize {
        self.email_count
    }

    pub fn email_ids(&self) -> Vec<u32> {
        self.emails.iter().map(|e| e.id).collect()
    }
}

/// Category label → resolved category, in first-insertion order.
///
/// Serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorizedResult {
    entries: Vec<(String, CategoryDigest)>,
}

impl CategorizedResult {
    /// Insert or replace. A replaced label keeps its original position.
    /// Returns `true` if the label was already present.
    fn upsert(&mut self, label: String, digest: CategoryDigest) -> bool {
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some((_, existing)) => {
                *existing = digest;
                true
            }
            None => {
                self.entries.push((label, digest));
                false
            }
        }
    }

    pub fn get(&self, label: &str) -> Option<&CategoryDigest> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, digest)| digest)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CategoryDigest)> {
        self.entries.iter().map(|(l, d)| (l.as_str(), d))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for CategorizedResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, digest) in &self.entries {
            map.serialize_entry(label, digest)?;
        }
        map.end()
    }
}

/// Non-fatal observations made while resolving. Never raised as errors.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionWarning {
    /// The category listed an id that is not in the batch; it was dropped.
    DanglingId { category: String, id: i64 },
    /// A later category reused this label and replaced the earlier one.
    DuplicateLabel { category: String },
    /// The record was not selected by any category.
    Unassigned { id: u32 },
}

/// Resolver output: the result plus what was tolerated to build it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub result: CategorizedResult,
    pub warnings: Vec<ResolutionWarning>,
}

/// Build a `CategorizedResult` from a validated response.
///
/// - Categories are processed in response order.
/// - Each category's emails keep the batch's order, not the id-list order.
/// - Ids missing from the batch are dropped.
/// - A record may land in several categories.
/// - A repeated label replaces the earlier entry (last write wins).
pub fn resolve(batch: &Batch, categories: &EmailCategories) -> Resolution {
    let batch_ids: HashSet<u32> = batch.iter().map(|r| r.id).collect();
    let mut result = CategorizedResult::default();
    let mut warnings = Vec::new();

    for entry in &categories.summaries {
        let wanted: HashSet<i64> = entry.ids.iter().copied().collect();

        // Negative or oversized ids can never match a record.
        let mut dangling: Vec<i64> = wanted
            .iter()
            .copied()
            .filter(|&id| !u32::try_from(id).is_ok_and(|id| batch_ids.contains(&id)))
            .collect();
        dangling.sort_unstable();
        for id in dangling {
            warn!(category = %entry.category, id, "Dropping id not present in batch");
            warnings.push(ResolutionWarning::DanglingId {
                category: entry.category.clone(),
                id,
            });
        }

        let emails: Vec<Arc<EmailRecord>> = batch
            .iter()
            .filter(|r| wanted.contains(&i64::from(r.id)))
            .cloned()
            .collect();
        let digest = CategoryDigest::new(entry.summary.clone(), emails);
        if result.upsert(entry.category.clone(), digest) {
            warn!(category = %entry.category, "Duplicate category label, keeping the later one");
            warnings.push(ResolutionWarning::DuplicateLabel {
                category: entry.category.clone(),
            });
        }
    }

    // Checked against the final result, since a replaced label may have
    // held the only reference to a record.
    let assigned: HashSet<u32> = result
        .iter()
        .flat_map(|(_, digest)| digest.emails().iter().map(|e| e.id))
        .collect();
    for record in batch.iter() {
        if !assigned.contains(&record.id) {
            debug!(id = record.id, "Email not assigned to any category");
            warnings.push(ResolutionWarning::Unassigned { id: record.id });
        }
    }

    Resolution { result, warnings }
}
