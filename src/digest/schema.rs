//! Response schema and its domain invariants.
//!
//! The provider enforces field shapes through `response_schema()`. Everything
//! the JSON Schema can't express (category count, summary length and layout,
//! the no-numeric-id rule, table/list coverage) is checked by `validate`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use schemars::generate::SchemaSettings;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DigestError;

/// Name the schema is registered under with the provider.
pub const SCHEMA_NAME: &str = "email_categories";

/// One email category with its summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CategorySummary {
    /// Category label, a single word or short phrase
    pub category: String,
    /// Ids of the emails that belong to this category
    // Any integer is accepted; ids outside the batch are dropped on resolve.
    pub ids: Vec<i64>,
    /// Markdown summary of at least 20 lines for the emails in this category, with a title and at least 4 informative subsections
    pub summary: String,
}

/// The email categories, each with its summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EmailCategories {
    pub summaries: Vec<CategorySummary>,
}

/// JSON Schema for `EmailCategories`, in the strict subset providers accept.
pub fn response_schema() -> Value {
    let schema = SchemaSettings::draft2020_12()
        .with(|s| s.inline_subschemas = true)
        .into_generator()
        .into_root_schema_for::<EmailCategories>();
    let mut value = schema.to_value();
    make_strict(&mut value);
    value
}

/// Strict mode wants every property required, no extra properties, and no
/// annotation keywords outside its supported subset.
fn make_strict(schema: &mut Value) {
    let Some(obj) = schema.as_object_mut() else {
        return;
    };
    for keyword in ["$schema", "title", "format"] {
        obj.remove(keyword);
    }

    let required = match obj.get_mut("properties") {
        Some(Value::Object(properties)) => {
            properties.values_mut().for_each(make_strict);
            Some(properties.keys().cloned().map(Value::String).collect::<Vec<_>>())
        }
        _ => None,
    };
    if let Some(required) = required {
        obj.insert("required".to_string(), Value::Array(required));
        obj.insert("additionalProperties".to_string(), Value::Bool(false));
    }

    if let Some(items) = obj.get_mut("items") {
        make_strict(items);
    }
}

// ── Validation ──────────────────────────────────────────────────────

/// Thresholds for the domain invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationPolicy {
    pub min_categories: usize,
    pub max_categories: usize,
    /// Minimum non-blank lines per summary.
    pub min_summary_lines: usize,
    /// Minimum headings after the title.
    pub min_subsections: usize,
    /// Fraction of categories that must carry a table or bullet list.
    pub structured_ratio: f64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_categories: 3,
            max_categories: 6,
            min_summary_lines: 20,
            min_subsections: 4,
            structured_ratio: 0.5,
        }
    }
}

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+\S").expect("valid regex"));
static BOLD_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*\*[^*]+\*\*:?$").expect("valid regex"));
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*+]\s+\S").expect("valid regex"));
static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[.)]\s+\S").expect("valid regex"));
static TABLE_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\|.*\|$").expect("valid regex"));
static ID_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?P<email>emails?|correos?)\s+(?:ids?\s*[:#=]?\s*)?#?|ids?\s*[:#=]?\s*)(?P<num>\d+)\b",
    )
    .expect("valid regex")
});

/// A numeric id mention found in a summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdReference {
    pub text: String,
    /// `None` when the number doesn't fit a batch id.
    pub id: Option<u32>,
    /// Tied to the word "email" ("email 7", "email id 4"), not a bare "id 3".
    pub names_email: bool,
}

impl IdReference {
    /// Whether this mention points at an email of the batch.
    ///
    /// A bare "ID 88231" is only flagged when 88231 is one of the batch ids,
    /// so ticket and order numbers pass.
    pub fn refers_to_batch(&self, batch_ids: &HashSet<u32>) -> bool {
        self.names_email || self.id.is_some_and(|id| batch_ids.contains(&id))
    }
}

/// Structural features of one markdown summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryProfile {
    pub lines: usize,
    pub has_title: bool,
    pub subsections: usize,
    pub has_bullet_list: bool,
    pub has_numbered_list: bool,
    pub has_table: bool,
    pub has_fence: bool,
    pub has_emoji: bool,
    /// Fragments that look like numeric id references.
    pub id_references: Vec<IdReference>,
}

impl SummaryProfile {
    pub fn analyze(summary: &str) -> Self {
        let mut profile = Self::default();
        let mut headings = 0usize;
        let mut in_fence = false;

        for line in summary.lines().map(str::trim).filter(|l| !l.is_empty()) {
            profile.lines += 1;

            if line.starts_with("```") || line.starts_with("~~~") {
                profile.has_fence = true;
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }

            if HEADING.is_match(line) || BOLD_LINE.is_match(line) {
                headings += 1;
            } else if BULLET.is_match(line) {
                profile.has_bullet_list = true;
            } else if NUMBERED.is_match(line) {
                profile.has_numbered_list = true;
            } else if TABLE_ROW.is_match(line) {
                profile.has_table = true;
            }
        }

        profile.has_title = headings > 0;
        profile.subsections = headings.saturating_sub(1);
        profile.has_emoji = summary.chars().any(is_emoji);
        profile.id_references = ID_REFERENCE
            .captures_iter(summary)
            .map(|caps| IdReference {
                text: caps[0].to_string(),
                id: caps["num"].parse().ok(),
                names_email: caps.name("email").is_some(),
            })
            .collect();
        profile
    }

    /// At least one of: a list, an emoji, a fenced block.
    pub fn has_visual_marker(&self) -> bool {
        self.has_bullet_list || self.has_numbered_list || self.has_emoji || self.has_fence
    }

    /// Carries a table or a bullet list.
    pub fn is_structured(&self) -> bool {
        self.has_table || self.has_bullet_list
    }
}

fn is_emoji(c: char) -> bool {
    matches!(
        u32::from(c),
        0x1F300..=0x1FAFF | 0x2600..=0x27BF | 0x1F000..=0x1F2FF | 0x2B50 | 0x2B55
    )
}

/// Check the invariants not expressible in the JSON Schema.
///
/// Collects every violation instead of stopping at the first. `batch_ids`
/// are the ids the summaries must not mention.
pub fn validate(
    categories: &EmailCategories,
    policy: &ValidationPolicy,
    batch_ids: &HashSet<u32>,
) -> Result<(), DigestError> {
    let mut violations = Vec::new();
    let count = categories.summaries.len();

    if count < policy.min_categories || count > policy.max_categories {
        violations.push(format!(
            "expected {}-{} categories, got {count}",
            policy.min_categories, policy.max_categories
        ));
    }

    let mut structured = 0usize;
    for (index, entry) in categories.summaries.iter().enumerate() {
        let label = entry.category.trim();
        let name = if label.is_empty() {
            violations.push(format!("category #{} has an empty label", index + 1));
            format!("#{}", index + 1)
        } else {
            format!("'{label}'")
        };

        let profile = SummaryProfile::analyze(&entry.summary);
        if profile.is_structured() {
            structured += 1;
        }

        if profile.lines < policy.min_summary_lines {
            violations.push(format!(
                "category {name}: summary has {} lines, expected at least {}",
                profile.lines, policy.min_summary_lines
            ));
        }
        if !profile.has_title {
            violations.push(format!("category {name}: summary has no title"));
        }
        if profile.subsections < policy.min_subsections {
            violations.push(format!(
                "category {name}: summary has {} subsections, expected at least {}",
                profile.subsections, policy.min_subsections
            ));
        }
        if !profile.has_visual_marker() {
            violations.push(format!(
                "category {name}: summary needs a list, an emoji or a fenced note"
            ));
        }
        if let Some(reference) = profile
            .id_references
            .iter()
            .find(|r| r.refers_to_batch(batch_ids))
        {
            violations.push(format!(
                "category {name}: summary refers to an email by id ('{}')",
                reference.text
            ));
        }
    }

    if count > 0 && (structured as f64) < policy.structured_ratio * count as f64 {
        violations.push(format!(
            "only {structured} of {count} categories include a table or bullet list"
        ));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(DigestError::SchemaViolation { violations })
    }
}
