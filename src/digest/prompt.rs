//! Prompt composition. Pure: no I/O, same batch in, same prompt out.

use serde_json::{Value, json};

use super::schema::ValidationPolicy;
use crate::mail::Batch;

/// A composed request: fixed policy instruction plus the serialized batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Builds prompts whose stated rules match the thresholds the validator enforces.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    policy: ValidationPolicy,
    language: String,
}

impl PromptComposer {
    pub fn new(policy: ValidationPolicy, language: impl Into<String>) -> Self {
        Self {
            policy,
            language: language.into(),
        }
    }

    pub fn compose(&self, batch: &Batch) -> Prompt {
        Prompt {
            system: self.system_instruction(),
            user: render_batch(batch),
        }
    }

    /// The categorization and style policy.
    pub fn system_instruction(&self) -> String {
        let p = &self.policy;
        format!(
            "You are an assistant that sorts a batch of emails into thematic categories \
             and writes a weekly digest for each category.\n\n\
             Categories:\n\
             - Produce between {min_cat} and {max_cat} relevant categories.\n\
             - Each category label is a single word or a short phrase.\n\
             - List in `ids` the id of every email that belongs to the category.\n\n\
             Summaries (markdown):\n\
             - Explain the main points of each email in a rich, long and visual way.\n\
             - Each summary must be at least {min_lines} lines long.\n\
             - Each summary has a title and at least {min_sub} informative subsections.\n\
             - Use lists, emoji, bold text and headings so the summary is easy to scan.\n\
             - MANDATORY: every summary contains at least one of: a list, emoji, or a \
               ``` fenced box for notes.\n\
             - MANDATORY: at least half of all categories include a table or a bullet list.\n\
             - Highlight any highly relevant topic and say which email it appears in, \
               with a visible marker such as **⚠️ Important**, so the reader can open it.\n\
             - Never mention email ids in the summary text. Refer to emails by position \
               instead: the first email, the seventh email, the last email.\n\n\
             Write every label and summary in {language}.",
            min_cat = p.min_categories,
            max_cat = p.max_categories,
            min_lines = p.min_summary_lines,
            min_sub = p.min_subsections,
            language = self.language,
        )
    }
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new(ValidationPolicy::default(), "English")
    }
}

/// JSON array of `{id, subject, body}` in batch order.
fn render_batch(batch: &Batch) -> String {
    let records: Vec<Value> = batch
        .iter()
        .map(|r| json!({"id": r.id, "subject": r.subject, "body": r.body}))
        .collect();
    Value::Array(records).to_string()
}
