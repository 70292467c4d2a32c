//! Classify-and-reconcile pipeline.
//!
//! 1. `PromptComposer` renders the batch into a system instruction + user content
//! 2. `Categorizer` runs schema-constrained generation and validates the result
//! 3. `resolve` maps the validated categories back onto the batch
//!
//! Only step 2 touches the network. Steps 1 and 3 are pure.

pub mod categorizer;
pub mod prompt;
pub mod resolver;
pub mod schema;
pub mod service;

pub use categorizer::{Categorizer, CategorizerConfig, LlmCategorizer};
pub use prompt::{Prompt, PromptComposer};
pub use resolver::{CategorizedResult, CategoryDigest, Resolution, ResolutionWarning, resolve};
pub use schema::{CategorySummary, EmailCategories, ValidationPolicy};
pub use service::{Analysis, DigestService};
