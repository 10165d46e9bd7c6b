use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink {
    pub id: String,
    pub href_raw: String,
    pub text_raw: String,
    pub section_hint: String,
    pub order_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedLink {
    pub id: String,
    pub href_raw: String,
    pub href_norm: Option<String>,
    pub text_norm: String,
    pub valid_url: bool,
    pub invalid_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub href_norm: String,
    pub duplicate_ids: Vec<String>,
    pub canonical_id: String,
    pub duplicate_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Added,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizedLink {
    pub id: String,
    pub href_norm: Option<String>,
    pub text_final: String,
    pub category: Option<String>,
    pub action: Action,
    pub reason: String,
}

impl CategorizedLink {
    pub fn reason_kind(&self) -> &str {
        reason_kind(&self.reason)
    }
}

pub fn reason_kind(reason: &str) -> &str {
    reason.split(':').next().unwrap_or(reason)
}

#[derive(Debug, Clone)]
pub struct NormalizeSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub unique_urls: usize,
    pub duplicate_urls: usize,
    pub duplicate_links: usize,
}

#[derive(Debug, Clone)]
pub struct CategorizeSummary {
    pub total_processed: usize,
    pub total_added: usize,
    pub total_skipped: usize,
    pub category_counts: Vec<(String, usize)>,
    pub skip_counts: Vec<(String, usize)>,
}

#[derive(Debug, Clone)]
pub struct SnippetSummary {
    pub categories_with_links: usize,
    pub total_links: usize,
    pub missing_categories: Vec<String>,
}
