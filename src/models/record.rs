use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::result::{BatchResult, Category};
use crate::storage::content_hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsNew {
    Yes,
    No,
    Maybe,
}

impl IsNew {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsNew::Yes => "yes",
            IsNew::No => "no",
            IsNew::Maybe => "maybe",
        }
    }

    /// New or possibly new content is what gets sent to the LLM.
    pub fn is_candidate(&self) -> bool {
        matches!(self, IsNew::Yes | IsNew::Maybe)
    }
}

impl From<&str> for IsNew {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "yes" => IsNew::Yes,
            "maybe" => IsNew::Maybe,
            _ => IsNew::No,
        }
    }
}

impl std::fmt::Display for IsNew {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub url: String,
    pub lastmodified: Option<String>,
    pub filetype: Option<String>,
    pub page_date: Option<NaiveDate>,
    pub is_new: IsNew,
    pub category: Option<Category>,
    pub summary: Option<String>,
    pub extracted_text: Option<String>,
    pub content_hash: Option<String>,
    pub excluded: bool,
}

impl PersistedRecord {
    pub fn new(url: impl Into<String>, lastmodified: Option<String>) -> Self {
        Self {
            url: url.into(),
            lastmodified,
            filetype: None,
            page_date: None,
            is_new: IsNew::No,
            category: None,
            summary: None,
            extracted_text: None,
            content_hash: None,
            excluded: false,
        }
    }

    /// The hash always follows the text; there is no other way to set it.
    pub fn set_extracted_text(&mut self, text: Option<String>) {
        self.content_hash = text.as_deref().map(content_hash);
        self.extracted_text = text;
    }

    /// Merges an LLM result. Outdated content flips `excluded` on, never off.
    pub fn apply_result(&mut self, result: &BatchResult) {
        self.category = Some(result.category.clone());
        self.summary = Some(result.summary.clone());
        if result.category.is_outdated() {
            self.excluded = true;
        }
    }

    /// True when the stored text no longer hashes to the stored hash, meaning
    /// the text changed without going through `set_extracted_text`.
    pub fn has_drifted(&self) -> bool {
        match (&self.content_hash, &self.extracted_text) {
            (Some(hash), Some(text)) => *hash != content_hash(text),
            _ => false,
        }
    }

    pub fn needs_llm_retry(&self) -> bool {
        let has_text = self
            .extracted_text
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false);
        let failed = self.summary.is_none()
            || self.category.as_ref().map(Category::is_error).unwrap_or(true);
        has_text && failed && !self.excluded && self.is_new.is_candidate()
    }
}

/// The only ways a stored record may change after insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordUpdate {
    /// Scraping retry: refreshes content fields, recomputes the hash.
    Rescraped {
        extracted_text: Option<String>,
        filetype: Option<String>,
        page_date: Option<NaiveDate>,
        is_new: IsNew,
    },
    /// LLM retry: refreshes classification only.
    Classified { category: Category, summary: String },
    /// Re-aligns the hash with text that drifted in storage.
    Rehashed { content_hash: String },
    Excluded,
}

impl RecordUpdate {
    pub fn classified(result: &BatchResult) -> Self {
        RecordUpdate::Classified {
            category: result.category.clone(),
            summary: result.summary.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFilter {
    /// `is_new` in {yes, maybe} and not excluded.
    ReportEligible,
    /// No extracted text yet, not excluded, and not a binary document.
    NeedsScrapeRetry,
    /// Has text, but no summary or an error category.
    NeedsLlmRetry,
    All,
}
