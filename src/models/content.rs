use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the daily URL feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub url: String,
    pub lastmodified: Option<String>,
}

impl FeedEntry {
    pub fn new(url: impl Into<String>, lastmodified: Option<String>) -> Self {
        Self {
            url: url.into(),
            lastmodified,
        }
    }
}

/// What a content source hands back for a single URL. `text: None` means the
/// item is recorded but never sent to the LLM.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedContent {
    pub text: Option<String>,
    pub filetype: String,
    pub published_at: Option<NaiveDate>,
    pub meeting_at: Option<NaiveDate>,
}

impl FetchedContent {
    pub fn is_document(&self) -> bool {
        !self.filetype.eq_ignore_ascii_case("HTML")
    }

    /// Text that is worth an LLM call: present and not just whitespace.
    pub fn usable_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub url: String,
    pub text: String,
    pub is_uncertain_date: bool,
    pub source_category_hint: Option<String>,
}

impl ContentItem {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
            is_uncertain_date: false,
            source_category_hint: None,
        }
    }

    pub fn uncertain(mut self) -> Self {
        self.is_uncertain_date = true;
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.source_category_hint = Some(hint.into());
        self
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
