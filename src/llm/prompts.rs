use chrono::NaiveDate;

use crate::models::{BatchResult, Category, ContentItem};

pub const DOCUMENT_HEADER_PREFIX: &str = "--- DOCUMENT URL: ";

const TRUNCATION_NOTE: &str = "[NOTE TO EDITOR: The following document was excerpted due to extreme length. \
The full text may warrant further review.]";

pub const SYSTEM_PROMPT: &str = r#"You are an automated content classifier and summarizer for a news organization covering state government websites.
You will be given a series of documents, each introduced by a header line of the form "--- DOCUMENT URL: <url> ---".
Process ALL documents provided and return a single, valid JSON array as your response.
Do not include any text, pleasantries, or markdown formatting before or after the JSON array.

For each document:
1. Classify it into exactly one category from the allowed list.
2. Write a concise, neutral, journalistic summary of one to three sentences based only on the text provided for that document.
3. Briefly justify the classification.

CRITICAL: Before categorizing, check whether the content refers to information more than TWO MONTHS older than today's date.
If it is clearly outdated, use the category "Outdated Content".
Documents marked with a TYPE HINT have an unconfirmed or past date; use the text to decide whether they are new announcements,
materials from a meeting that already happened ("Meeting Materials"), or notices of an upcoming meeting ("Meeting Announcement").

Each object in the JSON array MUST have this shape:
{
    "url": "the exact URL from the document header",
    "category": "one of the allowed categories",
    "summary": "your summary",
    "justification": "brief reason for the classification"
}"#;

#[derive(Debug, Clone)]
pub struct BatchRequest<'a> {
    pub items: &'a [ContentItem],
    pub today: NaiveDate,
    pub truncation_length: usize,
}

impl<'a> BatchRequest<'a> {
    pub fn new(items: &'a [ContentItem], today: NaiveDate, truncation_length: usize) -> Self {
        Self {
            items,
            today,
            truncation_length,
        }
    }

    pub fn to_prompt(&self) -> String {
        let categories = Category::CLASSIFICATIONS
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let mut prompt = format!(
            "{}\n\nToday's date is {}.\nAllowed categories: {}.\n\n--- START OF DOCUMENTS ---\n\n",
            SYSTEM_PROMPT,
            self.today.format("%Y-%m-%d"),
            categories
        );

        for item in self.items {
            prompt.push_str(&format!("{}{} ---\n", DOCUMENT_HEADER_PREFIX, item.url));
            if item.is_uncertain_date {
                prompt.push_str("TYPE HINT: publication date unconfirmed or in the past\n");
            }
            if let Some(hint) = &item.source_category_hint {
                prompt.push_str(&format!("TYPE HINT: {}\n", hint));
            }
            prompt.push_str(&excerpt(&item.text, self.truncation_length));
            prompt.push_str("\n\n");
        }

        prompt.push_str("--- END OF DOCUMENTS ---\n");
        prompt
    }

    pub fn estimate_tokens(&self) -> usize {
        let char_count: usize = self
            .items
            .iter()
            .map(|i| i.url.len() + i.char_len().min(self.truncation_length))
            .sum();
        // Rough estimate: ~4 characters per token
        (SYSTEM_PROMPT.len() + char_count) / 4
    }
}

fn excerpt(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let kept: String = text.chars().take(limit).collect();
    format!("{}\n\n{}...", TRUNCATION_NOTE, kept)
}

pub const REFINEMENT_PROMPT: &str = r#"You are a senior editor reviewing an automatically generated classification and summary.
Check the first-pass result against the document below and correct the category or summary where they are wrong.
Apply the same rule as the first pass: content that refers to information more than TWO MONTHS older than today's date is "Outdated Content".
Return a JSON array holding exactly one object with the keys "url", "category", "summary" and "justification"."#;

/// Second-pass review of one first-pass result on the high-accuracy tier.
#[derive(Debug, Clone)]
pub struct RefinementRequest<'a> {
    pub item: &'a ContentItem,
    pub initial: &'a BatchResult,
    pub today: NaiveDate,
    pub truncation_length: usize,
}

impl<'a> RefinementRequest<'a> {
    pub fn new(
        item: &'a ContentItem,
        initial: &'a BatchResult,
        today: NaiveDate,
        truncation_length: usize,
    ) -> Self {
        Self {
            item,
            initial,
            today,
            truncation_length,
        }
    }

    pub fn to_prompt(&self) -> String {
        let categories = Category::CLASSIFICATIONS
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "{}\n\nToday's date is {}.\nAllowed categories: {}.\n\n\
             Original classification: {}\nOriginal summary: {}\n\n\
             {}{} ---\n{}\n",
            REFINEMENT_PROMPT,
            self.today.format("%Y-%m-%d"),
            categories,
            self.initial.category,
            self.initial.summary,
            DOCUMENT_HEADER_PREFIX,
            self.item.url,
            excerpt(&self.item.text, self.truncation_length)
        )
    }
}
