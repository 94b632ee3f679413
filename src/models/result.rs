use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    NewAnnouncement,
    PressRelease,
    MeetingAnnouncement,
    MeetingMaterials,
    NewDocument,
    RecentUpdate,
    TimelessInfo,
    OutdatedContent,
    ApiError,
    ParseError,
    Other(String),
}

impl Category {
    /// Labels the model is allowed to choose from.
    pub const CLASSIFICATIONS: [Category; 8] = [
        Category::NewAnnouncement,
        Category::PressRelease,
        Category::MeetingAnnouncement,
        Category::MeetingMaterials,
        Category::NewDocument,
        Category::RecentUpdate,
        Category::TimelessInfo,
        Category::OutdatedContent,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Category::NewAnnouncement => "New Announcement",
            Category::PressRelease => "Press Release",
            Category::MeetingAnnouncement => "Meeting Announcement",
            Category::MeetingMaterials => "Meeting Materials",
            Category::NewDocument => "New Document",
            Category::RecentUpdate => "Recent Update",
            Category::TimelessInfo => "Timeless Info",
            Category::OutdatedContent => "Outdated Content",
            Category::ApiError => "API Error",
            Category::ParseError => "Parse Error",
            Category::Other(label) => label,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Category::ApiError | Category::ParseError)
    }

    pub fn is_outdated(&self) -> bool {
        matches!(self, Category::OutdatedContent)
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "new announcement" => Category::NewAnnouncement,
            "press release" => Category::PressRelease,
            "meeting announcement" => Category::MeetingAnnouncement,
            "meeting materials" => Category::MeetingMaterials,
            "new document" => Category::NewDocument,
            "recent update" => Category::RecentUpdate,
            "timeless info" => Category::TimelessInfo,
            "outdated content" => Category::OutdatedContent,
            "api error" => Category::ApiError,
            "parse error" | "parsing error" => Category::ParseError,
            _ => Category::Other(s.trim().to_string()),
        }
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Category::from(s.as_str())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub url: String,
    pub category: Category,
    pub summary: String,
    pub justification: Option<String>,
    pub accuracy_warning: Option<String>,
}

impl BatchResult {
    pub fn new(url: impl Into<String>, category: Category, summary: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            category,
            summary: summary.into(),
            justification: None,
            accuracy_warning: None,
        }
    }

    pub fn api_error(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::new(url, Category::ApiError, format!("API Error: {}", reason))
    }

    pub fn omitted(url: impl Into<String>) -> Self {
        Self::new(
            url,
            Category::ApiError,
            "LLM did not return an entry for this URL.",
        )
    }

    /// Keeps the summary but appends the warning so it travels with the text.
    pub fn attach_warning(&mut self, warning: String) {
        self.summary.push_str(&warning);
        self.accuracy_warning = Some(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_labels_round_trip_through_strings() {
        for category in Category::CLASSIFICATIONS.iter() {
            assert_eq!(&Category::from(category.as_str()), category);
        }
        assert_eq!(Category::from("api error"), Category::ApiError);
        assert_eq!(Category::from("Parsing Error"), Category::ParseError);
    }

    #[test]
    fn test_unknown_category_is_preserved() {
        let category = Category::from("Job Posting");
        assert_eq!(category, Category::Other("Job Posting".to_string()));
        assert_eq!(category.to_string(), "Job Posting");
        assert!(!category.is_error());
    }

    #[test]
    fn test_batch_result_deserializes_category_label() {
        let result: BatchResult = serde_json::from_str(
            r#"{"url":"A","category":"Outdated Content","summary":"s","justification":null,"accuracy_warning":null}"#,
        )
        .unwrap();
        assert!(result.category.is_outdated());
    }

    #[test]
    fn test_attach_warning_appends_to_summary() {
        let mut result = BatchResult::new("A", Category::PressRelease, "Grant of $5 million.");
        result.attach_warning("\n[FACT CHECK WARNING]".to_string());
        assert_eq!(result.summary, "Grant of $5 million.\n[FACT CHECK WARNING]");
        assert_eq!(result.accuracy_warning.as_deref(), Some("\n[FACT CHECK WARNING]"));
    }
}
