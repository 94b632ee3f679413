use chrono::{Duration, NaiveDate};

use crate::models::{ContentItem, FetchedContent, IsNew};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecencyRules {
    pub threshold_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recency {
    pub is_new: IsNew,
    pub page_date: Option<NaiveDate>,
    pub hint: Option<String>,
}

impl RecencyRules {
    pub fn new(threshold_days: i64) -> Self {
        Self { threshold_days }
    }

    /// Meeting dates win over publication dates: an event from yesterday on
    /// is new, an older one is left for the model to sort out.
    pub fn classify(&self, content: &FetchedContent, today: NaiveDate) -> Recency {
        if let Some(meeting) = content.meeting_at {
            if meeting >= today - Duration::days(1) {
                return Recency {
                    is_new: IsNew::Yes,
                    page_date: Some(meeting),
                    hint: Some(format!("upcoming meeting on {}", meeting)),
                };
            }
            return Recency {
                is_new: IsNew::Maybe,
                page_date: Some(meeting),
                hint: Some(format!(
                    "meeting held on {}; may be meeting materials",
                    meeting
                )),
            };
        }

        match content.published_at {
            Some(published) => {
                let is_new = if today - published <= Duration::days(self.threshold_days) {
                    IsNew::Yes
                } else {
                    IsNew::No
                };
                Recency {
                    is_new,
                    page_date: Some(published),
                    hint: None,
                }
            }
            // A document without a landing-page date cannot be placed in time
            None if content.is_document() => Recency {
                is_new: IsNew::No,
                page_date: None,
                hint: None,
            },
            None => Recency {
                is_new: IsNew::Maybe,
                page_date: None,
                hint: None,
            },
        }
    }
}

impl Recency {
    /// Builds the LLM work item, or `None` when the content is old or has no
    /// usable text.
    pub fn content_item(&self, url: &str, content: &FetchedContent) -> Option<ContentItem> {
        if !self.is_new.is_candidate() {
            return None;
        }
        let mut item = ContentItem::new(url, content.usable_text()?);
        if self.is_new == IsNew::Maybe {
            item = item.uncertain();
        }
        if let Some(hint) = &self.hint {
            item = item.with_hint(hint.clone());
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn page(published_at: Option<NaiveDate>, meeting_at: Option<NaiveDate>) -> FetchedContent {
        FetchedContent {
            text: Some("text".to_string()),
            filetype: "HTML".to_string(),
            published_at,
            meeting_at,
        }
    }

    #[test]
    fn test_publication_threshold() {
        let rules = RecencyRules::new(7);
        let today = date(2025, 10, 11);

        assert_eq!(rules.classify(&page(Some(date(2025, 10, 4)), None), today).is_new, IsNew::Yes);
        assert_eq!(rules.classify(&page(Some(date(2025, 10, 3)), None), today).is_new, IsNew::No);
        assert_eq!(rules.classify(&page(Some(date(2025, 10, 20)), None), today).is_new, IsNew::Yes);
    }

    #[test]
    fn test_missing_date_depends_on_kind() {
        let rules = RecencyRules::new(7);
        let today = date(2025, 10, 11);

        assert_eq!(rules.classify(&page(None, None), today).is_new, IsNew::Maybe);

        let mut document = page(None, None);
        document.filetype = "PDF".to_string();
        assert_eq!(rules.classify(&document, today).is_new, IsNew::No);
    }

    #[test]
    fn test_meeting_dates() {
        let rules = RecencyRules::new(7);
        let today = date(2025, 10, 11);
        // Publication date is recent, but the meeting decides
        let published = Some(date(2025, 10, 10));

        let upcoming = rules.classify(&page(published, Some(date(2025, 10, 20))), today);
        assert_eq!(upcoming.is_new, IsNew::Yes);
        assert_eq!(upcoming.page_date, Some(date(2025, 10, 20)));

        let yesterday = rules.classify(&page(published, Some(date(2025, 10, 10))), today);
        assert_eq!(yesterday.is_new, IsNew::Yes);

        let past = rules.classify(&page(published, Some(date(2025, 9, 1))), today);
        assert_eq!(past.is_new, IsNew::Maybe);
        assert!(past.hint.unwrap().contains("meeting materials"));
    }

    #[test]
    fn test_content_item_only_for_candidates_with_text() {
        let rules = RecencyRules::new(7);
        let today = date(2025, 10, 11);

        let maybe = page(None, None);
        let item = rules.classify(&maybe, today).content_item("u", &maybe).unwrap();
        assert!(item.is_uncertain_date);

        let old = page(Some(date(2024, 1, 1)), None);
        assert!(rules.classify(&old, today).content_item("u", &old).is_none());

        let mut blank = page(Some(date(2025, 10, 10)), None);
        blank.text = Some("   ".to_string());
        assert!(rules.classify(&blank, today).content_item("u", &blank).is_none());
    }
}
