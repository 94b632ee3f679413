use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::llm::provider::{LLMProvider, ModelTier, RateLimitProfile};
use crate::models::FetchedContent;
use crate::source::ContentSource;

/// Replays queued responses in order and records every prompt it sees.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<Vec<(ModelTier, String)>>,
    fast_limits: RateLimitProfile,
    high_accuracy_limits: RateLimitProfile,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
            fast_limits: RateLimitProfile::new(6_000, 10_000_000),
            high_accuracy_limits: RateLimitProfile::new(6_000, 10_000_000),
        }
    }

    /// Same limits for both tiers.
    pub fn with_limits(self, limits: RateLimitProfile) -> Self {
        self.with_tier_limits(ModelTier::Fast, limits)
            .with_tier_limits(ModelTier::HighAccuracy, limits)
    }

    pub fn with_tier_limits(mut self, tier: ModelTier, limits: RateLimitProfile) -> Self {
        match tier {
            ModelTier::Fast => self.fast_limits = limits,
            ModelTier::HighAccuracy => self.high_accuracy_limits = limits,
        }
        self
    }

    pub fn push(&self, response: Result<String>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> Vec<(ModelTier, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn submit_prompt(&self, prompt: &str, tier: ModelTier) -> Result<String> {
        self.calls.lock().unwrap().push((tier, prompt.to_string()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::LLMApi("no scripted response left".to_string())))
    }

    fn rate_limit_profile(&self, tier: ModelTier) -> RateLimitProfile {
        match tier {
            ModelTier::Fast => self.fast_limits,
            ModelTier::HighAccuracy => self.high_accuracy_limits,
        }
    }

    fn model_name(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => "scripted-fast",
            ModelTier::HighAccuracy => "scripted-pro",
        }
    }

    fn name(&self) -> &str {
        "Scripted"
    }
}

/// Echoes a well-formed classification for every URL found in the prompt.
pub fn echo_response(prompt: &str, category: &str) -> String {
    let entries: Vec<serde_json::Value> = urls_in_prompt(prompt)
        .into_iter()
        .map(|url| {
            serde_json::json!({
                "url": url,
                "category": category,
                "summary": format!("Summary of {}", url),
            })
        })
        .collect();
    serde_json::Value::Array(entries).to_string()
}

pub fn urls_in_prompt(prompt: &str) -> Vec<String> {
    prompt
        .lines()
        .filter_map(|line| line.strip_prefix(crate::llm::prompts::DOCUMENT_HEADER_PREFIX))
        .map(|rest| rest.trim_end_matches(" ---").to_string())
        .collect()
}

/// Classifies every submitted URL with a fixed category, whatever the batch.
pub struct EchoProvider {
    category: String,
    calls: Mutex<usize>,
}

impl EchoProvider {
    pub fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl LLMProvider for EchoProvider {
    async fn submit_prompt(&self, prompt: &str, _tier: ModelTier) -> Result<String> {
        *self.calls.lock().unwrap() += 1;
        Ok(echo_response(prompt, &self.category))
    }

    fn rate_limit_profile(&self, _tier: ModelTier) -> RateLimitProfile {
        RateLimitProfile::new(6_000, 10_000_000)
    }

    fn model_name(&self, _tier: ModelTier) -> &str {
        "echo"
    }

    fn name(&self) -> &str {
        "Echo"
    }
}

pub enum MockPage {
    Content(FetchedContent),
    Forbidden,
    Fail,
}

#[derive(Default)]
pub struct MockContentSource {
    pages: Mutex<HashMap<String, MockPage>>,
    fetched: Mutex<Vec<String>>,
}

impl MockContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, content: FetchedContent) -> Self {
        self.set(url, MockPage::Content(content));
        self
    }

    pub fn forbidden(self, url: &str) -> Self {
        self.set(url, MockPage::Forbidden);
        self
    }

    pub fn failing(self, url: &str) -> Self {
        self.set(url, MockPage::Fail);
        self
    }

    pub fn set(&self, url: &str, page: MockPage) {
        self.pages.lock().unwrap().insert(url.to_string(), page);
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentSource for MockContentSource {
    async fn fetch(&self, url: &str) -> Result<FetchedContent> {
        self.fetched.lock().unwrap().push(url.to_string());
        match self.pages.lock().unwrap().get(url) {
            Some(MockPage::Content(content)) => Ok(content.clone()),
            Some(MockPage::Forbidden) => Err(Error::Forbidden(url.to_string())),
            Some(MockPage::Fail) | None => Err(Error::SourceFetch {
                url: url.to_string(),
                reason: "connection reset".to_string(),
            }),
        }
    }
}

pub fn html_page(text: &str, published_at: Option<chrono::NaiveDate>) -> FetchedContent {
    FetchedContent {
        text: Some(text.to_string()),
        filetype: "HTML".to_string(),
        published_at,
        meeting_at: None,
    }
}
