use chrono::NaiveDate;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::llm::batcher::{BatchPlanner, ModelProfile};
use crate::llm::fact_check::FactChecker;
use crate::llm::parser::{parse_batch_response, ParseOutcome};
use crate::llm::prompts::{BatchRequest, RefinementRequest};
use crate::llm::provider::{LLMProvider, ModelTier};
use crate::llm::rate_limiter::RateLimiter;
use crate::models::{BatchResult, ContentItem};
use crate::utils::truncate_for_log;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub tier: ModelTier,
    /// Total attempts per batch, the first one included.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub truncation_length: usize,
    /// Re-judge first-pass results on the high-accuracy tier.
    pub refine: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            tier: ModelTier::Fast,
            max_retries: 3,
            initial_backoff: Duration::from_secs(60),
            truncation_length: 15_000,
            refine: false,
        }
    }
}

impl From<&Config> for GatewayConfig {
    fn from(config: &Config) -> Self {
        Self {
            tier: config.classification_tier,
            max_retries: config.max_retries,
            initial_backoff: Duration::from_secs(config.initial_backoff_seconds),
            truncation_length: config.truncation_length,
            refine: config.use_pro_for_refinement,
        }
    }
}

pub struct LlmGateway<P: LLMProvider> {
    provider: P,
    fast: RateLimiter,
    high_accuracy: RateLimiter,
    config: GatewayConfig,
    today: NaiveDate,
    fact_checker: Option<Box<dyn FactChecker>>,
}

impl<P: LLMProvider> LlmGateway<P> {
    pub fn new(provider: P, config: GatewayConfig) -> Self {
        let fast = RateLimiter::from_profile(provider.rate_limit_profile(ModelTier::Fast));
        let high_accuracy =
            RateLimiter::from_profile(provider.rate_limit_profile(ModelTier::HighAccuracy));

        Self {
            provider,
            fast,
            high_accuracy,
            config,
            today: chrono::Local::now().date_naive(),
            fact_checker: None,
        }
    }

    pub fn with_fact_checker(mut self, checker: impl FactChecker + 'static) -> Self {
        self.fact_checker = Some(Box::new(checker));
        self
    }

    /// Date the model is told is "today" when judging staleness.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn tier(&self) -> ModelTier {
        self.config.tier
    }

    /// A planner sized for the tier this gateway submits to.
    pub fn planner(&self) -> BatchPlanner {
        let limits = self.provider.rate_limit_profile(self.config.tier);
        BatchPlanner::new(ModelProfile::from_rate_limits(limits))
    }

    fn limiter(&self, tier: ModelTier) -> &RateLimiter {
        match tier {
            ModelTier::Fast => &self.fast,
            ModelTier::HighAccuracy => &self.high_accuracy,
        }
    }

    /// Classifies one batch. The returned map always holds exactly the
    /// submitted URLs; failures come back as `API Error` results.
    pub async fn submit(&self, batch: &[ContentItem]) -> HashMap<String, BatchResult> {
        if batch.is_empty() {
            return HashMap::new();
        }

        let urls: Vec<String> = batch.iter().map(|item| item.url.clone()).collect();
        let request = BatchRequest::new(batch, self.today, self.config.truncation_length);
        let prompt = request.to_prompt();

        tracing::info!(
            tier = %self.config.tier,
            model = self.provider.model_name(self.config.tier),
            items = batch.len(),
            "Submitting batch (~{} tokens)",
            request.estimate_tokens()
        );
        tracing::trace!(target: "govbrief::llm", "Prompt:\n{}", prompt);

        let response = match self.call_with_backoff(&prompt, self.config.tier).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(items = batch.len(), "Batch failed: {}", e);
                return urls
                    .iter()
                    .map(|url| (url.clone(), BatchResult::api_error(url.as_str(), &e)))
                    .collect();
            }
        };
        tracing::debug!(target: "govbrief::llm", "Raw response:\n{}", response);

        let outcome = parse_batch_response(&response, &urls);
        match &outcome {
            ParseOutcome::Complete(_) => {}
            ParseOutcome::Partial { defaulted, .. } => {
                tracing::warn!(
                    "LLM response incomplete for {} of {} URLs: {:?}",
                    defaulted.len(),
                    urls.len(),
                    defaulted
                );
            }
            ParseOutcome::Failed(reason) => {
                tracing::error!("Could not parse LLM response: {}", reason);
                tracing::warn!(
                    target: "govbrief::llm",
                    "Malformed response: {}",
                    truncate_for_log(&response, 2_000)
                );
            }
        }

        let mut results = outcome.into_results(&urls);
        if self.config.refine && self.config.tier != ModelTier::HighAccuracy {
            results = self.refine(batch, results).await;
        }

        if let Some(checker) = &self.fact_checker {
            for item in batch {
                if let Some(result) = results.get_mut(&item.url) {
                    if result.category.is_error() {
                        continue;
                    }
                    let verification = checker.verify(&item.text, &result.summary);
                    if let Some(warning) = verification.warning() {
                        tracing::warn!(url = %item.url, "Fact check failed: {:?}", verification.issues);
                        result.attach_warning(warning);
                    }
                }
            }
        }

        results
    }

    /// Reviews each first-pass result on the high-accuracy tier, one item per
    /// call under that tier's own pacing. An item keeps its first-pass result
    /// when the review fails or comes back unusable.
    pub async fn refine(
        &self,
        batch: &[ContentItem],
        mut results: HashMap<String, BatchResult>,
    ) -> HashMap<String, BatchResult> {
        let tier = ModelTier::HighAccuracy;
        tracing::info!(
            model = self.provider.model_name(tier),
            "Refining {} results",
            batch.len()
        );

        for item in batch {
            let Some(initial) = results.get(&item.url) else {
                continue;
            };
            if initial.category.is_error() {
                continue;
            }

            let prompt =
                RefinementRequest::new(item, initial, self.today, self.config.truncation_length)
                    .to_prompt();
            let url = [item.url.clone()];
            let refined = match self.call_with_backoff(&prompt, tier).await {
                Ok(response) => {
                    tracing::debug!(target: "govbrief::llm", "Refinement response:\n{}", response);
                    match parse_batch_response(&response, &url) {
                        ParseOutcome::Complete(mut refined) => refined.remove(&item.url),
                        _ => None,
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %item.url, "Refinement call failed: {}", e);
                    None
                }
            };

            match refined {
                Some(result) => {
                    if result.category != initial.category {
                        tracing::info!(
                            url = %item.url,
                            "Refined category {} -> {}",
                            initial.category,
                            result.category
                        );
                    }
                    results.insert(item.url.clone(), result);
                }
                None => tracing::warn!(url = %item.url, "Keeping first-pass result"),
            }
        }

        results
    }

    /// Waits on the tier's rate limiter before every attempt. Only quota
    /// exhaustion is retried, with delays of `initial_backoff * 2^attempt`.
    async fn call_with_backoff(&self, prompt: &str, tier: ModelTier) -> Result<String> {
        let max_attempts = self.config.max_retries.max(1);
        let mut attempt = 0u32;

        loop {
            self.limiter(tier).wait().await;

            match self.provider.submit_prompt(prompt, tier).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = self.config.initial_backoff * 2u32.pow(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay = delay.as_secs(),
                        "Quota exhausted, backing off: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
