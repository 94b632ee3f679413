use async_trait::async_trait;
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::llm::gemini::GeminiProvider;

/// Two independently paced model tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelTier {
    /// High-throughput model used for bulk classification.
    Fast,
    /// Low-RPM model reserved for work that needs higher accuracy.
    HighAccuracy,
}

impl FromStr for ModelTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fast" | "flash" => Ok(ModelTier::Fast),
            "pro" | "high-accuracy" | "high_accuracy" => Ok(ModelTier::HighAccuracy),
            other => Err(Error::Config(format!("Unknown model tier: {}", other))),
        }
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelTier::Fast => write!(f, "fast"),
            ModelTier::HighAccuracy => write!(f, "high-accuracy"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitProfile {
    pub requests_per_minute: u32,
    pub tokens_per_minute: u32,
}

impl RateLimitProfile {
    pub fn new(requests_per_minute: u32, tokens_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            tokens_per_minute,
        }
    }

    /// Minimum spacing between two calls: `60 / RPM` seconds.
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.requests_per_minute.max(1) as f64)
    }
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Sends one prompt and returns the raw response text. Quota exhaustion
    /// must surface as `Error::QuotaExhausted` so callers can back off.
    async fn submit_prompt(&self, prompt: &str, tier: ModelTier) -> Result<String>;
    fn rate_limit_profile(&self, tier: ModelTier) -> RateLimitProfile;
    fn model_name(&self, tier: ModelTier) -> &str;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            other => Err(Error::Config(format!(
                "Unsupported provider: {}. Supported: gemini",
                other
            ))),
        }
    }
}

pub fn build_provider(config: &Config) -> Result<GeminiProvider> {
    match config.provider {
        ProviderKind::Gemini => GeminiProvider::from_config(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_interval_from_rpm() {
        assert_eq!(RateLimitProfile::new(15, 1_000_000).min_interval(), Duration::from_secs(4));
        assert_eq!(RateLimitProfile::new(2, 125_000).min_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_tier_and_provider() {
        assert_eq!("flash".parse::<ModelTier>().unwrap(), ModelTier::Fast);
        assert_eq!("PRO".parse::<ModelTier>().unwrap(), ModelTier::HighAccuracy);
        assert!("medium".parse::<ModelTier>().is_err());
        assert_eq!("Gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert!(matches!("openrouter".parse::<ProviderKind>(), Err(Error::Config(_))));
    }
}
