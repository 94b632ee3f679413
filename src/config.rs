use crate::error::{Error, Result};
use crate::llm::{ModelTier, ProviderKind};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub provider: ProviderKind,
    pub database_path: String,
    pub table_prefix: String,
    pub feed_url_format: Option<String>,
    pub classification_tier: ModelTier,
    pub use_pro_for_refinement: bool,
    pub flash_model: String,
    pub pro_model: String,
    pub flash_model_rpm: u32,
    pub flash_model_tpm: u32,
    pub pro_model_rpm: u32,
    pub pro_model_tpm: u32,
    pub truncation_length: usize,
    pub max_retries: u32,
    pub initial_backoff_seconds: u64,
    pub recency_threshold_days: i64,
    pub scrape_min_delay_seconds: f64,
    pub scrape_max_delay_seconds: f64,
    pub retry_log_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            provider: ProviderKind::Gemini,
            database_path: "govbrief.db".to_string(),
            table_prefix: "govfeed".to_string(),
            feed_url_format: None,
            classification_tier: ModelTier::Fast,
            use_pro_for_refinement: false,
            flash_model: "gemini-2.0-flash".to_string(),
            pro_model: "gemini-2.5-pro".to_string(),
            flash_model_rpm: 15,
            flash_model_tpm: 1_000_000,
            pro_model_rpm: 2,
            pro_model_tpm: 125_000,
            truncation_length: 15_000,
            max_retries: 3,
            initial_backoff_seconds: 60,
            recency_threshold_days: 7,
            scrape_min_delay_seconds: 1.0,
            scrape_max_delay_seconds: 3.0,
            retry_log_path: "retry_urls.log".to_string(),
        }
    }
}

fn parsed<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", name, value))),
        _ => Ok(default),
    }
}

fn string_or(name: &str, default: String) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

impl Config {
    /// Reads every setting from the environment. The API key is checked
    /// when the provider is built, so listing stored records works without it.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let config = Self {
            gemini_api_key: env::var("GEMINI_API_KEY").ok(),
            provider: parsed("LLM_PROVIDER", defaults.provider)?,
            database_path: string_or("DATABASE_PATH", defaults.database_path),
            table_prefix: string_or("TABLE_PREFIX", defaults.table_prefix),
            feed_url_format: env::var("FEED_URL_FORMAT").ok().filter(|v| !v.trim().is_empty()),
            classification_tier: parsed("LLM_TIER", defaults.classification_tier)?,
            use_pro_for_refinement: parsed(
                "USE_PRO_FOR_REFINEMENT",
                defaults.use_pro_for_refinement,
            )?,
            flash_model: string_or("FLASH_MODEL", defaults.flash_model),
            pro_model: string_or("PRO_MODEL", defaults.pro_model),
            flash_model_rpm: parsed("FLASH_MODEL_RPM", defaults.flash_model_rpm)?,
            flash_model_tpm: parsed("FLASH_MODEL_TPM", defaults.flash_model_tpm)?,
            pro_model_rpm: parsed("PRO_MODEL_RPM", defaults.pro_model_rpm)?,
            pro_model_tpm: parsed("PRO_MODEL_TPM", defaults.pro_model_tpm)?,
            truncation_length: parsed("TRUNCATION_LENGTH", defaults.truncation_length)?,
            max_retries: parsed("MAX_RETRIES", defaults.max_retries)?,
            initial_backoff_seconds: parsed(
                "INITIAL_BACKOFF_SECONDS",
                defaults.initial_backoff_seconds,
            )?,
            recency_threshold_days: parsed(
                "RECENCY_THRESHOLD_DAYS",
                defaults.recency_threshold_days,
            )?,
            scrape_min_delay_seconds: parsed(
                "SCRAPE_MIN_DELAY_SECONDS",
                defaults.scrape_min_delay_seconds,
            )?,
            scrape_max_delay_seconds: parsed(
                "SCRAPE_MAX_DELAY_SECONDS",
                defaults.scrape_max_delay_seconds,
            )?,
            retry_log_path: string_or("RETRY_LOG_PATH", defaults.retry_log_path),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("FLASH_MODEL_RPM", self.flash_model_rpm),
            ("FLASH_MODEL_TPM", self.flash_model_tpm),
            ("PRO_MODEL_RPM", self.pro_model_rpm),
            ("PRO_MODEL_TPM", self.pro_model_tpm),
            ("MAX_RETRIES", self.max_retries),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }

        if self.truncation_length == 0 {
            return Err(Error::Config(
                "TRUNCATION_LENGTH must be greater than zero".to_string(),
            ));
        }

        if !self.scrape_min_delay_seconds.is_finite()
            || !self.scrape_max_delay_seconds.is_finite()
            || self.scrape_min_delay_seconds < 0.0
            || self.scrape_min_delay_seconds > self.scrape_max_delay_seconds
        {
            return Err(Error::Config(format!(
                "Invalid scrape delay range: {}..{}",
                self.scrape_min_delay_seconds, self.scrape_max_delay_seconds
            )));
        }

        Ok(())
    }
}
