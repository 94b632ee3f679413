use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::llm::provider::{LLMProvider, ModelTier, RateLimitProfile};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    flash_model: String,
    pro_model: String,
    flash_limits: RateLimitProfile,
    pro_limits: RateLimitProfile,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiError {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl GeminiProvider {
    pub fn new(
        api_key: String,
        flash_model: String,
        pro_model: String,
        flash_limits: RateLimitProfile,
        pro_limits: RateLimitProfile,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: GEMINI_API_BASE.to_string(),
            flash_model,
            pro_model,
            flash_limits,
            pro_limits,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .gemini_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::Config("GEMINI_API_KEY environment variable not set".to_string())
            })?;

        Self::new(
            api_key,
            config.flash_model.clone(),
            config.pro_model.clone(),
            RateLimitProfile::new(config.flash_model_rpm, config.flash_model_tpm),
            RateLimitProfile::new(config.pro_model_rpm, config.pro_model_tpm),
        )
    }

    fn classify_failure(status: StatusCode, body: &str) -> Error {
        if status == StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
            Error::QuotaExhausted(format!("Gemini API ({}): {}", status, body))
        } else {
            Error::LLMApi(format!("Gemini API error ({}): {}", status, body))
        }
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn submit_prompt(&self, prompt: &str, tier: ModelTier) -> Result<String> {
        let model = self.model_name(tier);
        tracing::debug!(target: "govbrief::llm", %model, "Sending ~{} tokens to Gemini", prompt.len() / 4);

        let body = GenerateRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, model))
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::LLMApi(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_failure(status, &body));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::LLMApi(format!("Failed to parse Gemini response: {}", e)))?;

        if let Some(error) = result.error {
            return Err(match error.status.as_deref() {
                Some("RESOURCE_EXHAUSTED") => Error::QuotaExhausted(error.message),
                _ => Error::LLMApi(error.message),
            });
        }

        let text = result
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::LLMApi("Empty response from Gemini".to_string()));
        }

        Ok(text)
    }

    fn rate_limit_profile(&self, tier: ModelTier) -> RateLimitProfile {
        match tier {
            ModelTier::Fast => self.flash_limits,
            ModelTier::HighAccuracy => self.pro_limits,
        }
    }

    fn model_name(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.flash_model,
            ModelTier::HighAccuracy => &self.pro_model,
        }
    }

    fn name(&self) -> &str {
        "Gemini"
    }
}
