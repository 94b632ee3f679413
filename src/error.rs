use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("LLM API error: {0}")]
    LLMApi(String),

    #[error("LLM quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Access forbidden: {0}")]
    Forbidden(String),

    #[error("Failed to fetch {url}: {reason}")]
    SourceFetch { url: String, reason: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Record not found: {0}")]
    RecordNotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Only quota exhaustion is worth backing off for; everything else fails the call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::QuotaExhausted(_))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Error::Forbidden(_))
    }
}
