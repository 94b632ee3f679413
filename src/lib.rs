pub mod config;
pub mod error;
pub mod models;
pub mod llm;
pub mod source;
pub mod storage;
pub mod pipeline;
pub mod utils;

#[cfg(test)]
pub mod testing;

pub use config::Config;
pub use error::{Error, Result};
pub use llm::{build_provider, FigureChecker, GatewayConfig, GeminiProvider, LLMProvider, LlmGateway};
pub use pipeline::{DriverConfig, PipelineDriver, RetryLog, RunSummary};
pub use source::{ContentSource, HttpContentSource};
pub use storage::{RecordStore, SqliteStore};
