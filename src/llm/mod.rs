pub mod provider;
pub mod gemini;
pub mod prompts;
pub mod parser;
pub mod batcher;
pub mod rate_limiter;
pub mod fact_check;
pub mod gateway;

pub use provider::{build_provider, LLMProvider, ModelTier, ProviderKind, RateLimitProfile};
pub use gemini::GeminiProvider;
pub use prompts::{BatchRequest, RefinementRequest};
pub use parser::{parse_batch_response, ParseOutcome};
pub use batcher::{BatchPlanner, ModelProfile};
pub use fact_check::{FactChecker, FigureChecker, Verification};
pub use gateway::{GatewayConfig, LlmGateway};
