pub mod driver;
pub mod recency;
pub mod retry_log;

pub use driver::{checkpoints, DriverConfig, PipelineDriver, RunMode, RunSummary};
pub use recency::{Recency, RecencyRules};
pub use retry_log::{RetryLog, RetryReason};
