use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

use crate::llm::provider::RateLimitProfile;

/// Enforces a minimum spacing between consecutive calls to one model tier.
pub struct RateLimiter {
    min_interval: Duration,
    state: Mutex<RateLimitState>,
}

struct RateLimitState {
    last_call: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            state: Mutex::new(RateLimitState { last_call: None }),
        }
    }

    pub fn from_profile(profile: RateLimitProfile) -> Self {
        Self::new(profile.min_interval())
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Blocks until the interval since the previous call has elapsed, then
    /// stamps the new call. Returns how long it waited.
    pub async fn wait(&self) -> Duration {
        let mut state = self.state.lock().await;
        let mut waited = Duration::ZERO;

        if let Some(last_call) = state.last_call {
            let elapsed = last_call.elapsed();
            if elapsed < self.min_interval {
                waited = self.min_interval - elapsed;
                tracing::debug!("Rate limit: waiting {:.1}s", waited.as_secs_f64());
                sleep(waited).await;
            }
        }

        state.last_call = Some(Instant::now());
        waited
    }
}
