use crate::llm::provider::RateLimitProfile;
use crate::models::ContentItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelProfile {
    pub max_chars_per_batch: usize,
    pub max_items_per_batch: usize,
}

impl ModelProfile {
    pub fn new(max_chars_per_batch: usize, max_items_per_batch: usize) -> Self {
        Self {
            max_chars_per_batch: max_chars_per_batch.max(1),
            max_items_per_batch: max_items_per_batch.max(1),
        }
    }

    /// Low-RPM models get single-item batches; fast models spend a small
    /// share of their per-minute token budget on each batch.
    pub fn from_rate_limits(limits: RateLimitProfile) -> Self {
        let tpm = limits.tokens_per_minute as usize;
        match limits.requests_per_minute {
            0..=2 => Self::new(60_000.min(tpm / 3), 1),
            3..=10 => Self::new(200_000.min(tpm / 4), 3),
            _ => Self::new(800_000.min(tpm / 8), 5),
        }
    }
}

pub struct BatchPlanner {
    profile: ModelProfile,
}

impl BatchPlanner {
    pub fn new(profile: ModelProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> ModelProfile {
        self.profile
    }

    /// Largest-first packing. Each item lands in exactly one batch and an item
    /// larger than the character cap always travels alone.
    pub fn plan(&self, mut items: Vec<ContentItem>) -> Vec<Vec<ContentItem>> {
        let max_chars = self.profile.max_chars_per_batch;
        let max_items = self.profile.max_items_per_batch;

        // Stable, so equal-length items keep their input order
        items.sort_by_key(|item| std::cmp::Reverse(item.char_len()));

        let mut batches = Vec::new();
        let mut current_batch = Vec::new();
        let mut current_chars = 0;

        for item in items {
            let item_chars = item.char_len();

            if item_chars > max_chars {
                if !current_batch.is_empty() {
                    batches.push(std::mem::take(&mut current_batch));
                    current_chars = 0;
                }
                batches.push(vec![item]);
                continue;
            }

            if current_batch.len() >= max_items || current_chars + item_chars > max_chars {
                if !current_batch.is_empty() {
                    batches.push(std::mem::take(&mut current_batch));
                }
                current_chars = 0;
            }

            current_chars += item_chars;
            current_batch.push(item);
        }

        if !current_batch.is_empty() {
            batches.push(current_batch);
        }

        batches
    }
}
