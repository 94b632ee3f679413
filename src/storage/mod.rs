pub mod sqlite;

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::{PersistedRecord, RecordFilter, RecordUpdate};

pub use sqlite::SqliteStore;

/// Durable home of every `PersistedRecord` for one daily table.
pub trait RecordStore {
    fn exists(&self, url: &str) -> Result<bool>;
    fn insert(&self, record: &PersistedRecord) -> Result<()>;
    fn update(&self, url: &str, update: RecordUpdate) -> Result<()>;
    fn fetch_by_predicate(&self, filter: RecordFilter) -> Result<Vec<PersistedRecord>>;
}

/// SHA-256 of the extracted text, hex encoded. Used to spot content drift
/// between a first scrape and a retry.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
