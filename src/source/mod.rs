pub mod feed;
pub mod http;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::FetchedContent;

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetches one URL. Forbidden access must surface as `Error::Forbidden`;
    /// a page with nothing extractable is `Ok` with `text: None`.
    async fn fetch(&self, url: &str) -> Result<FetchedContent>;
}

pub use feed::{feed_location, load_feed, parse_feed_csv};
pub use http::HttpContentSource;
