mod extractor;
mod fetcher;
#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;

pub use extractor::{
    extract_detail, extract_listing, ExtractionError, Listing, ListingEntry, RejectedEntry,
};
pub use fetcher::{FetchFailure, FetchSettings, PageFetcher, RawPage};

/// Anything that can hand back a page for a URL with the fetcher's retry contract.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawPage, FetchFailure>;
}
