use crate::document::FeedDocument;
use crate::types::{FeedConfig, Result};
use async_trait::async_trait;

/// Destination for a cleaned feed.
#[async_trait]
pub trait FeedPublisher: Send + Sync {
    /// Serializes `document` and stores it at the destination, returning the byte count.
    async fn publish(&self, document: &FeedDocument, destination: &FeedConfig) -> Result<usize>;
}
