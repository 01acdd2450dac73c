use crate::types::{CleanerError, FetchConfig, Result};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::limited(config.max_redirects)
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(redirect)
            .build()?;

        Ok(Self { client, config })
    }

    /// Single GET of the feed body. Any non-2xx status is an error; nothing is retried.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let start_time = Instant::now();
        debug!("Fetching feed: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            warn!(
                "Feed source answered HTTP {} ({}): {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
                url
            );
            return Err(CleanerError::FetchStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let limit_bytes = self.config.max_feed_size_mb * 1024 * 1024;

        if let Some(content_length) = response.content_length() {
            if content_length as usize > limit_bytes {
                return Err(CleanerError::FeedTooLarge {
                    size_mb: content_length as usize / (1024 * 1024),
                });
            }
        }

        let body = response.bytes().await?;
        if body.len() > limit_bytes {
            return Err(CleanerError::FeedTooLarge {
                size_mb: body.len() / (1024 * 1024),
            });
        }

        info!(
            "Fetched feed: {} ({} bytes in {} ms)",
            url,
            body.len(),
            start_time.elapsed().as_millis()
        );
        Ok(body.to_vec())
    }
}
