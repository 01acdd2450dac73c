use crate::fetcher::Fetcher;
use crate::filter;
use crate::traits::FeedPublisher;
use crate::types::{FeedConfig, JobResult, Result};
use std::sync::Arc;
use tracing::{info, Instrument};
use uuid::Uuid;

/// One fetch → filter → publish cycle. Shared by manual triggers and scheduled ticks.
pub struct JobRunner {
    fetcher: Arc<Fetcher>,
    publisher: Arc<dyn FeedPublisher>,
}

impl JobRunner {
    pub fn new(fetcher: Arc<Fetcher>, publisher: Arc<dyn FeedPublisher>) -> Self {
        Self { fetcher, publisher }
    }

    /// Runs the job once. The first failing step aborts the run with its own error,
    /// so the publisher only ever sees a fully parsed and filtered document.
    pub async fn run(&self, config: &FeedConfig) -> Result<JobResult> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("feed_job", %run_id, source = %config.source_url);

        async move {
            let raw = self.fetcher.fetch(&config.source_url).await?;
            let (document, removed_count) = filter::filter(&raw)?;

            let bytes_published = self.publisher.publish(&document, config).await?;

            info!(
                "Feed job finished: removed {} teaser images, published {} bytes to {}",
                removed_count, bytes_published, config.ftp_target_path
            );

            Ok(JobResult {
                run_id,
                removed_count,
                ftp_path: config.ftp_target_path.clone(),
                bytes_published,
            })
        }
        .instrument(span)
        .await
    }
}
