#![allow(dead_code, unused_imports)]

mod fake_ftp;

pub use fake_ftp::FakeFtpServer;

use async_trait::async_trait;
use feed_cleaner::{
    CleanerError, FeedConfig, FeedDocument, FeedPublisher, FetchConfig, Fetcher, JobRunner, Result,
};
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Two images, one teaser and one editorial.
pub const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<images>
  <image id="101">
    <url>https://cdn.example.com/101.jpg</url>
    <tag>Teaser (Portale)</tag>
  </image>
  <image id="102">
    <url>https://cdn.example.com/102.jpg</url>
    <tag>Editorial</tag>
  </image>
</images>
"#;

pub fn feed_config(source_url: &str, ftp_host: &str) -> FeedConfig {
    FeedConfig {
        source_url: source_url.to_string(),
        ftp_host: ftp_host.to_string(),
        ftp_username: "feeds".to_string(),
        ftp_password: "s3cret".to_string(),
        ftp_target_path: "/public/fgp.xml".to_string(),
    }
}

pub fn test_fetch_config() -> FetchConfig {
    FetchConfig {
        user_agent: "feed-cleaner-test/1.0".to_string(),
        timeout_seconds: 5,
        ..FetchConfig::default()
    }
}

pub fn runner_with(publisher: Arc<dyn FeedPublisher>) -> Arc<JobRunner> {
    let fetcher = Arc::new(Fetcher::new(test_fetch_config()).expect("http client"));
    Arc::new(JobRunner::new(fetcher, publisher))
}

/// Publisher that keeps what it was asked to publish instead of uploading it.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    fail_with: Option<String>,
}

impl RecordingPublisher {
    pub fn failing(message: &str) -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedPublisher for RecordingPublisher {
    async fn publish(&self, document: &FeedDocument, destination: &FeedConfig) -> Result<usize> {
        let bytes = document.to_pretty_xml()?;
        let size = bytes.len();
        self.published
            .lock()
            .unwrap()
            .push((destination.ftp_target_path.clone(), bytes));

        match &self.fail_with {
            Some(message) => Err(CleanerError::Publish(message.clone())),
            None => Ok(size),
        }
    }
}
