use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;
use uuid::Uuid;

/// Tag value that marks an `image` entry for removal.
pub const TEASER_TAG: &str = "Teaser (Portale)";

/// Everything one job invocation needs: where to read the feed and where to put it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub source_url: String,
    pub ftp_host: String,
    pub ftp_username: String,
    pub ftp_password: String,
    pub ftp_target_path: String,
}

impl FeedConfig {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("source_url", &self.source_url),
            ("ftp_host", &self.ftp_host),
            ("ftp_username", &self.ftp_username),
            ("ftp_password", &self.ftp_password),
            ("ftp_target_path", &self.ftp_target_path),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(CleanerError::InvalidConfig(format!("{} must not be empty", name)));
            }
        }

        let url = Url::parse(&self.source_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CleanerError::InvalidConfig(format!(
                "source_url must be http or https, got {}",
                url.scheme()
            )));
        }

        Ok(())
    }

    /// Copy safe to print or log.
    pub fn redacted(&self) -> Self {
        Self {
            ftp_password: "***".to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedConfig")
            .field("source_url", &self.source_url)
            .field("ftp_host", &self.ftp_host)
            .field("ftp_username", &self.ftp_username)
            .field("ftp_password", &"***")
            .field("ftp_target_path", &self.ftp_target_path)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_feed_size_mb: usize,
    pub follow_redirects: bool,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "feed-cleaner/0.1".to_string(),
            timeout_seconds: 30,
            max_feed_size_mb: 10,
            follow_redirects: true,
            max_redirects: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub connect_timeout_seconds: u64,
    pub io_timeout_seconds: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 30,
            io_timeout_seconds: 60,
        }
    }
}

/// Summary of one fetch-filter-publish run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub run_id: Uuid,
    pub removed_count: usize,
    pub ftp_path: String,
    pub bytes_published: usize,
}

/// Coarse error classes a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fetch,
    Parse,
    Publish,
    Config,
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum CleanerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} fetching {url}")]
    FetchStatus { url: String, status: u16 },

    #[error("Feed size exceeds limit: {size_mb}MB")]
    FeedTooLarge { size_mb: usize },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("XML write error: {0}")]
    XmlWrite(String),

    #[error("FTP error: {0}")]
    Ftp(#[from] suppaftp::FtpError),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Schedule interval must be greater than zero")]
    InvalidInterval,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CleanerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(_) | Self::FetchStatus { .. } | Self::FeedTooLarge { .. } => ErrorKind::Fetch,
            Self::Parse(_) => ErrorKind::Parse,
            Self::Ftp(_) | Self::Publish(_) => ErrorKind::Publish,
            Self::InvalidUrl(_) | Self::InvalidConfig(_) | Self::InvalidInterval => ErrorKind::Config,
            Self::XmlWrite(_) | Self::Io(_) | Self::Serialization(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, CleanerError>;
