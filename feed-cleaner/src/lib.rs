pub mod types;
pub mod traits;
pub mod fetcher;
pub mod document;
pub mod filter;
pub mod publisher;
pub mod job;
pub mod scheduler;
pub mod history;

pub use types::*;
pub use fetcher::Fetcher;
pub use document::{FeedDocument, NodeId, NodeKind};
pub use filter::{filter, remove_teaser_images};
pub use traits::FeedPublisher;
pub use publisher::FtpPublisher;
pub use job::JobRunner;
pub use scheduler::{Scheduler, SchedulerStatus, StartOutcome, StopOutcome};
pub use history::ConfigHistory;
