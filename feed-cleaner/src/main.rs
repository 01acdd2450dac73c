use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use feed_cleaner::scheduler::DEFAULT_INTERVAL;
use feed_cleaner::{
    filter, ConfigHistory, FeedConfig, FetchConfig, Fetcher, FtpPublisher, JobRunner, Scheduler,
    StartOutcome,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "feed-cleaner", version, about = "Strip teaser images from an XML feed and publish it over FTP")]
struct Cli {
    /// User agent sent when fetching the source feed
    #[arg(long, env = "FEED_USER_AGENT", default_value = "feed-cleaner/0.1")]
    user_agent: String,

    /// Timeout for the feed download
    #[arg(long, env = "FEED_TIMEOUT_SECONDS", default_value_t = 30)]
    timeout_seconds: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch, clean and publish the feed once
    Run(FeedArgs),
    /// Run the job on a fixed interval until Ctrl-C
    Schedule {
        #[command(flatten)]
        feed: FeedArgs,

        #[arg(long, default_value_t = DEFAULT_INTERVAL.as_secs() / 60)]
        interval_minutes: u64,
    },
    /// Clean a local feed file without publishing it
    Filter {
        #[arg(long)]
        input: PathBuf,

        /// Defaults to stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Feed configuration; flags and env vars override values read from `--config`.
#[derive(Args)]
struct FeedArgs {
    /// JSON file with source_url, ftp_host, ftp_username, ftp_password, ftp_target_path
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, env = "FEED_SOURCE_URL")]
    source_url: Option<String>,

    #[arg(long, env = "FTP_HOST")]
    ftp_host: Option<String>,

    #[arg(long, env = "FTP_USERNAME")]
    ftp_username: Option<String>,

    #[arg(long, env = "FTP_PASSWORD", hide_env_values = true)]
    ftp_password: Option<String>,

    #[arg(long, env = "FTP_TARGET_PATH")]
    ftp_target_path: Option<String>,
}

impl FeedArgs {
    fn into_config(self) -> anyhow::Result<FeedConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                serde_json::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => FeedConfig {
                source_url: String::new(),
                ftp_host: String::new(),
                ftp_username: String::new(),
                ftp_password: String::new(),
                ftp_target_path: String::new(),
            },
        };

        let overrides = [
            (self.source_url, &mut config.source_url),
            (self.ftp_host, &mut config.ftp_host),
            (self.ftp_username, &mut config.ftp_username),
            (self.ftp_password, &mut config.ftp_password),
            (self.ftp_target_path, &mut config.ftp_target_path),
        ];
        for (value, field) in overrides {
            if let Some(value) = value {
                *field = value;
            }
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let fetch_config = FetchConfig {
        user_agent: cli.user_agent,
        timeout_seconds: cli.timeout_seconds,
        ..FetchConfig::default()
    };

    let mut history = ConfigHistory::default();

    match cli.command {
        Command::Run(feed) => {
            let config = feed.into_config()?;
            history.record(&config);
            run_once(config, fetch_config).await
        }
        Command::Schedule { feed, interval_minutes } => {
            if interval_minutes == 0 {
                bail!("--interval-minutes must be at least 1");
            }
            let config = feed.into_config()?;
            history.record(&config);
            schedule(config, fetch_config, Duration::from_secs(interval_minutes * 60), &history).await
        }
        Command::Filter { input, output } => filter_file(input, output).await,
    }
}

fn build_runner(fetch_config: FetchConfig) -> anyhow::Result<Arc<JobRunner>> {
    let fetcher = Arc::new(Fetcher::new(fetch_config)?);
    let publisher = Arc::new(FtpPublisher::default());
    Ok(Arc::new(JobRunner::new(fetcher, publisher)))
}

async fn run_once(config: FeedConfig, fetch_config: FetchConfig) -> anyhow::Result<()> {
    let runner = build_runner(fetch_config)?;

    match runner.run(&config).await {
        Ok(result) => {
            let summary = json!({
                "status": "success",
                "removed_images": result.removed_count,
                "ftp_path": result.ftp_path,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(e) => {
            error!("Feed job failed ({:?}): {}", e.kind(), e);
            Err(e).context("feed job failed")
        }
    }
}

async fn schedule(
    config: FeedConfig,
    fetch_config: FetchConfig,
    interval: Duration,
    history: &ConfigHistory,
) -> anyhow::Result<()> {
    let scheduler = Scheduler::new(build_runner(fetch_config)?);

    match scheduler.start(config, interval).await? {
        StartOutcome::Started(status) => info!(
            "Scheduler running every {} minutes, press Ctrl-C to stop",
            status.interval_secs.unwrap_or_default() / 60
        ),
        StartOutcome::AlreadyRunning(_) => info!("Scheduler already running"),
    }

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("Shutting down scheduler");
    scheduler.shutdown().await;

    let status = scheduler.status().await;
    let report = json!({
        "ticks": status.stats.ticks,
        "failures": status.stats.failures,
        "last_removed": status.stats.last_removed,
        "last_error": status.stats.last_error,
        "last_config": history.latest(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn filter_file(input: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    let raw = tokio::fs::read(&input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;

    let (document, removed) = filter::filter(&raw)?;
    let cleaned = document.to_pretty_xml()?;

    match output {
        Some(path) => tokio::fs::write(&path, &cleaned)
            .await
            .with_context(|| format!("writing {}", path.display()))?,
        None => {
            use std::io::Write;
            std::io::stdout().write_all(&cleaned)?;
        }
    }

    info!("Removed {} teaser images from {}", removed, input.display());
    Ok(())
}
