use crate::document::FeedDocument;
use crate::traits::FeedPublisher;
use crate::types::{CleanerError, FeedConfig, PublishConfig, Result};
use async_trait::async_trait;
use std::io::Cursor;
use std::net::ToSocketAddrs;
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::FtpStream;
use tracing::{debug, info, warn};

const DEFAULT_FTP_PORT: u16 = 21;

/// Uploads the feed with a binary `STOR`, overwriting the remote file.
///
/// The serialized feed only lives in a per-call buffer; nothing touches the local disk.
pub struct FtpPublisher {
    config: PublishConfig,
}

impl FtpPublisher {
    pub fn new(config: PublishConfig) -> Self {
        Self { config }
    }
}

impl Default for FtpPublisher {
    fn default() -> Self {
        Self::new(PublishConfig::default())
    }
}

#[async_trait]
impl FeedPublisher for FtpPublisher {
    async fn publish(&self, document: &FeedDocument, destination: &FeedConfig) -> Result<usize> {
        let payload = document.to_pretty_xml()?;
        let size = payload.len();

        let config = self.config.clone();
        let destination = destination.clone();

        // suppaftp's FtpStream is blocking
        let stored = tokio::task::spawn_blocking(move || upload(&config, &destination, payload))
            .await
            .map_err(|e| CleanerError::Publish(format!("upload task failed: {}", e)))??;

        debug!("FTP server acknowledged {} of {} bytes", stored, size);
        Ok(size)
    }
}

fn upload(config: &PublishConfig, destination: &FeedConfig, payload: Vec<u8>) -> Result<u64> {
    let address = ftp_address(&destination.ftp_host);
    let socket = address
        .to_socket_addrs()
        .map_err(|e| CleanerError::Publish(format!("cannot resolve FTP host {}: {}", address, e)))?
        .next()
        .ok_or_else(|| CleanerError::Publish(format!("no address found for FTP host {}", address)))?;

    debug!("Connecting to FTP server {}", address);
    let mut ftp = FtpStream::connect_timeout(socket, Duration::from_secs(config.connect_timeout_seconds))?;

    let stored = store(&mut ftp, config, destination, payload);

    if let Err(e) = ftp.quit() {
        warn!("Failed to close FTP session with {}: {}", address, e);
    }

    if stored.is_ok() {
        info!("Uploaded feed to ftp://{}{}", address, destination.ftp_target_path);
    }
    stored
}

fn store(ftp: &mut FtpStream, config: &PublishConfig, destination: &FeedConfig, payload: Vec<u8>) -> Result<u64> {
    let io_timeout = Some(Duration::from_secs(config.io_timeout_seconds));
    let control = ftp.get_ref();
    control
        .set_read_timeout(io_timeout)
        .and_then(|_| control.set_write_timeout(io_timeout))
        .map_err(|e| CleanerError::Publish(format!("cannot configure FTP connection: {}", e)))?;

    ftp.login(&destination.ftp_username, &destination.ftp_password)?;
    ftp.transfer_type(FileType::Binary)?;

    let mut reader = Cursor::new(payload);
    Ok(ftp.put_file(&destination.ftp_target_path, &mut reader)?)
}

/// `host` or `host:port`; bare hosts get the standard FTP port.
fn ftp_address(host: &str) -> String {
    let host = host.trim();
    match host.rsplit_once(':') {
        Some((name, port)) if port.parse::<u16>().is_ok() && (!name.contains(':') || name.ends_with(']')) => {
            host.to_string()
        }
        _ if host.contains(':') => format!("[{}]:{}", host, DEFAULT_FTP_PORT),
        _ => format!("{}:{}", host, DEFAULT_FTP_PORT),
    }
}
