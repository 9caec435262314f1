use reqwest::StatusCode;
use std::process::ExitStatus;
use url::Url;

use crate::hls::FetchJob;

// Error type for a single download attempt
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("Server returned status code {status} for {url}")]
    Status { status: StatusCode, url: Url },

    #[error("Bad {job} size: {len} bytes")]
    Size { job: FetchJob, len: usize },

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Decryption error: {0}")]
    Decrypt(String),

    #[error("Remux process exited with {status}: {stderr}")]
    Remux { status: ExitStatus, stderr: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DownloadError {
    /// Rejected HTTP statuses explain themselves and skip diagnostic capture.
    pub fn is_status(&self) -> bool {
        matches!(self, DownloadError::Status { .. })
    }

    /// Whether the transport layer may retry the request that produced this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::Transport(e) => e.is_connect(),
            _ => false,
        }
    }
}
