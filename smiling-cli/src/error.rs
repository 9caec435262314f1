use thiserror::Error;

use crate::site::SiteError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download error: {0}")]
    Download(#[from] smiling_engine::DownloadError),

    #[error("Site error: {0}")]
    Site(#[from] SiteError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),
}
