use smiling_engine::DownloadError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("request failed: {0}")]
    Download(#[from] DownloadError),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("server-response meta tag not found")]
    MetaNotFound,
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl SiteError {
    /// Rejected HTTP statuses carry their own explanation.
    pub fn is_status(&self) -> bool {
        matches!(self, SiteError::Download(e) if e.is_status())
    }
}
