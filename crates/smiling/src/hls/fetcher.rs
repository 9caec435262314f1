// Resource fetching seam between the HLS stages and the transport.

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::{DownloadError, HttpClient, ResponseSnapshot};

#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetches a playlist or other text document.
    async fn fetch_document(&self, url: &Url) -> Result<Bytes, DownloadError>;

    /// Fetches binary content: init segment, key or media segment.
    async fn fetch_bytes(&self, url: &Url) -> Result<Bytes, DownloadError>;

    /// Last document response seen, if the fetcher keeps one.
    fn last_response(&self) -> Option<ResponseSnapshot> {
        None
    }
}

#[async_trait]
impl ResourceFetcher for HttpClient {
    async fn fetch_document(&self, url: &Url) -> Result<Bytes, DownloadError> {
        self.get_document(url).await
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Bytes, DownloadError> {
        self.get_bytes(url).await
    }

    fn last_response(&self) -> Option<ResponseSnapshot> {
        HttpClient::last_response(self)
    }
}
