// HLS Fetch Scheduler: pulls the init segment, key and media segments concurrently.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::try_join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info};
use url::Url;

use crate::DownloadError;
use crate::hls::expiry::Deadline;
use crate::hls::fetcher::ResourceFetcher;
use crate::hls::playlist::RenditionManifest;
use crate::hls::quality::Quality;

const AES_BLOCK_SIZE: usize = 16;

/// One unit of work issued by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchJob {
    InitSegment,
    Key,
    /// Position in the selected segment list
    Segment(usize),
}

impl fmt::Display for FetchJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchJob::InitSegment => f.write_str("init segment"),
            FetchJob::Key => f.write_str("key"),
            FetchJob::Segment(index) => write!(f, "segment #{index}"),
        }
    }
}

/// Everything the decryptor needs, segments in playlist order.
#[derive(Debug, Clone)]
pub struct FetchedStream {
    pub init: Bytes,
    pub key: [u8; 16],
    pub iv: [u8; 16],
    pub segments: Vec<Bytes>,
}

impl FetchedStream {
    pub fn encrypted_len(&self) -> usize {
        self.segments.iter().map(Bytes::len).sum()
    }
}

pub struct FetchScheduler<F: ?Sized> {
    fetcher: Arc<F>,
    limiter: Arc<Semaphore>,
}

impl<F> FetchScheduler<F>
where
    F: ResourceFetcher + ?Sized,
{
    pub fn new(fetcher: Arc<F>, concurrency: usize) -> Self {
        Self {
            fetcher,
            limiter: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Fetches the init segment, key and the segments `quality` selects.
    ///
    /// The init segment and media segments share the limiter; the key does
    /// not. The first failure, or the deadline, abandons every outstanding
    /// request.
    pub async fn fetch(
        &self,
        manifest: &RenditionManifest,
        quality: Quality,
        deadline: Deadline,
    ) -> Result<FetchedStream, DownloadError> {
        let selected = quality.select(&manifest.segments, manifest.target_duration)?;
        info!(
            quality = %quality,
            segments = selected.len(),
            available = manifest.segments.len(),
            budget = ?deadline.budget(),
            "Fetching rendition"
        );

        let init = self.fetch_limited(FetchJob::InitSegment, &manifest.init_segment);
        let key = self.fetch_key(&manifest.key.uri);
        let segments = try_join_all(
            selected
                .iter()
                .enumerate()
                .map(|(index, url)| self.fetch_segment(index, url)),
        );

        let (init, key, segments) = deadline
            .run("rendition fetch", async { tokio::try_join!(init, key, segments) })
            .await?;

        Ok(FetchedStream {
            init,
            key,
            iv: manifest.key.iv,
            segments,
        })
    }

    async fn fetch_key(&self, url: &Url) -> Result<[u8; 16], DownloadError> {
        let body = self.fetcher.fetch_bytes(url).await?;
        <[u8; 16]>::try_from(body.as_ref()).map_err(|_| DownloadError::Size {
            job: FetchJob::Key,
            len: body.len(),
        })
    }

    async fn fetch_segment(&self, index: usize, url: &Url) -> Result<Bytes, DownloadError> {
        let job = FetchJob::Segment(index);
        let body = self.fetch_limited(job, url).await?;
        if body.len() % AES_BLOCK_SIZE != 0 {
            return Err(DownloadError::Size {
                job,
                len: body.len(),
            });
        }
        Ok(body)
    }

    async fn fetch_limited(&self, job: FetchJob, url: &Url) -> Result<Bytes, DownloadError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| DownloadError::Config(format!("fetch limiter closed: {e}")))?;
        let body = self.fetcher.fetch_bytes(url).await?;
        debug!(job = %job, bytes = body.len(), "Fetched");
        Ok(body)
    }
}
