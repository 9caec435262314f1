use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::hls::{
    Deadline, ExpiryWindow, FetchScheduler, ManifestResolver, Quality, ResourceFetcher,
    StreamDecryptor,
};
use crate::remux::Remuxer;
use crate::transport::{HttpClient, create_client};
use crate::{DiagnosticCapture, DownloadError, DownloaderConfig};

/// Runs one download: manifest, fetch, decrypt, remux.
pub struct Downloader<F: ?Sized = HttpClient> {
    fetcher: Arc<F>,
    concurrency: usize,
    output_dir: PathBuf,
    diagnostics: DiagnosticCapture,
    remuxer: Remuxer,
}

impl Downloader<HttpClient> {
    /// Create a downloader backed by a fresh [`HttpClient`].
    pub fn new(config: &DownloaderConfig) -> Result<Self, DownloadError> {
        let client = create_client(config)?;
        Ok(Self::with_fetcher(Arc::new(client), config))
    }

    pub fn client(&self) -> &HttpClient {
        &self.fetcher
    }
}

impl<F> Downloader<F>
where
    F: ResourceFetcher + ?Sized,
{
    pub fn with_fetcher(fetcher: Arc<F>, config: &DownloaderConfig) -> Self {
        Self {
            fetcher,
            concurrency: config.concurrency,
            output_dir: config.output_dir.clone(),
            diagnostics: DiagnosticCapture::new(&config.diagnostics_dir),
            remuxer: Remuxer::new(&config.remux_program),
        }
    }

    pub fn output_path(&self, id: &str, quality: Quality) -> PathBuf {
        self.output_dir
            .join(format!("{}{id}.m4a", quality.file_prefix()))
    }

    /// Downloads the rendition `window` grants access to and returns the written file.
    ///
    /// Failures other than rejected statuses leave a diagnostic dump behind.
    /// A file this call started writing is removed on failure.
    pub async fn download(
        &self,
        id: &str,
        quality: Quality,
        window: &ExpiryWindow,
    ) -> Result<PathBuf, DownloadError> {
        let output = self.output_path(id, quality);
        let preexisting = tokio::fs::try_exists(&output).await.unwrap_or(false);
        info!(id = %id, quality = %quality, output = %output.display(), "Starting download");

        match self.run(id, quality, window, &output).await {
            Ok(()) => {
                info!(id = %id, output = %output.display(), "Download complete");
                Ok(output)
            }
            Err(e) => {
                if !preexisting {
                    remove_partial(&output).await;
                }
                if e.is_status() {
                    warn!(id = %id, error = %e, "Download rejected");
                    return Err(e);
                }
                let response = self.fetcher.last_response();
                Err(self.diagnostics.capture(id, response.as_ref(), e).await)
            }
        }
    }

    async fn run(
        &self,
        id: &str,
        quality: Quality,
        window: &ExpiryWindow,
        output: &Path,
    ) -> Result<(), DownloadError> {
        let deadline = Deadline::from_window(window)?;
        debug!(id = %id, budget = ?deadline.budget(), "Access window open");

        let master_url = Url::parse(&window.content_url)?;
        let resolver = ManifestResolver::new(Arc::clone(&self.fetcher));
        let manifest = deadline
            .run("manifest resolution", resolver.load(&master_url))
            .await?;

        let scheduler = FetchScheduler::new(Arc::clone(&self.fetcher), self.concurrency);
        let stream = scheduler.fetch(&manifest, quality, deadline).await?;

        let buffer = tokio::task::spawn_blocking(move || StreamDecryptor::decrypt_stream(&stream))
            .await
            .map_err(|e| DownloadError::Decrypt(format!("decryption task failed: {e}")))??;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        self.remuxer.remux(id, buffer, output).await
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial output"),
    }
}
