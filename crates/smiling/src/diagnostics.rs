use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{error, warn};

use crate::transport::ResponseSnapshot;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Dumps the last response body of a failed download for offline inspection.
#[derive(Debug, Clone)]
pub struct DiagnosticCapture {
    dir: PathBuf,
}

impl DiagnosticCapture {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `response` to `{id}-{timestamp}{ext}`, logs the failure and
    /// hands `error` back untouched.
    pub async fn capture<E: Display>(
        &self,
        id: &str,
        response: Option<&ResponseSnapshot>,
        error: E,
    ) -> E {
        match response {
            Some(response) => match self.write(id, response, Local::now()).await {
                Ok(path) => {
                    error!(id = %id, path = %path.display(), error = %error, "Failed to download {id}, see {} for details", path.display());
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "Could not write diagnostic dump");
                    error!(id = %id, error = %error, "Failed to download {id}");
                }
            },
            None => {
                error!(id = %id, error = %error, "Failed to download {id}, no response to capture");
            }
        }
        error
    }

    async fn write(
        &self,
        id: &str,
        response: &ResponseSnapshot,
        now: DateTime<Local>,
    ) -> std::io::Result<PathBuf> {
        let path = self.dump_path(id, response.content_type.as_deref(), now);
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, response.text().as_bytes()).await?;
        Ok(path)
    }

    fn dump_path(&self, id: &str, content_type: Option<&str>, now: DateTime<Local>) -> PathBuf {
        let ext = content_type.and_then(extension_for).unwrap_or("");
        self.dir
            .join(format!("{id}-{}{ext}", now.format(TIMESTAMP_FORMAT)))
    }
}

/// File extension (with the leading dot) for a `Content-Type` value.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let ext = match essence.as_str() {
        "text/html" => ".html",
        "application/xhtml+xml" => ".xhtml",
        "application/json" => ".json",
        "text/plain" => ".txt",
        "text/xml" | "application/xml" => ".xml",
        "text/css" => ".css",
        "text/javascript" | "application/javascript" => ".js",
        "application/vnd.apple.mpegurl" | "application/x-mpegurl" | "audio/mpegurl" => ".m3u8",
        "audio/mp4" => ".m4a",
        "video/mp4" => ".mp4",
        "application/octet-stream" => ".bin",
        _ => return None,
    };
    Some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::TimeZone;
    use url::Url;

    use crate::DownloadError;

    fn snapshot(content_type: Option<&str>) -> ResponseSnapshot {
        ResponseSnapshot {
            url: Url::parse("https://www.example.com/watch/sm9").unwrap(),
            content_type: content_type.map(str::to_owned),
            body: Bytes::from_static(b"<html>maintenance</html>"),
        }
    }

    #[test]
    fn test_extension_table() {
        assert_eq!(extension_for("text/html; charset=utf-8"), Some(".html"));
        assert_eq!(extension_for("Application/JSON"), Some(".json"));
        assert_eq!(
            extension_for("application/vnd.apple.mpegurl"),
            Some(".m3u8")
        );
        assert_eq!(extension_for("application/x-unknown"), None);
    }

    #[test]
    fn test_dump_path_uses_id_and_timestamp() {
        let capture = DiagnosticCapture::new("log");
        let now = Local.with_ymd_and_hms(2024, 5, 1, 9, 8, 7).unwrap();
        assert_eq!(
            capture.dump_path("sm9", Some("text/html"), now),
            Path::new("log").join("sm9-20240501090807.html")
        );
        assert_eq!(
            capture.dump_path("sm9", None, now),
            Path::new("log").join("sm9-20240501090807")
        );
    }

    #[tokio::test]
    async fn test_capture_writes_body_and_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let capture = DiagnosticCapture::new(dir.path().join("log"));
        let response = snapshot(Some("text/html"));

        let err = capture
            .capture(
                "sm9",
                Some(&response),
                DownloadError::Manifest("no default audio".into()),
            )
            .await;
        assert!(matches!(err, DownloadError::Manifest(ref m) if m == "no default audio"));

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("log"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);
        let name = entries[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("sm9-"));
        assert!(name.ends_with(".html"));
        assert_eq!(
            std::fs::read_to_string(&entries[0]).unwrap(),
            "<html>maintenance</html>"
        );
    }

    #[tokio::test]
    async fn test_capture_without_response_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let capture = DiagnosticCapture::new(dir.path().join("log"));
        let err = capture
            .capture("sm9", None, DownloadError::Decrypt("bad".into()))
            .await;
        assert!(matches!(err, DownloadError::Decrypt(_)));
        assert!(!dir.path().join("log").exists());
    }
}
