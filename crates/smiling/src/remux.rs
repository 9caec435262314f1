use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::Stdio;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::DownloadError;

/// Pipes a decrypted stream into an external remuxer that writes the final container.
#[derive(Debug, Clone)]
pub struct Remuxer {
    program: OsString,
}

impl Remuxer {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(id: &str, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-i", "-", "-c", "copy", "-metadata"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(format!("comment={id}").into());
        args.push(output.as_os_str().to_owned());
        args
    }

    pub async fn remux(&self, id: &str, buffer: Bytes, output: &Path) -> Result<(), DownloadError> {
        let args = Self::args(id, output);
        debug!(program = ?self.program, args = ?args, "Starting remuxer");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("remuxer stdin is not piped"))?;
        let len = buffer.len();
        let feed = async move {
            stdin.write_all(&buffer).await?;
            stdin.shutdown().await
        };

        let (fed, output_result) = tokio::join!(feed, child.wait_with_output());
        let process_output = output_result?;

        if !process_output.status.success() {
            return Err(DownloadError::Remux {
                status: process_output.status,
                stderr: String::from_utf8_lossy(&process_output.stderr)
                    .trim()
                    .to_owned(),
            });
        }
        match fed {
            // The remuxer may stop reading once it has what it needs.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!(id = %id, "Remuxer closed its input early");
            }
            other => other?,
        }

        info!(id = %id, bytes = len, output = %output.display(), "Remux finished");
        Ok(())
    }
}

impl Default for Remuxer {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}
