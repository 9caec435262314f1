use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{info, warn};

use crate::error::AppError;

const PLAYER: &str = "ffplay";

fn player_args(id: &str, file: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loop", "0", "-window_title", id]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(file.as_os_str().to_owned());
    args
}

/// Play `file` on a loop and wait for the player window to close.
pub async fn play(id: &str, file: &Path) -> Result<(), AppError> {
    info!(id = %id, file = %file.display(), "Starting playback");
    let status = Command::new(PLAYER)
        .args(player_args(id, file))
        .stdin(Stdio::null())
        .status()
        .await?;
    if !status.success() {
        warn!(id = %id, status = %status, "Player exited unsuccessfully");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_arguments() {
        let args = player_args("sm9", Path::new("output/_sm9.m4a"));
        assert_eq!(
            args,
            [
                "-hide_banner",
                "-loop",
                "0",
                "-window_title",
                "sm9",
                "output/_sm9.m4a"
            ]
            .map(OsString::from)
        );
    }
}
