use clap::Parser;
use smiling_engine::Quality;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    author = "hua0512 <https://github.com/hua0512>",
    version,
    about = "Download audio and play it",
    long_about = "Download the audio track of a video and play it.\n\
                  \n\
                  The input may be a watch page URL or a bare id such as sm9.\n\
                  The default `worst` format fetches roughly the first two minutes\n\
                  of the lowest quality audio; `best` fetches the full track."
)]
pub struct CliArgs {
    /// URL or id of the audio to download
    #[arg(value_parser = parse_audio_arg, help = "URL or sm-number of the audio to download")]
    pub audio: String,

    /// Audio format
    #[arg(short, long, value_enum, default_value_t = Quality::Worst)]
    pub format: Quality,

    /// Settings file
    #[arg(
        long,
        help = "Path to a TOML settings file (default: ./smiling.toml when present)"
    )]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, help = "Log at debug level to stderr instead of the log file")]
    pub verbose: bool,

    /// Skip playback
    #[arg(long, help = "Do not start the player after downloading")]
    pub no_play: bool,

    /// Output directory for downloaded files
    #[arg(long, help = "Directory where downloaded files are saved (default: ./output)")]
    pub output_dir: Option<PathBuf>,

    /// Log directory
    #[arg(long, help = "Directory for log files and diagnostic dumps (default: ./log)")]
    pub log_dir: Option<PathBuf>,
}

fn parse_audio_arg(value: &str) -> Result<String, String> {
    if value.chars().count() < 3 {
        return Err("expected at least 3 characters".to_string());
    }
    crate::site::parse_id(value)
        .map(|_| value.to_string())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["smiling", "sm9"]).unwrap();
        assert_eq!(args.audio, "sm9");
        assert_eq!(args.format, Quality::Worst);
        assert!(!args.verbose);
        assert!(!args.no_play);
    }

    #[test]
    fn test_format_and_flags() {
        let args = CliArgs::try_parse_from([
            "smiling",
            "https://www.nicovideo.jp/watch/so123",
            "-f",
            "best",
            "-v",
            "--no-play",
            "--output-dir",
            "out",
        ])
        .unwrap();
        assert_eq!(args.format, Quality::Best);
        assert!(args.verbose);
        assert!(args.no_play);
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_rejects_input_without_id() {
        assert!(CliArgs::try_parse_from(["smiling", "hello"]).is_err());
        assert!(CliArgs::try_parse_from(["smiling", "sm1 sm2"]).is_err());
    }
}
