use std::path::PathBuf;

use clap::Parser;
use smiling_engine::{DiagnosticCapture, Downloader, DownloaderConfig};
use tracing::{error, info};

mod cli;
mod config;
mod error;
mod logging;
mod player;
mod site;

use cli::CliArgs;
use config::Settings;
use error::AppError;
use site::NicoResolver;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    let args = CliArgs::parse();
    let id = site::parse_id(&args.audio)?;

    let settings = Settings::load(args.config.as_deref())
        .map_err(|e| AppError::Config(format!("{e:#}")))?;
    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| settings.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("output"));
    let log_dir = args
        .log_dir
        .clone()
        .or_else(|| settings.log_dir.clone())
        .unwrap_or_else(|| PathBuf::from("log"));

    let _guard = logging::init_logging(args.verbose, &log_dir)?;
    info!(id = %id, format = %args.format, "smiling {}", env!("CARGO_PKG_VERSION"));

    let config = settings.downloader_config(output_dir, log_dir);
    run(&args, &id, &config)
        .await
        .inspect_err(|e| error!(error = ?e, "Application failed"))
}

async fn run(args: &CliArgs, id: &str, config: &DownloaderConfig) -> Result<(), AppError> {
    let downloader = Downloader::new(config)?;
    let client = downloader.client().clone();

    let window = match NicoResolver::new(client.clone())
        .resolve(id, args.format)
        .await
    {
        Ok(window) => window,
        Err(e) if e.is_status() => return Err(e.into()),
        Err(e) => {
            let capture = DiagnosticCapture::new(&config.diagnostics_dir);
            return Err(capture
                .capture(id, client.last_response().as_ref(), e)
                .await
                .into());
        }
    };

    let output = downloader.download(id, args.format, &window).await?;
    println!("{}", output.display());

    if !args.no_play {
        player::play(id, &output).await?;
    }
    Ok(())
}
