use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use smiling_engine::DownloaderConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Settings file consulted when `--config` is not given.
pub const DEFAULT_SETTINGS_FILE: &str = "smiling.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Host name -> address to connect to instead of resolving it
    pub hosts: HashMap<String, String>,

    /// Host name -> name presented during the TLS handshake
    pub sni_hostname: HashMap<String, String>,

    /// Maximum simultaneous segment requests
    pub parallel: usize,

    /// Directory receiving downloaded files
    pub output_dir: Option<PathBuf>,

    /// Directory receiving log files and diagnostic dumps
    pub log_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hosts: HashMap::new(),
            sni_hostname: HashMap::new(),
            parallel: smiling_engine::config::DEFAULT_CONCURRENCY,
            output_dir: None,
            log_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from [`DEFAULT_SETTINGS_FILE`].
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or(Path::new(DEFAULT_SETTINGS_FILE));
        let settings = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings file {}", path.display()))?;
            Self::parse(&content)
                .with_context(|| format!("Failed to parse settings file {}", path.display()))?
        } else {
            Self::default()
        };
        Ok(settings)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content).context("Invalid TOML")?;
        ensure!(settings.parallel > 0, "parallel must be a positive integer");
        Ok(settings)
    }

    pub fn downloader_config(&self, output_dir: PathBuf, log_dir: PathBuf) -> DownloaderConfig {
        DownloaderConfig::builder()
            .with_concurrency(self.parallel)
            .with_hosts(self.hosts.clone())
            .with_sni_hostnames(self.sni_hostname.clone())
            .with_output_dir(output_dir)
            .with_diagnostics_dir(log_dir)
            .build()
    }
}
