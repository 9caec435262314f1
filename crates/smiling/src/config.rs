use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use rand::seq::IndexedRandom;
use reqwest::header::{HeaderMap, HeaderValue};

const CHROME_VERSIONS: &[&str] = &[
    "99.0.4844.84",
    "99.0.4844.82",
    "99.0.4844.74",
    "98.0.4758.102",
    "98.0.4758.82",
    "98.0.4758.80",
    "97.0.4692.99",
    "97.0.4692.71",
    "96.0.4664.110",
    "96.0.4664.93",
    "96.0.4664.45",
    "95.0.4638.69",
    "95.0.4638.54",
    "94.0.4606.81",
    "94.0.4606.71",
    "94.0.4606.61",
    "94.0.4606.54",
    "93.0.4577.82",
    "93.0.4577.63",
    "92.0.4515.159",
    "92.0.4515.131",
    "92.0.4515.107",
    "91.0.4472.164",
    "91.0.4472.124",
    "91.0.4472.114",
    "91.0.4472.106",
    "91.0.4472.101",
    "91.0.4472.77",
    "90.0.4430.212",
    "90.0.4430.93",
    "90.0.4430.72",
];

/// Segment requests allowed in flight at once unless configured otherwise
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Configurable options for the downloader
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Overall timeout for a single HTTP request
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,

    /// Retries for connection-level failures; status errors are never retried
    pub retries: u32,

    /// Base for exponential backoff between connection retries
    pub retry_delay_base: Duration,

    /// Upper bound for a single backoff delay
    pub max_retry_delay: Duration,

    /// Maximum redirect hops followed for one request
    pub max_redirects: usize,

    /// Maximum simultaneous init/media segment requests
    pub concurrency: usize,

    /// Logical host name -> address actually connected to
    pub hosts: HashMap<String, String>,

    /// Logical host name -> name presented during the TLS handshake.
    /// Only consulted for hosts that also appear in `hosts`.
    pub sni_hostname: HashMap<String, String>,

    /// Directory receiving finished files
    pub output_dir: PathBuf,

    /// Directory receiving diagnostic dumps
    pub diagnostics_dir: PathBuf,

    /// Program used to remux the decrypted stream
    pub remux_program: String,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            user_agent: random_user_agent(),
            headers: DownloaderConfig::get_default_headers(),
            retries: 42,
            retry_delay_base: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(8),
            max_redirects: 10,
            concurrency: DEFAULT_CONCURRENCY,
            hosts: HashMap::new(),
            sni_hostname: HashMap::new(),
            output_dir: PathBuf::from("output"),
            diagnostics_dir: PathBuf::from("log"),
            remux_program: "ffmpeg".to_owned(),
        }
    }
}

impl DownloaderConfig {
    pub fn builder() -> crate::builder::DownloaderConfigBuilder {
        crate::builder::DownloaderConfigBuilder::new()
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("ja,en-US;q=0.7,en;q=0.3"),
        );
        default_headers
    }

    /// Backoff before retry number `attempt` (1-based)
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_delay_base
            .saturating_mul(factor)
            .min(self.max_retry_delay)
    }
}

/// Desktop Chrome user agent with a randomly picked version.
pub fn random_user_agent() -> String {
    let version = CHROME_VERSIONS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(CHROME_VERSIONS[0]);
    format!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{version} Safari/537.36"
    )
}
