//! # Builder for DownloaderConfig
//!
//! Fluent construction of [`DownloaderConfig`] values.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use smiling_engine::DownloaderConfig;
//!
//! let config = DownloaderConfig::builder()
//!     .with_timeout(Duration::from_secs(30))
//!     .with_concurrency(8)
//!     .with_host("asset.example.com", "203.0.113.7")
//!     .with_sni_hostname("asset.example.com", "cdn.example.net")
//!     .build();
//!
//! assert_eq!(config.concurrency, 8);
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::DownloaderConfig;

/// Builder for creating DownloaderConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct DownloaderConfigBuilder {
    /// Internal config being built
    config: DownloaderConfig,
}

impl DownloaderConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: DownloaderConfig::default(),
        }
    }

    /// Set the overall timeout for a single HTTP request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout (time to establish initial connection)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.headers.insert(name, value);
        }
        self
    }

    /// Set all HTTP headers, replacing any existing headers
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.config.headers = headers;
        self
    }

    /// Set how many times a connection-level failure is retried
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    /// Set the base delay of the retry backoff
    pub fn with_retry_delay_base(mut self, delay: Duration) -> Self {
        self.config.retry_delay_base = delay;
        self
    }

    /// Set the redirect hop limit
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.config.max_redirects = max_redirects;
        self
    }

    /// Set the maximum number of simultaneous segment requests
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Connect to `address` whenever `host` is requested
    pub fn with_host(mut self, host: impl Into<String>, address: impl Into<String>) -> Self {
        self.config.hosts.insert(host.into(), address.into());
        self
    }

    /// Replace the whole host override table
    pub fn with_hosts(mut self, hosts: HashMap<String, String>) -> Self {
        self.config.hosts = hosts;
        self
    }

    /// Present `server_name` during the TLS handshake with `host`
    pub fn with_sni_hostname(
        mut self,
        host: impl Into<String>,
        server_name: impl Into<String>,
    ) -> Self {
        self.config
            .sni_hostname
            .insert(host.into(), server_name.into());
        self
    }

    /// Replace the whole handshake-name override table
    pub fn with_sni_hostnames(mut self, sni_hostname: HashMap<String, String>) -> Self {
        self.config.sni_hostname = sni_hostname;
        self
    }

    /// Set the directory receiving finished files
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    /// Set the directory receiving diagnostic dumps
    pub fn with_diagnostics_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.diagnostics_dir = dir.into();
        self
    }

    /// Set the remux program
    pub fn with_remux_program(mut self, program: impl Into<String>) -> Self {
        self.config.remux_program = program.into();
        self
    }

    /// Build the DownloaderConfig instance
    pub fn build(self) -> DownloaderConfig {
        self.config
    }
}

impl Default for DownloaderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_builder_defaults() {
        let config = DownloaderConfigBuilder::new().build();
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.retries, 42);
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.max_redirects, 10);
        assert_eq!(config.remux_program, "ffmpeg");
        assert!(config.hosts.is_empty());
        assert!(config.sni_hostname.is_empty());
    }

    #[test]
    fn test_builder_customization() {
        let config = DownloaderConfigBuilder::new()
            .with_timeout(Duration::from_secs(20))
            .with_user_agent("CustomUserAgent/1.0")
            .with_header("X-Custom-Header", "CustomValue")
            .with_retries(2)
            .with_concurrency(9)
            .with_host("asset.example.com", "203.0.113.7")
            .with_sni_hostname("asset.example.com", "cdn.example.net")
            .with_output_dir("/tmp/out")
            .build();

        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.user_agent, "CustomUserAgent/1.0");
        assert_eq!(config.retries, 2);
        assert_eq!(config.concurrency, 9);
        assert_eq!(config.hosts["asset.example.com"], "203.0.113.7");
        assert_eq!(config.sni_hostname["asset.example.com"], "cdn.example.net");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));

        let header_value = config.headers.get("X-Custom-Header").unwrap();
        assert_eq!(header_value.to_str().unwrap(), "CustomValue");
    }

    #[test]
    fn test_invalid_header_is_ignored() {
        let config = DownloaderConfigBuilder::new()
            .with_header("Bad Header", "value")
            .build();
        assert!(config.headers.get("Bad Header").is_none());
    }
}
