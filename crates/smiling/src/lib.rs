//! # Smiling engine
//!
//! Downloads a single encrypted HLS audio rendition and turns it into a
//! playable file.
//!
//! ## Pipeline
//!
//! - [`hls::playlist`] resolves the master and media playlists
//! - [`hls::scheduler`] fetches the init segment, key and media segments
//!   concurrently under a limiter and a deadline
//! - [`hls::decryption`] decrypts the segments into one contiguous buffer
//! - [`remux`] hands the buffer to an external remuxer
//!
//! Every network call goes through [`transport`], which can reroute a host
//! to another address and present a different TLS handshake name.

pub mod builder;
pub mod config;
pub mod diagnostics;
pub mod downloader;
pub mod error;
pub mod hls;
pub mod remux;
pub mod transport;

pub use builder::DownloaderConfigBuilder;
pub use config::DownloaderConfig;
pub use diagnostics::DiagnosticCapture;
pub use remux::Remuxer;
pub use downloader::Downloader;
pub use error::DownloadError;

pub use hls::{Deadline, ExpiryWindow, Quality, RenditionManifest};
pub use transport::{HttpClient, ResponseSnapshot, TransportOverrides, create_client};
