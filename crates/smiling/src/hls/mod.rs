// HLS acquisition: manifest resolution, concurrent fetching and decryption.

pub mod decryption;
pub mod expiry;
pub mod fetcher;
pub mod playlist;
pub mod quality;
pub mod scheduler;

// Re-exports for easier access
pub use decryption::StreamDecryptor;
pub use expiry::{Deadline, ExpiryWindow};
pub use fetcher::ResourceFetcher;
pub use playlist::{KeyInfo, ManifestResolver, RenditionManifest};
pub use quality::Quality;
pub use scheduler::{FetchJob, FetchScheduler, FetchedStream};
