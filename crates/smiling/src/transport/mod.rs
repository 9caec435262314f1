// Transport layer: host rerouting, handshake-name overrides and the HTTP client policy.

pub mod client;
pub mod overrides;
pub mod resolver;
pub mod tls;
pub mod trace;

pub use client::{HttpClient, ResponseSnapshot, create_client};
pub use overrides::TransportOverrides;
pub use resolver::OverrideResolver;
pub use tls::OverrideVerifier;
pub use trace::ConnectionTrace;
