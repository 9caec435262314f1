use std::error::Error as StdError;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::dns::{Addrs, Name, Resolve, Resolving};

use super::{ConnectionTrace, TransportOverrides};

/// DNS hook that sends overridden hosts to their configured address.
#[derive(Debug, Clone)]
pub struct OverrideResolver {
    overrides: Arc<TransportOverrides>,
    trace: Arc<ConnectionTrace>,
}

impl OverrideResolver {
    pub fn new(overrides: Arc<TransportOverrides>, trace: Arc<ConnectionTrace>) -> Self {
        Self { overrides, trace }
    }
}

impl Resolve for OverrideResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let requested = name.as_str().to_owned();
        let overrides = &self.overrides;
        let target = overrides.address(&requested).to_owned();
        self.trace
            .record(overrides.logical_host(&requested), "connect_tcp", &target);
        Box::pin(resolve_addrs(target))
    }
}

async fn resolve_addrs(target: String) -> Result<Addrs, Box<dyn StdError + Send + Sync>> {
    // The connector fills in the URL's port.
    let addrs = lookup(&target, 0).await?;
    Ok(Box::new(addrs.into_iter()))
}

/// Socket addresses for `address`, which may be a literal IP or another host name.
pub async fn lookup(address: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((address, port)).await?.collect();
    if addrs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses found for {address}"),
        ));
    }
    Ok(addrs)
}
