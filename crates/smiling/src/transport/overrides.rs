use std::collections::HashMap;

use url::Url;

use crate::{DownloadError, DownloaderConfig};

/// Routing table consulted by the resolver, the certificate verifier and the client.
///
/// A logical host listed in `hosts` is connected to the configured address
/// instead of its DNS answer. If it also has an `sni_hostname` entry, the
/// connection is addressed to that name (so it is what the TLS handshake
/// presents) while the `Host` header keeps the logical name and the
/// certificate is still checked against the logical name.
///
/// Each overridden host gets its own connection stack built from
/// [`TransportOverrides::scoped`]; every other request goes through a stack
/// with no overrides, so a plain request to a name that happens to be some
/// host's handshake name is never rerouted.
#[derive(Debug, Clone, Default)]
pub struct TransportOverrides {
    hosts: HashMap<String, String>,
    sni_hostname: HashMap<String, String>,
    logical_by_server_name: HashMap<String, String>,
}

/// Where a request is actually sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// URL handed to the HTTP stack; its host is the handshake name
    pub target: Url,
    /// `Host` header value, set whenever the logical host is overridden
    pub host_header: Option<String>,
    /// Overridden logical host whose connection stack must carry the request
    pub logical_host: Option<String>,
}

impl TransportOverrides {
    pub fn new(
        hosts: HashMap<String, String>,
        sni_hostname: HashMap<String, String>,
    ) -> Result<Self, DownloadError> {
        let mut logical_by_server_name = HashMap::new();
        for host in hosts.keys() {
            let Some(server_name) = sni_hostname.get(host) else {
                continue;
            };
            if server_name == host {
                continue;
            }
            if hosts.contains_key(server_name) {
                return Err(DownloadError::Config(format!(
                    "handshake name {server_name} for {host} is itself an overridden host"
                )));
            }
            if let Some(previous) = logical_by_server_name.insert(server_name.clone(), host.clone())
            {
                return Err(DownloadError::Config(format!(
                    "handshake name {server_name} is shared by {previous} and {host}"
                )));
            }
        }
        Ok(Self {
            hosts,
            sni_hostname,
            logical_by_server_name,
        })
    }

    pub fn from_config(config: &DownloaderConfig) -> Result<Self, DownloadError> {
        Self::new(config.hosts.clone(), config.sni_hostname.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Overridden logical hosts.
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    /// Table holding only the entries for `host`.
    pub fn scoped(&self, host: &str) -> Self {
        let keep = |map: &HashMap<String, String>| {
            map.get_key_value(host)
                .map(|(k, v)| HashMap::from([(k.clone(), v.clone())]))
                .unwrap_or_default()
        };
        let hosts = keep(&self.hosts);
        let sni_hostname = if hosts.is_empty() {
            HashMap::new()
        } else {
            keep(&self.sni_hostname)
        };
        let logical_by_server_name = self
            .logical_by_server_name
            .iter()
            .filter(|(_, logical)| logical.as_str() == host)
            .map(|(server, logical)| (server.clone(), logical.clone()))
            .collect();
        Self {
            hosts,
            sni_hostname,
            logical_by_server_name,
        }
    }

    /// Name presented during the handshake with `host`.
    pub fn server_name<'a>(&'a self, host: &'a str) -> &'a str {
        if self.hosts.contains_key(host) {
            self.sni_hostname.get(host).map_or(host, String::as_str)
        } else {
            host
        }
    }

    /// Logical host behind a handshake name; identity for names that are not overrides.
    pub fn logical_host<'a>(&'a self, server_name: &'a str) -> &'a str {
        self.logical_by_server_name
            .get(server_name)
            .map_or(server_name, String::as_str)
    }

    /// Address to connect to for a name seen by the resolver.
    pub fn address<'a>(&'a self, name: &'a str) -> &'a str {
        let logical = self.logical_host(name);
        self.hosts.get(logical).map_or(name, String::as_str)
    }

    pub fn route(&self, url: &Url) -> Result<Route, DownloadError> {
        let direct = || Route {
            target: url.clone(),
            host_header: None,
            logical_host: None,
        };
        let Some(host) = url.host_str() else {
            return Ok(direct());
        };
        if !self.hosts.contains_key(host) {
            return Ok(direct());
        }

        let host_header = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };
        let server_name = self.server_name(host);
        let mut target = url.clone();
        if server_name != host {
            target.set_host(Some(server_name))?;
        }
        Ok(Route {
            target,
            host_header: Some(host_header),
            logical_host: Some(host.to_owned()),
        })
    }
}
