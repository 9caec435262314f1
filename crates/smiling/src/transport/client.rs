use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::{CONTENT_TYPE, HOST, HeaderMap, LOCATION};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use super::tls::build_tls_config;
use super::{ConnectionTrace, OverrideResolver, TransportOverrides};
use crate::{DownloadError, DownloaderConfig};

/// The last document-style response body, kept for diagnostic capture.
#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    pub url: Url,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl ResponseSnapshot {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// HTTP client carrying the transport policy: host overrides, connection
/// retries, manual redirects and rejection of non-success statuses.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    // One stack per overridden logical host
    dedicated: HashMap<String, Client>,
    config: Arc<DownloaderConfig>,
    overrides: Arc<TransportOverrides>,
    trace: Arc<ConnectionTrace>,
    last_response: Arc<Mutex<Option<ResponseSnapshot>>>,
}

/// Create an [`HttpClient`] with the provided configuration
pub fn create_client(config: &DownloaderConfig) -> Result<HttpClient, DownloadError> {
    let overrides = Arc::new(TransportOverrides::from_config(config)?);
    let trace = Arc::new(ConnectionTrace::new());

    let inner = build_client(config, Arc::new(TransportOverrides::default()), &trace)?;
    let mut dedicated = HashMap::new();
    for host in overrides.hosts() {
        let scoped = Arc::new(overrides.scoped(host));
        dedicated.insert(host.to_owned(), build_client(config, scoped, &trace)?);
    }

    if !overrides.is_empty() {
        debug!(hosts = ?config.hosts, sni_hostname = ?config.sni_hostname, "Transport overrides enabled");
    }

    Ok(HttpClient {
        inner,
        dedicated,
        config: Arc::new(config.clone()),
        overrides,
        trace,
        last_response: Arc::new(Mutex::new(None)),
    })
}

fn build_client(
    config: &DownloaderConfig,
    overrides: Arc<TransportOverrides>,
    trace: &Arc<ConnectionTrace>,
) -> Result<Client, DownloadError> {
    let tls_config = build_tls_config(Arc::clone(&overrides), Arc::clone(trace))?;
    let resolver = OverrideResolver::new(overrides, Arc::clone(trace));

    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(config.concurrency.max(1))
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .use_preconfigured_tls(tls_config)
        .dns_resolver(Arc::new(resolver))
        .redirect(reqwest::redirect::Policy::none());

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    Ok(client_builder.build()?)
}

type Decorate<'a> = &'a (dyn Fn(RequestBuilder) -> RequestBuilder + Send + Sync);

impl HttpClient {
    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    /// GET a page, playlist or other document; the body is remembered for diagnostics.
    pub async fn get_document(&self, url: &Url) -> Result<Bytes, DownloadError> {
        let (final_url, response) = self
            .execute(Method::GET, url, &|rb: RequestBuilder| rb)
            .await?;
        self.read_document(final_url, response).await
    }

    /// GET binary content such as segments or keys; nothing is remembered.
    pub async fn get_bytes(&self, url: &Url) -> Result<Bytes, DownloadError> {
        let (_, response) = self
            .execute(Method::GET, url, &|rb: RequestBuilder| rb)
            .await?;
        Ok(response.bytes().await?)
    }

    /// POST a JSON body; the response body is remembered for diagnostics.
    pub async fn post_json<T>(
        &self,
        url: &Url,
        headers: HeaderMap,
        body: &T,
    ) -> Result<Bytes, DownloadError>
    where
        T: Serialize + Sync + ?Sized,
    {
        let decorate = move |rb: RequestBuilder| rb.headers(headers.clone()).json(body);
        let (final_url, response) = self.execute(Method::POST, url, &decorate).await?;
        self.read_document(final_url, response).await
    }

    pub fn last_response(&self) -> Option<ResponseSnapshot> {
        self.last_response.lock().clone()
    }

    async fn read_document(&self, url: Url, response: Response) -> Result<Bytes, DownloadError> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;
        *self.last_response.lock() = Some(ResponseSnapshot {
            url,
            content_type,
            body: body.clone(),
        });
        Ok(body)
    }

    /// Sends the request, following redirects through the override table.
    /// Anything that is neither a redirect nor a success fails with a status error.
    async fn execute(
        &self,
        method: Method,
        url: &Url,
        decorate: Decorate<'_>,
    ) -> Result<(Url, Response), DownloadError> {
        let mut current = url.clone();
        let mut method = method;
        let mut decorated = true;

        for _ in 0..=self.config.max_redirects {
            let response = if decorated {
                self.send_with_retries(&method, &current, decorate).await?
            } else {
                self.send_with_retries(&method, &current, &|rb: RequestBuilder| rb)
                    .await?
            };
            let status = response.status();
            self.trace.record(
                current.host_str().unwrap_or_default(),
                "receive_response",
                current.as_str(),
            );

            if status.is_success() {
                return Ok((current, response));
            }
            if !status.is_redirection() {
                return Err(DownloadError::Status {
                    status,
                    url: current,
                });
            }

            let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
            else {
                return Err(DownloadError::Status {
                    status,
                    url: current,
                });
            };
            let next = current.join(location)?;
            debug!(from = %current, to = %next, status = %status, "Following redirect");

            if status == StatusCode::SEE_OTHER
                || (method == Method::POST
                        && (status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND))
            {
                method = Method::GET;
                decorated = false;
            }
            current = next;
        }

        Err(DownloadError::Status {
            status: StatusCode::LOOP_DETECTED,
            url: current,
        })
    }

    async fn send_with_retries(
        &self,
        method: &Method,
        url: &Url,
        decorate: Decorate<'_>,
    ) -> Result<Response, DownloadError> {
        let route = self.overrides.route(url)?;
        let client = route
            .logical_host
            .as_deref()
            .and_then(|host| self.dedicated.get(host))
            .unwrap_or(&self.inner);
        let host = url.host_str().unwrap_or_default();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut request_builder = client.request(method.clone(), route.target.clone());
            if let Some(host_header) = &route.host_header {
                request_builder = request_builder.header(HOST, host_header);
            }
            request_builder = decorate(request_builder);

            self.trace.record(host, "send_request", url.as_str());
            match request_builder.send().await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let err = DownloadError::from(e);
                    if !err.is_retryable() || attempts > self.config.retries {
                        return Err(err);
                    }
                    let delay = self.config.retry_delay(attempts);
                    warn!(url = %url, attempt = attempts, error = %err, delay = ?delay, "Connection failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
