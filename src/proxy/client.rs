//! Per-node HTTP clients
//!
//! Every connection a [`ProbeClient`] opens goes through the dialer of a
//! single node. Connections are never pooled, so each probe starts from a
//! fresh transport.

use crate::proxy::adapter::{BoxedStream, Destination, Dialer, ProxyAdapter};
use crate::proxy::models::NodeDefinition;
use crate::Result;
use anyhow::anyhow;
use futures::future::BoxFuture;
use hyper::body::Bytes;
use hyper::client::connect::{Connected, Connection};
use hyper::header::USER_AGENT;
use hyper::service::Service;
use hyper::{Body, Client, Request, StatusCode, Uri};
use hyper_tls::HttpsConnector;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// How long an idle connection may be kept before it is dropped
pub const IDLE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// User agent sent with every probe request
const PROBE_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Builds [`ProbeClient`]s for nodes using a proxy adapter
pub struct ClientFactory {
    adapter: Arc<dyn ProxyAdapter>,
    timeout: Duration,
    tls: tokio_native_tls::TlsConnector,
}

impl ClientFactory {
    pub fn new(adapter: Arc<dyn ProxyAdapter>, timeout: Duration) -> Result<Self> {
        let tls = native_tls::TlsConnector::new()?;
        Ok(Self {
            adapter,
            timeout,
            tls: tls.into(),
        })
    }

    /// Build a client for the node, or `None` when the adapter rejects it.
    ///
    /// A rejected node is not an error for the run; the caller skips it.
    pub fn create(&self, node: &NodeDefinition) -> Option<ProbeClient> {
        match self.adapter.construct(node) {
            Ok(dialer) => Some(self.client_for(dialer)),
            Err(e) => {
                tracing::debug!(node = %node, error = %e, "proxy adapter rejected node");
                None
            }
        }
    }

    /// Build a client around an existing dialer
    pub fn client_for(&self, dialer: Arc<dyn Dialer>) -> ProbeClient {
        let connector = HttpsConnector::from((DialConnector::new(dialer), self.tls.clone()));
        let inner = Client::builder()
            .pool_idle_timeout(IDLE_CONNECTION_TIMEOUT)
            .pool_max_idle_per_host(0)
            .build::<_, Body>(connector);

        ProbeClient {
            inner,
            timeout: self.timeout,
        }
    }
}

/// Response of a single probe request, body fully read
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ProbeResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP client bound to one node
#[derive(Clone)]
pub struct ProbeClient {
    inner: Client<HttpsConnector<DialConnector>, Body>,
    timeout: Duration,
}

impl ProbeClient {
    /// GET `url` through the node.
    ///
    /// The timeout covers connecting, the response head and the body.
    pub async fn get(&self, url: &str) -> Result<ProbeResponse> {
        let request = Request::get(url)
            .header(USER_AGENT, PROBE_USER_AGENT)
            .body(Body::empty())?;

        let exchange = async {
            let response = self.inner.request(request).await?;
            let status = response.status();
            let body = hyper::body::to_bytes(response.into_body()).await?;
            Ok::<_, anyhow::Error>(ProbeResponse { status, body })
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| anyhow!("request to {} timed out after {:?}", url, self.timeout))?
    }
}

/// Address to dial for a request URI, with the scheme's default port filled in
fn dial_address(uri: &Uri) -> Result<String> {
    let host = uri
        .host()
        .ok_or_else(|| anyhow!("request uri {} has no host", uri))?;
    let port = uri.port_u16().unwrap_or(match uri.scheme_str() {
        Some("https") => 443,
        _ => 80,
    });
    if host.contains(':') && !host.starts_with('[') {
        Ok(format!("[{}]:{}", host, port))
    } else {
        Ok(format!("{}:{}", host, port))
    }
}

/// hyper connector that hands every connection to a node dialer
#[derive(Clone)]
pub struct DialConnector {
    dialer: Arc<dyn Dialer>,
}

impl DialConnector {
    pub fn new(dialer: Arc<dyn Dialer>) -> Self {
        Self { dialer }
    }
}

impl Service<Uri> for DialConnector {
    type Response = DialedStream;
    type Error = BoxError;
    type Future = BoxFuture<'static, std::result::Result<DialedStream, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), BoxError>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let dialer = Arc::clone(&self.dialer);
        Box::pin(async move {
            let destination = Destination::parse(&dial_address(&uri)?)?;
            let inner = dialer.connect(&destination).await?;
            Ok::<_, BoxError>(DialedStream { inner })
        })
    }
}

/// Stream returned by [`DialConnector`]
pub struct DialedStream {
    inner: BoxedStream,
}

impl Connection for DialedStream {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}

impl AsyncRead for DialedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for DialedStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
