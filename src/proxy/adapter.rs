//! Proxy adapters turn a node definition into something that can dial out
//!
//! Dialect parsing lives behind [`ProxyAdapter`]; the checker only needs a
//! [`Dialer`] that opens a byte stream to a destination through the node.
//! [`BuiltinAdapter`] covers `socks5` and `direct` nodes.

use crate::proxy::models::NodeDefinition;
use crate::Result;
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_socks::tcp::Socks5Stream;

/// Byte stream produced by a dialer
pub trait ProxyStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ProxyStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub type BoxedStream = Box<dyn ProxyStream>;

/// Host and port a connection is requested for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

impl Destination {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Split a `host:port` address.
    ///
    /// Bracketed IPv6 hosts are accepted. A missing port is an error, a port
    /// that does not parse is treated as `0`.
    pub fn parse(address: &str) -> Result<Self> {
        let (host, port) = if let Some(rest) = address.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| anyhow!("missing ']' in address {}", address))?;
            let port = tail
                .strip_prefix(':')
                .ok_or_else(|| anyhow!("missing port in address {}", address))?;
            (host, port)
        } else {
            let (host, port) = address
                .rsplit_once(':')
                .ok_or_else(|| anyhow!("missing port in address {}", address))?;
            if host.contains(':') {
                bail!("too many colons in address {}", address);
            }
            (host, port)
        };

        Ok(Self {
            host: host.to_string(),
            port: port.parse().unwrap_or(0),
        })
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Opens connections through one proxy node
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn connect(&self, destination: &Destination) -> Result<BoxedStream>;
}

/// Builds a dialer from a node definition
pub trait ProxyAdapter: Send + Sync {
    fn construct(&self, node: &NodeDefinition) -> Result<Arc<dyn Dialer>>;
}

/// Connects straight to the destination
#[derive(Debug, Clone, Default)]
pub struct DirectDialer;

#[async_trait]
impl Dialer for DirectDialer {
    async fn connect(&self, destination: &Destination) -> Result<BoxedStream> {
        let stream = TcpStream::connect((destination.host.as_str(), destination.port))
            .await
            .with_context(|| format!("direct connect to {}", destination))?;
        Ok(Box::new(stream))
    }
}

/// SOCKS5 upstream credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks5Auth {
    pub username: String,
    pub password: String,
}

/// Tunnels connections through a SOCKS5 server
#[derive(Debug, Clone)]
pub struct Socks5Dialer {
    server: String,
    port: u16,
    auth: Option<Socks5Auth>,
}

impl Socks5Dialer {
    pub fn new(server: String, port: u16, auth: Option<Socks5Auth>) -> Self {
        Self { server, port, auth }
    }

    fn from_node(node: &NodeDefinition) -> Result<Self> {
        let server = node
            .server()
            .ok_or_else(|| anyhow!("socks5 node is missing 'server'"))?;
        let port = node
            .port()
            .ok_or_else(|| anyhow!("socks5 node is missing a valid 'port'"))?;
        let auth = match (node.get_str("username"), node.get_str("password")) {
            (Some(username), Some(password)) => Some(Socks5Auth {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => None,
        };
        Ok(Self::new(server.to_string(), port, auth))
    }
}

#[async_trait]
impl Dialer for Socks5Dialer {
    async fn connect(&self, destination: &Destination) -> Result<BoxedStream> {
        let proxy = (self.server.as_str(), self.port);
        let target = (destination.host.as_str(), destination.port);

        let stream = match &self.auth {
            Some(auth) => {
                Socks5Stream::connect_with_password(proxy, target, &auth.username, &auth.password)
                    .await
            }
            None => Socks5Stream::connect(proxy, target).await,
        }
        .with_context(|| {
            format!(
                "socks5 connect to {} via {}:{}",
                destination, self.server, self.port
            )
        })?;

        Ok(Box::new(stream))
    }
}

/// Adapter for the dialects this crate speaks natively
#[derive(Debug, Clone, Default)]
pub struct BuiltinAdapter;

impl ProxyAdapter for BuiltinAdapter {
    fn construct(&self, node: &NodeDefinition) -> Result<Arc<dyn Dialer>> {
        match node.protocol() {
            Some("socks5") => Ok(Arc::new(Socks5Dialer::from_node(node)?)),
            Some("direct") => Ok(Arc::new(DirectDialer)),
            Some(other) => bail!("unsupported proxy type: {}", other),
            None => bail!("node has no 'type' field"),
        }
    }
}
