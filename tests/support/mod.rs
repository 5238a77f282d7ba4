#![allow(dead_code)]

use async_trait::async_trait;
use axum::{http::StatusCode, routing::get, Router};
use node_checker::{
    BoxedStream, Destination, Dialer, GeoLookup, NodeDefinition, ProbeClient, ProxyAdapter,
    Renamer, Result,
};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

/// Serve `router` on an ephemeral local port and return the port
pub async fn serve(router: Router) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    port
}

/// A local port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Upstream that answers every probe positively
pub fn healthy_upstream() -> Router {
    Router::new()
        .route("/generate_204", get(|| async { StatusCode::NO_CONTENT }))
        .fallback(|| async { "fl=1\nip=203.0.113.7\n" })
}

/// Upstream that passes the CDN probe but fails the search probe
pub fn cdn_only_upstream() -> Router {
    Router::new()
        .route(
            "/generate_204",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        )
        .fallback(|| async { "fl=1\nip=203.0.113.8\n" })
}

/// Ignores the requested destination and connects to a fixed local port,
/// like a transparent proxy in front of a fake internet
pub struct ForwardDialer {
    pub upstream: u16,
}

#[async_trait]
impl Dialer for ForwardDialer {
    async fn connect(&self, _destination: &Destination) -> Result<BoxedStream> {
        let stream = TcpStream::connect(("127.0.0.1", self.upstream)).await?;
        Ok(Box::new(stream))
    }
}

/// Accepts `type: forward` nodes whose `port` points at a local upstream
pub struct ForwardAdapter;

impl ProxyAdapter for ForwardAdapter {
    fn construct(&self, node: &NodeDefinition) -> Result<Arc<dyn Dialer>> {
        match (node.protocol(), node.port()) {
            (Some("forward"), Some(upstream)) => Ok(Arc::new(ForwardDialer { upstream })),
            _ => anyhow::bail!("unsupported node {}", node),
        }
    }
}

pub fn forward_node(name: &str, upstream: u16) -> NodeDefinition {
    NodeDefinition::new()
        .with("name", name)
        .with("type", "forward")
        .with("server", "127.0.0.1")
        .with("port", i64::from(upstream))
}

/// Fixed public IP and country
pub struct StaticGeo {
    pub country: &'static str,
}

#[async_trait]
impl GeoLookup for StaticGeo {
    async fn public_ip(&self, _client: &ProbeClient) -> Result<String> {
        Ok("203.0.113.7".to_string())
    }

    fn country_name(&self, _ip: &str) -> String {
        self.country.to_string()
    }
}

/// Renames with a visible marker so tests can tell renamed names apart
pub struct TagRenamer;

impl Renamer for TagRenamer {
    fn rename(&self, name: &str) -> String {
        format!("[{}]", name)
    }
}

/// Dialer whose connections never complete
pub struct StalledDialer;

#[async_trait]
impl Dialer for StalledDialer {
    async fn connect(&self, _destination: &Destination) -> Result<BoxedStream> {
        std::future::pending::<Result<BoxedStream>>().await
    }
}

/// Accepts every node and hands out a [`StalledDialer`]
pub struct StalledAdapter;

impl ProxyAdapter for StalledAdapter {
    fn construct(&self, _node: &NodeDefinition) -> Result<Arc<dyn Dialer>> {
        Ok(Arc::new(StalledDialer))
    }
}
