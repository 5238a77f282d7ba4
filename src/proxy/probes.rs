//! Service reachability probes

use crate::proxy::client::{ProbeClient, ProbeResponse};
use crate::proxy::models::Service;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Checks whether one service is reachable through a node
#[async_trait]
pub trait ServiceProbe: Send + Sync {
    fn service(&self) -> Service;

    async fn probe(&self, client: &ProbeClient) -> Result<bool>;
}

/// What a probe response must look like to count as reachable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// Any 2xx status
    Success,
    /// Exactly this status
    Status(u16),
    /// 2xx status and the body contains the marker
    BodyContains(String),
    /// Any status, as long as the body does not contain the marker
    BodyLacks(String),
}

impl Expectation {
    pub fn matches(&self, response: &ProbeResponse) -> bool {
        match self {
            Expectation::Success => response.status.is_success(),
            Expectation::Status(code) => response.status.as_u16() == *code,
            Expectation::BodyContains(marker) => {
                response.status.is_success() && response.text().contains(marker.as_str())
            }
            Expectation::BodyLacks(marker) => !response.text().contains(marker.as_str()),
        }
    }
}

/// Probe made of a single GET and an expectation on the response
#[derive(Debug, Clone)]
pub struct HttpProbe {
    service: Service,
    url: String,
    expectation: Expectation,
}

impl HttpProbe {
    pub fn new(service: Service, url: impl Into<String>, expectation: Expectation) -> Self {
        Self {
            service,
            url: url.into(),
            expectation,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Default probe for a service
    pub fn for_service(service: Service) -> Self {
        match service {
            Service::Cloudflare => Self::new(
                service,
                "https://www.cloudflare.com/cdn-cgi/trace",
                Expectation::BodyContains("ip=".to_string()),
            ),
            Service::Google => Self::new(
                service,
                "https://www.google.com/generate_204",
                Expectation::Status(204),
            ),
            Service::Openai => Self::new(
                service,
                "https://api.openai.com/compliance/cookie_requirements",
                Expectation::BodyLacks("unsupported_country".to_string()),
            ),
            Service::Youtube => Self::new(
                service,
                "https://www.youtube.com/premium",
                Expectation::BodyLacks("Premium is not available in your country".to_string()),
            ),
            Service::Netflix => Self::new(
                service,
                "https://www.netflix.com/title/81280792",
                Expectation::Status(200),
            ),
            Service::Disney => Self::new(
                service,
                "https://www.disneyplus.com/",
                Expectation::Success,
            ),
        }
    }
}

#[async_trait]
impl ServiceProbe for HttpProbe {
    fn service(&self) -> Service {
        self.service
    }

    async fn probe(&self, client: &ProbeClient) -> Result<bool> {
        let response = client.get(&self.url).await?;
        Ok(self.expectation.matches(&response))
    }
}

/// Probes run for every node, in order
#[derive(Clone)]
pub struct ProbePlan {
    /// Gate probes; the first failure rejects the node
    pub required: Vec<Arc<dyn ServiceProbe>>,
    /// Informational probes; failures only clear the service flag
    pub best_effort: Vec<Arc<dyn ServiceProbe>>,
}

impl ProbePlan {
    pub fn new(
        required: Vec<Arc<dyn ServiceProbe>>,
        best_effort: Vec<Arc<dyn ServiceProbe>>,
    ) -> Self {
        Self {
            required,
            best_effort,
        }
    }
}

impl Default for ProbePlan {
    /// Cloudflare and Google gate the node; the streaming and AI services
    /// are best-effort.
    fn default() -> Self {
        let probe = |service| Arc::new(HttpProbe::for_service(service)) as Arc<dyn ServiceProbe>;
        Self {
            required: vec![probe(Service::Cloudflare), probe(Service::Google)],
            best_effort: vec![
                probe(Service::Openai),
                probe(Service::Youtube),
                probe(Service::Netflix),
                probe(Service::Disney),
            ],
        }
    }
}
