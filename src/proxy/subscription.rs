//! Subscription fetching
//!
//! This module provides functionality for:
//! - Downloading subscription documents with linear retry backoff
//! - Extracting node definitions from the `proxies` list of a document
//! - Tolerating malformed documents and entries without failing the run

use crate::proxy::models::NodeDefinition;
use reqwest::Client;
use serde_yaml::Value;
use std::time::Duration;
use thiserror::Error;

/// Default timeout for a single subscription request in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of attempts per subscription URL
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Default user agent; subscription servers key the document format on it
pub const DEFAULT_USER_AGENT: &str = "clash.meta";

/// Field of a subscription document holding the node list
const PROXIES_KEY: &str = "proxies";

/// Errors that abort the whole fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("subscription {url} unreachable after {attempts} attempts: {source}")]
    Unreachable {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("no nodes found in {urls} subscription(s)")]
    NoNodes { urls: usize },
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Linear retry schedule: the delay after attempt `n` is `n * backoff_unit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_unit,
        }
    }

    /// Delay before the attempt following `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt)
    }
}

/// Downloads subscriptions and flattens their node lists
pub struct SubscriptionFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl SubscriptionFetcher {
    pub fn new(user_agent: &str, retry: RetryPolicy) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client, retry })
    }

    /// Fetch every URL in order and collect all nodes.
    ///
    /// The first URL that stays unreachable after all attempts fails the
    /// whole fetch. So does ending up with no nodes at all.
    pub async fn fetch_all(&self, urls: &[String]) -> Result<Vec<NodeDefinition>, FetchError> {
        tracing::info!(count = urls.len(), "fetching subscriptions");

        let mut nodes = Vec::new();
        for url in urls {
            let body = self.fetch_body(url).await?;
            let parsed = parse_document(&body);
            tracing::info!(url = %url, nodes = parsed.len(), "subscription fetched");
            nodes.extend(parsed);
        }

        if nodes.is_empty() {
            return Err(FetchError::NoNodes { urls: urls.len() });
        }
        Ok(nodes)
    }

    async fn fetch_body(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_fetch(url).await {
                Ok(body) => return Ok(body),
                Err(source) if attempt >= self.retry.max_attempts => {
                    return Err(FetchError::Unreachable {
                        url: url.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
                Err(e) => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(
                        url,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        retry_in = ?delay,
                        error = %e,
                        "failed to fetch subscription"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<Vec<u8>, reqwest::Error> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            tracing::warn!(url, status = %response.status(), "subscription responded with non-success status");
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Extract node mappings from a subscription document.
///
/// Documents that do not parse, lack a `proxies` sequence, or hold non-mapping
/// entries contribute nothing for those parts instead of failing.
pub fn parse_document(body: &[u8]) -> Vec<NodeDefinition> {
    let document: Value = match serde_yaml::from_slice(body) {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!(error = %e, "subscription document is not valid YAML");
            return Vec::new();
        }
    };

    let Some(entries) = document.get(PROXIES_KEY).and_then(Value::as_sequence) else {
        tracing::warn!("subscription document has no '{}' list", PROXIES_KEY);
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::Mapping(mapping) => Some(NodeDefinition::from(mapping.clone())),
            other => {
                tracing::debug!(entry = ?other, "skipping non-mapping proxy entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 30);
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(29), Duration::from_secs(29));
    }

    #[test]
    fn test_retry_policy_clamps_attempts() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn test_parse_document_nodes() {
        let yaml = r#"
port: 7890
proxies:
  - {name: a, type: socks5, server: 1.1.1.1, port: 1080}
  - name: b
    type: direct
  - just-a-string
  - [1, 2]
  - {name: c, type: vmess, server: c.example, port: 443, uuid: x}
"#;
        let nodes = parse_document(yaml.as_bytes());
        let names: Vec<_> = nodes.iter().filter_map(|n| n.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_document_without_proxies() {
        assert!(parse_document(b"port: 7890\nmode: rule\n").is_empty());
        assert!(parse_document(b"proxies: not-a-list\n").is_empty());
        assert!(parse_document(b"proxies:\n").is_empty());
    }

    #[test]
    fn test_parse_document_not_a_mapping() {
        assert!(parse_document(b"<html><body>Not found</body></html>").is_empty());
        assert!(parse_document(b"- a\n- b\n").is_empty());
        assert!(parse_document(b"").is_empty());
        assert!(parse_document(b"proxies: [unclosed").is_empty());
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::NoNodes { urls: 2 };
        assert_eq!(err.to_string(), "no nodes found in 2 subscription(s)");
    }
}
