//! Node and check result data models

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;

/// Key holding the display name of a node
const NAME_KEY: &str = "name";

/// A single proxy node as listed in a subscription document.
///
/// Keys keep their document order. Protocol specific fields are kept as-is;
/// only the common ones get typed accessors.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeDefinition(Mapping);

impl NodeDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly useful for constructing nodes by hand
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(Value::from(key), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Read a port-like field, accepting both numbers and numeric strings
    pub fn get_u16(&self, key: &str) -> Option<u16> {
        match self.get(key)? {
            Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str(NAME_KEY)
    }

    /// Overwrite the display name
    pub fn set_name(&mut self, name: impl Into<String>) {
        let name: String = name.into();
        self.0.insert(Value::from(NAME_KEY), Value::from(name));
    }

    /// Protocol dialect, stored under `type`
    pub fn protocol(&self) -> Option<&str> {
        self.get_str("type")
    }

    pub fn server(&self) -> Option<&str> {
        self.get_str("server")
    }

    pub fn port(&self) -> Option<u16> {
        self.get_u16("port")
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Mapping> for NodeDefinition {
    fn from(mapping: Mapping) -> Self {
        Self(mapping)
    }
}

impl fmt::Display for NodeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {}:{})",
            self.name().unwrap_or("<unnamed>"),
            self.protocol().unwrap_or("?"),
            self.server().unwrap_or("?"),
            self.port().unwrap_or(0)
        )
    }
}

/// Named services probed for every node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Cloudflare,
    Google,
    Openai,
    Youtube,
    Netflix,
    Disney,
}

impl Service {
    pub const ALL: [Service; 6] = [
        Service::Cloudflare,
        Service::Google,
        Service::Openai,
        Service::Youtube,
        Service::Netflix,
        Service::Disney,
    ];
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Cloudflare => write!(f, "cloudflare"),
            Service::Google => write!(f, "google"),
            Service::Openai => write!(f, "openai"),
            Service::Youtube => write!(f, "youtube"),
            Service::Netflix => write!(f, "netflix"),
            Service::Disney => write!(f, "disney"),
        }
    }
}

/// Per-service reachability of one node. Probes that errored or never ran
/// stay `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAvailability {
    pub cloudflare: bool,
    pub google: bool,
    pub openai: bool,
    pub youtube: bool,
    pub netflix: bool,
    pub disney: bool,
}

impl ServiceAvailability {
    pub fn set(&mut self, service: Service, reachable: bool) {
        match service {
            Service::Cloudflare => self.cloudflare = reachable,
            Service::Google => self.google = reachable,
            Service::Openai => self.openai = reachable,
            Service::Youtube => self.youtube = reachable,
            Service::Netflix => self.netflix = reachable,
            Service::Disney => self.disney = reachable,
        }
    }

    pub fn get(&self, service: Service) -> bool {
        match service {
            Service::Cloudflare => self.cloudflare,
            Service::Google => self.google,
            Service::Openai => self.openai,
            Service::Youtube => self.youtube,
            Service::Netflix => self.netflix,
            Service::Disney => self.disney,
        }
    }
}

/// A node that passed the required probes, with its final name applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub node: NodeDefinition,
    pub services: ServiceAvailability,
}

impl CheckOutcome {
    pub fn new(node: NodeDefinition, services: ServiceAvailability) -> Self {
        Self { node, services }
    }
}

/// Why a required probe rejected a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// The probe completed and reported the service unreachable
    Negative,
    /// The probe itself failed (connect error, timeout, ...)
    Error(String),
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeFailure::Negative => write!(f, "service unreachable"),
            ProbeFailure::Error(e) => write!(f, "probe error: {}", e),
        }
    }
}

/// Result of a best-effort probe. `Errored` is recorded as unreachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeVerdict {
    Reachable,
    Unreachable,
    Errored(String),
}

impl ProbeVerdict {
    pub fn from_result(result: crate::Result<bool>) -> Self {
        match result {
            Ok(true) => ProbeVerdict::Reachable,
            Ok(false) => ProbeVerdict::Unreachable,
            Err(e) => ProbeVerdict::Errored(e.to_string()),
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeVerdict::Reachable)
    }
}

/// Why a node was left out of the results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The proxy adapter could not build a dialer for the node
    NoClient,
    RequiredProbeFailed {
        service: Service,
        failure: ProbeFailure,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoClient => write!(f, "no client for node"),
            SkipReason::RequiredProbeFailed { service, failure } => {
                write!(f, "{} check failed: {}", service, failure)
            }
        }
    }
}

/// Final verdict for one node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeVerdict {
    Available(CheckOutcome),
    Skipped(SkipReason),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_node() -> NodeDefinition {
        NodeDefinition::new()
            .with("name", "hk-01")
            .with("type", "socks5")
            .with("server", "10.0.0.1")
            .with("port", 1080)
    }

    #[test]
    fn test_node_accessors() {
        let node = sample_node();
        assert_eq!(node.name(), Some("hk-01"));
        assert_eq!(node.protocol(), Some("socks5"));
        assert_eq!(node.server(), Some("10.0.0.1"));
        assert_eq!(node.port(), Some(1080));
        assert_eq!(node.len(), 4);
    }

    #[test]
    fn test_node_port_from_string() {
        let node = NodeDefinition::new().with("port", "8388");
        assert_eq!(node.port(), Some(8388));

        let node = NodeDefinition::new().with("port", 70000);
        assert_eq!(node.port(), None);

        let node = NodeDefinition::new().with("port", "http");
        assert_eq!(node.port(), None);
    }

    #[test]
    fn test_set_name_overwrites_in_place() {
        let mut node = sample_node();
        node.set_name("Japan");
        assert_eq!(node.name(), Some("Japan"));
        assert_eq!(node.len(), 4);

        // name stays the first key
        let first = node.as_mapping().keys().next().cloned();
        assert_eq!(first, Some(Value::from("name")));
    }

    #[test]
    fn test_set_name_on_unnamed_node() {
        let mut node = NodeDefinition::new().with("type", "direct");
        assert!(node.name().is_none());
        node.set_name("direct");
        assert_eq!(node.name(), Some("direct"));
    }

    #[test]
    fn test_node_display() {
        assert_eq!(sample_node().to_string(), "hk-01 (socks5 10.0.0.1:1080)");
        assert_eq!(NodeDefinition::new().to_string(), "<unnamed> (? ?:0)");
    }

    #[test]
    fn test_node_keeps_unknown_fields() {
        let yaml = "name: a\ntype: vmess\nserver: example.com\nport: 443\nuuid: abc\nws-opts: {path: /x}\n";
        let node: NodeDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(node.get_str("uuid"), Some("abc"));
        assert!(node.get("ws-opts").and_then(Value::as_mapping).is_some());

        let back = serde_yaml::to_string(&node).unwrap();
        let reparsed: NodeDefinition = serde_yaml::from_str(&back).unwrap();
        assert_eq!(reparsed, node);
    }

    #[test]
    fn test_service_availability_set_get() {
        let mut services = ServiceAvailability::default();
        for service in Service::ALL {
            assert!(!services.get(service));
        }
        services.set(Service::Netflix, true);
        assert!(services.get(Service::Netflix));
        assert!(services.netflix);
        assert!(!services.disney);
    }

    #[test]
    fn test_probe_verdict_from_result() {
        assert_eq!(ProbeVerdict::from_result(Ok(true)), ProbeVerdict::Reachable);
        assert_eq!(ProbeVerdict::from_result(Ok(false)), ProbeVerdict::Unreachable);
        let verdict = ProbeVerdict::from_result(Err(anyhow::anyhow!("timed out")));
        assert_eq!(verdict, ProbeVerdict::Errored("timed out".to_string()));
        assert!(!verdict.is_reachable());
    }

    #[test]
    fn test_skip_reason_display() {
        let reason = SkipReason::RequiredProbeFailed {
            service: Service::Google,
            failure: ProbeFailure::Negative,
        };
        assert_eq!(reason.to_string(), "google check failed: service unreachable");
        assert_eq!(SkipReason::NoClient.to_string(), "no client for node");
    }
}
