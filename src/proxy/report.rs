//! Final report of a checking run

use crate::proxy::models::{CheckOutcome, NodeDefinition, Service};
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct CheckReport {
    /// Nodes collected from the subscriptions
    pub total: usize,
    /// Nodes whose probing started
    pub processed: u64,
    /// Nodes that passed the required probes
    pub available: u64,
    /// Available nodes in completion order
    pub outcomes: Vec<CheckOutcome>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct Subscription<'a> {
    proxies: Vec<&'a NodeDefinition>,
}

impl CheckReport {
    /// Outcomes whose node name does not match `exclude`
    pub fn retained<'a>(&'a self, exclude: Option<&Regex>) -> Vec<&'a CheckOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| match (exclude, outcome.node.name()) {
                (Some(regex), Some(name)) => !regex.is_match(name),
                _ => true,
            })
            .collect()
    }

    /// Number of available nodes reaching each service
    pub fn service_counts(&self) -> BTreeMap<Service, usize> {
        Service::ALL
            .into_iter()
            .map(|service| {
                let count = self
                    .outcomes
                    .iter()
                    .filter(|outcome| outcome.services.get(service))
                    .count();
                (service, count)
            })
            .collect()
    }

    /// Available nodes as a Clash subscription document
    pub fn to_subscription_yaml(&self, exclude: Option<&Regex>) -> Result<String> {
        let subscription = Subscription {
            proxies: self
                .retained(exclude)
                .into_iter()
                .map(|outcome| &outcome.node)
                .collect(),
        };
        Ok(serde_yaml::to_string(&subscription)?)
    }

    /// Write the available nodes to a subscription file
    pub fn save_subscription<P: AsRef<Path>>(&self, path: P, exclude: Option<&Regex>) -> Result<usize> {
        let path = path.as_ref();
        let yaml = self.to_subscription_yaml(exclude)?;
        fs::write(path, yaml).with_context(|| format!("failed to write {:?}", path))?;
        Ok(self.retained(exclude).len())
    }
}
