//! Ordered probing of a single node
//!
//! Required probes run first and stop the sequence on the first failure, so
//! a dead node costs at most one timeout. Best-effort probes never stop it.
//! Nodes that pass get a display name from the geo lookup and the renamer.

use crate::proxy::client::ProbeClient;
use crate::proxy::geo::GeoLookup;
use crate::proxy::models::{ProbeFailure, ProbeVerdict, Service, ServiceAvailability};
use crate::proxy::probes::ProbePlan;
use crate::proxy::rename::{Renamer, UNRECOGNIZED};
use std::sync::Arc;

/// Result of running the probe sequence against one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceOutcome {
    Passed {
        services: ServiceAvailability,
        display_name: String,
    },
    Rejected {
        service: Service,
        failure: ProbeFailure,
    },
}

pub struct ProbeSequencer {
    plan: ProbePlan,
    geo: Arc<dyn GeoLookup>,
    renamer: Arc<dyn Renamer>,
}

impl ProbeSequencer {
    pub fn new(plan: ProbePlan, geo: Arc<dyn GeoLookup>, renamer: Arc<dyn Renamer>) -> Self {
        Self { plan, geo, renamer }
    }

    pub async fn run(&self, client: &ProbeClient) -> SequenceOutcome {
        let mut services = ServiceAvailability::default();

        for probe in &self.plan.required {
            let service = probe.service();
            match probe.probe(client).await {
                Ok(true) => services.set(service, true),
                Ok(false) => {
                    return SequenceOutcome::Rejected {
                        service,
                        failure: ProbeFailure::Negative,
                    }
                }
                Err(e) => {
                    return SequenceOutcome::Rejected {
                        service,
                        failure: ProbeFailure::Error(e.to_string()),
                    }
                }
            }
        }

        for probe in &self.plan.best_effort {
            let service = probe.service();
            let verdict = ProbeVerdict::from_result(probe.probe(client).await);
            if let ProbeVerdict::Errored(error) = &verdict {
                tracing::debug!(%service, %error, "best-effort probe failed, recording unreachable");
            }
            services.set(service, verdict.is_reachable());
        }

        SequenceOutcome::Passed {
            services,
            display_name: self.display_name(client).await,
        }
    }

    /// Country of the node's exit address passed through the renamer
    async fn display_name(&self, client: &ProbeClient) -> String {
        let ip = match self.geo.public_ip(client).await {
            Ok(ip) => ip,
            Err(e) => {
                tracing::debug!(error = %e, "public ip lookup failed");
                String::new()
            }
        };

        let country = self.geo.country_name(&ip);
        let name = if country.is_empty() {
            UNRECOGNIZED.to_string()
        } else {
            country
        };
        self.renamer.rename(&name)
    }
}
