//! Node checker driving a complete run

use crate::proxy::adapter::{BuiltinAdapter, ProxyAdapter};
use crate::proxy::aggregator::Aggregator;
use crate::proxy::client::ClientFactory;
use crate::proxy::config::RunConfig;
use crate::proxy::geo::{GeoLookup, MmdbGeoLookup};
use crate::proxy::models::{CheckOutcome, NodeDefinition, NodeVerdict, SkipReason};
use crate::proxy::probes::ProbePlan;
use crate::proxy::progress::{spawn_progress_reporter, PROGRESS_INTERVAL};
use crate::proxy::rename::{FlagRenamer, Renamer};
use crate::proxy::report::CheckReport;
use crate::proxy::scheduler::{NodeHandler, WorkerPool};
use crate::proxy::sequencer::{ProbeSequencer, SequenceOutcome};
use crate::proxy::subscription::{RetryPolicy, SubscriptionFetcher};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// External pieces a run depends on
#[derive(Clone)]
pub struct Collaborators {
    pub adapter: Arc<dyn ProxyAdapter>,
    pub plan: ProbePlan,
    pub geo: Arc<dyn GeoLookup>,
    pub renamer: Arc<dyn Renamer>,
    pub retry: RetryPolicy,
}

impl Collaborators {
    /// Built-in adapter, HTTP probes, MMDB geo lookup and flag renamer
    pub fn builtin(config: &RunConfig) -> Self {
        Self {
            adapter: Arc::new(BuiltinAdapter),
            plan: ProbePlan::default(),
            geo: Arc::new(MmdbGeoLookup::from_optional_path(config.mmdb_path.as_deref())),
            renamer: Arc::new(FlagRenamer),
            retry: RetryPolicy::default(),
        }
    }
}

/// Checks one node at a time on behalf of a pool worker
struct NodeWorker {
    factory: ClientFactory,
    sequencer: ProbeSequencer,
    aggregator: Arc<Aggregator>,
}

impl NodeWorker {
    async fn check(&self, mut node: NodeDefinition) -> NodeVerdict {
        let Some(client) = self.factory.create(&node) else {
            return NodeVerdict::Skipped(SkipReason::NoClient);
        };
        self.aggregator.mark_processed();

        match self.sequencer.run(&client).await {
            SequenceOutcome::Passed {
                services,
                display_name,
            } => {
                node.set_name(display_name);
                NodeVerdict::Available(CheckOutcome::new(node, services))
            }
            SequenceOutcome::Rejected { service, failure } => {
                NodeVerdict::Skipped(SkipReason::RequiredProbeFailed { service, failure })
            }
        }
    }
}

#[async_trait]
impl NodeHandler for NodeWorker {
    async fn handle(&self, node: NodeDefinition) {
        let label = node.to_string();
        match self.check(node).await {
            NodeVerdict::Available(outcome) => {
                tracing::debug!(node = %label, name = ?outcome.node.name(), "node available");
                self.aggregator.record(outcome);
            }
            NodeVerdict::Skipped(reason) => {
                tracing::debug!(node = %label, %reason, "node skipped");
            }
        }
    }
}

/// Runs fetch, check and collection for one configuration
pub struct NodeChecker {
    config: RunConfig,
    collaborators: Collaborators,
}

impl NodeChecker {
    /// Create a checker using the built-in collaborators
    pub fn new(config: RunConfig) -> Self {
        let collaborators = Collaborators::builtin(&config);
        Self::with_collaborators(config, collaborators)
    }

    pub fn with_collaborators(config: RunConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
        }
    }

    /// Fetch the configured subscriptions
    pub async fn fetch_nodes(&self) -> Result<Vec<NodeDefinition>> {
        let fetcher = SubscriptionFetcher::new(&self.config.user_agent, self.collaborators.retry)?;
        Ok(fetcher.fetch_all(&self.config.sub_urls).await?)
    }

    /// Fetch all subscriptions and check every node.
    ///
    /// Fails only when fetching fails; individual node failures just leave
    /// the node out of the report.
    pub async fn start(&self) -> Result<CheckReport> {
        let nodes = self.fetch_nodes().await?;
        tracing::info!(nodes = nodes.len(), "nodes collected");
        self.check_nodes(nodes).await
    }

    /// Check an already collected node list
    pub async fn check_nodes(&self, nodes: Vec<NodeDefinition>) -> Result<CheckReport> {
        self.config.validate()?;
        let total = nodes.len();
        let aggregator = Arc::new(Aggregator::new());
        let worker = Arc::new(NodeWorker {
            factory: ClientFactory::new(
                Arc::clone(&self.collaborators.adapter),
                self.config.timeout(),
            )?,
            sequencer: ProbeSequencer::new(
                self.collaborators.plan.clone(),
                Arc::clone(&self.collaborators.geo),
                Arc::clone(&self.collaborators.renamer),
            ),
            aggregator: Arc::clone(&aggregator),
        });

        // Stops the reporter even when this future is dropped mid-run
        let shutdown = CancellationToken::new();
        let _stop_reporter = shutdown.clone().drop_guard();
        let reporter = self.config.print_progress.then(|| {
            spawn_progress_reporter(
                Arc::clone(&aggregator),
                total,
                shutdown.clone(),
                PROGRESS_INTERVAL,
            )
        });

        let pool = WorkerPool::new(self.config.concurrency());
        tracing::info!(
            workers = pool.workers(),
            timeout = ?self.config.timeout(),
            "starting checks"
        );
        pool.run(nodes, worker).await;

        shutdown.cancel();
        if let Some(reporter) = reporter {
            if let Err(e) = reporter.await {
                tracing::warn!(error = %e, "progress reporter failed");
            }
        }

        let (outcomes, counts) = aggregator.finish();
        tracing::info!(
            total,
            processed = counts.processed,
            available = counts.available,
            "check finished"
        );

        Ok(CheckReport {
            total,
            processed: counts.processed,
            available: counts.available,
            outcomes,
            finished_at: Utc::now(),
        })
    }
}
