//! Proxy module for fetching and checking subscription nodes
//!
//! This module provides functionality for:
//! - Fetching subscription documents and extracting node definitions
//! - Opening per-node HTTP clients whose connections go through the node
//! - Probing a fixed set of services with required and best-effort probes
//! - Sharding nodes across a bounded worker pool and collecting results

pub mod adapter;
pub mod aggregator;
pub mod checker;
pub mod client;
pub mod config;
pub mod geo;
pub mod models;
pub mod probes;
pub mod progress;
pub mod rename;
pub mod report;
pub mod scheduler;
pub mod sequencer;
pub mod subscription;

pub use adapter::{BoxedStream, BuiltinAdapter, Destination, Dialer, ProxyAdapter};
pub use aggregator::{Aggregator, ProgressSnapshot};
pub use checker::{Collaborators, NodeChecker};
pub use client::{ClientFactory, ProbeClient, ProbeResponse};
pub use config::RunConfig;
pub use geo::{GeoLookup, MmdbGeoLookup};
pub use models::{
    CheckOutcome, NodeDefinition, NodeVerdict, ProbeFailure, ProbeVerdict, Service,
    ServiceAvailability, SkipReason,
};
pub use probes::{HttpProbe, ProbePlan, ServiceProbe};
pub use rename::{FlagRenamer, Renamer, UNRECOGNIZED};
pub use report::CheckReport;
pub use scheduler::{shard_ranges, NodeHandler, WorkerPool};
pub use sequencer::{ProbeSequencer, SequenceOutcome};
pub use subscription::{FetchError, RetryPolicy, SubscriptionFetcher};
