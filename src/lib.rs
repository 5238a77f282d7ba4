//! Node Checker - Subscription Node Health Checker
//!
//! Fetches proxy subscriptions, checks every node through a bounded worker
//! pool and reports which nodes can reach a fixed set of services.

pub mod proxy;
pub mod telemetry;

pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
