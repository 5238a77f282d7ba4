//! Run configuration

use crate::proxy::subscription::DEFAULT_USER_AGENT;
use crate::Result;
use anyhow::{bail, Context};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;
use std::time::Duration;

/// Default timeout for each request made through a node
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of concurrent workers
const DEFAULT_CONCURRENCY: usize = 10;

/// Settings for one checking run.
///
/// Loaded from YAML with kebab-case keys; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RunConfig {
    /// Subscription URLs to fetch nodes from
    pub sub_urls: Vec<String>,
    /// Nodes whose final name matches this pattern are left out of exports
    pub filter_regex: String,
    /// Speed test server, carried for downstream tooling
    pub server_url: String,
    /// Download transfer size for speed probes, in MB
    pub download_size: usize,
    /// Upload transfer size for speed probes, in MB
    pub upload_size: usize,
    /// Per-request timeout through a node, written in seconds
    #[serde(with = "seconds")]
    pub timeout: Duration,
    /// Number of concurrent workers
    pub concurrent: usize,
    /// Draw a progress bar while checking
    pub print_progress: bool,
    /// MMDB database used to resolve exit countries
    pub mmdb_path: Option<String>,
    /// User agent sent when fetching subscriptions
    pub user_agent: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            sub_urls: Vec::new(),
            filter_regex: String::new(),
            server_url: String::new(),
            download_size: 20,
            upload_size: 10,
            timeout: DEFAULT_TIMEOUT,
            concurrent: DEFAULT_CONCURRENCY,
            print_progress: false,
            mmdb_path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a YAML configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        Self::from_yaml(&content).with_context(|| format!("invalid config file {:?}", path))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings a run cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            bail!("timeout must be greater than zero");
        }
        Ok(())
    }

    pub fn with_sub_urls(mut self, urls: Vec<String>) -> Self {
        self.sub_urls = urls;
        self
    }

    pub fn with_filter_regex(mut self, pattern: String) -> Self {
        self.filter_regex = pattern;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrent = concurrency;
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.print_progress = enabled;
        self
    }

    pub fn with_mmdb_path(mut self, path: String) -> Self {
        self.mmdb_path = Some(path);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Worker count, never zero
    pub fn concurrency(&self) -> usize {
        self.concurrent.max(1)
    }

    /// Compiled exclusion pattern, `None` when no pattern is set
    pub fn exclusion(&self) -> Result<Option<Regex>> {
        if self.filter_regex.is_empty() {
            return Ok(None);
        }
        let regex = Regex::new(&self.filter_regex)
            .with_context(|| format!("invalid filter-regex {:?}", self.filter_regex))?;
        Ok(Some(regex))
    }
}

/// Durations as (possibly fractional) seconds
mod seconds {
    use super::{Deserialize, Deserializer, Duration, Serializer};
    use std::result::Result;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        if duration.subsec_nanos() == 0 {
            serializer.serialize_u64(duration.as_secs())
        } else {
            serializer.serialize_f64(duration.as_secs_f64())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
