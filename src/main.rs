use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use node_checker::{telemetry, NodeChecker, RunConfig, Service};
use std::path::PathBuf;
use std::time::Duration;

/// A bulk subscription node checker with concurrent reachability probing
#[derive(Parser)]
#[command(name = "node-checker")]
#[command(about = "A bulk subscription node checker with concurrent reachability probing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch subscriptions and check every node
    Check {
        #[command(flatten)]
        run: RunArgs,
        /// Output file for the available nodes (Clash subscription format)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fetch subscriptions and list their nodes without checking
    Fetch {
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
struct RunArgs {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Subscription URLs (can specify multiple, replaces the configured list)
    #[arg(short = 'u', long = "sub-url")]
    sub_urls: Vec<String>,
    /// Number of concurrent workers
    #[arg(short = 'n', long)]
    concurrent: Option<usize>,
    /// Timeout in seconds for each request through a node
    #[arg(long)]
    timeout: Option<u64>,
    /// Show a progress bar while checking
    #[arg(long)]
    progress: bool,
    /// MMDB database used to resolve exit countries
    #[arg(long)]
    mmdb: Option<String>,
    /// Exclude nodes whose final name matches this regex from the output
    #[arg(long)]
    filter_regex: Option<String>,
}

impl RunArgs {
    fn into_config(self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::default(),
        };

        if !self.sub_urls.is_empty() {
            config = config.with_sub_urls(self.sub_urls);
        }
        if let Some(concurrent) = self.concurrent {
            config = config.with_concurrency(concurrent);
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(Duration::from_secs(timeout));
        }
        if self.progress {
            config = config.with_progress(true);
        }
        if let Some(mmdb) = self.mmdb {
            config = config.with_mmdb_path(mmdb);
        }
        if let Some(pattern) = self.filter_regex {
            config = config.with_filter_regex(pattern);
        }

        if config.sub_urls.is_empty() {
            anyhow::bail!("no subscription URLs configured; use --sub-url or a config file");
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { run, output } => {
            let config = run.into_config()?;
            let exclude = config.exclusion()?;

            println!(
                "Checking {} subscription(s) with {} workers, timeout: {:?}",
                config.sub_urls.len(),
                config.concurrency(),
                config.timeout()
            );

            let checker = NodeChecker::new(config);
            let report = checker.start().await.context("check failed")?;

            println!(
                "Results: {} available of {} nodes ({} probed)",
                report.available, report.total, report.processed
            );
            let counts = report.service_counts();
            for service in Service::ALL {
                println!("  {:<10} {}", service, counts.get(&service).copied().unwrap_or(0));
            }

            if let Some(output_path) = output {
                let written = report.save_subscription(&output_path, exclude.as_ref())?;
                println!("Saved {} nodes to {:?}", written, output_path);
            } else {
                for outcome in report.retained(exclude.as_ref()) {
                    println!("  {}", outcome.node);
                }
            }
        }
        Commands::Fetch { run } => {
            let config = run.into_config()?;
            let checker = NodeChecker::new(config);
            let nodes = checker.fetch_nodes().await.context("fetch failed")?;

            println!("Total nodes: {}", nodes.len());
            for node in &nodes {
                println!("  {}", node);
            }
        }
    }

    Ok(())
}
