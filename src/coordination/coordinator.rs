use anyhow::{Context, Result};
use derive_builder::Builder;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::executor::{Launcher, SuiteExecutor, SuiteRunResult};
use crate::config::{DEPENDENCIES_DIR, SUITES_DIR};
use crate::error::RunError;
use crate::network::{NodeBootstrapper, NodeHandle, ReadinessProbe};
use crate::run_config::RunConfig;
use crate::suites::{self, SuiteDescriptor};
use crate::telemetry::{RunStats, TelemetryEvent};

/// Configuration for a suite run
#[derive(Debug, Clone, Builder)]
pub struct SuiteRunConfig {
    /// Harness root: holds `suites/` and, for package-manager launchers,
    /// `node_modules/`
    #[builder(setter(into))]
    pub root: PathBuf,
    pub run: RunConfig,
    #[builder(default)]
    pub launcher: Launcher,
}

impl SuiteRunConfig {
    pub fn suites_root(&self) -> PathBuf {
        self.root.join(SUITES_DIR)
    }
}

/// Result of a completed run
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: String,
    pub results: Vec<SuiteRunResult>,
    pub stats: RunStats,
    pub duration: Duration,
}

impl RunSummary {
    pub fn suites_passed(&self) -> usize {
        self.results.len()
    }
}

/// The Coordinator drives one run from discovery to the last suite.
pub struct Coordinator {
    bootstrapper: NodeBootstrapper,
    warmup: Arc<dyn ReadinessProbe>,
}

impl Coordinator {
    /// Create a new Coordinator instance
    pub fn new(bootstrapper: NodeBootstrapper, warmup: Arc<dyn ReadinessProbe>) -> Self {
        Self {
            bootstrapper,
            warmup,
        }
    }

    /// Run the complete suite run
    ///
    /// This method orchestrates the entire run:
    /// 1. Check the harness has its dependencies installed
    /// 2. Discover suites and apply the allow-list
    /// 3. Cut the batch this invocation owns
    /// 4. Bring up the node (self-hosted network only) and warm it up
    /// 5. Run suites one at a time, stopping at the first failure
    /// 6. Terminate the node, whatever the outcome
    pub async fn run(&self, config: &SuiteRunConfig) -> Result<RunSummary> {
        let start_time = Instant::now();

        let run_id = Uuid::new_v4().to_string();
        info!("Starting test run: {}", run_id);

        // 1. Dependencies
        Self::check_dependencies(config).await?;

        // 2-3. Suite selection
        let selected = self.select_suites(config).await?;
        if selected.is_empty() {
            return Err(RunError::NoSuites.into());
        }
        let names: Vec<&str> = selected.iter().map(|s| s.id.as_str()).collect();
        info!("Running Tests: {}", names.join(","));

        // 4. Network
        let node = self.bootstrapper.bootstrap(config.run.network()).await?;
        if node.is_some()
            && let Err(e) = self.warm_up().await
        {
            Self::shutdown_node(node).await;
            return Err(e);
        }

        // 5. Suites
        let (telemetry_tx, telemetry_rx) = mpsc::unbounded_channel::<TelemetryEvent>();
        let stats_jh = Self::spawn_stats_collector(telemetry_rx);

        let executor = SuiteExecutor::new(config.run.network(), config.launcher, telemetry_tx);
        let outcome = executor.run_all(&selected).await;

        // Dropping the executor drops the last sender, which ends the collector
        drop(executor);

        // 6. Cleanup
        let stats = Self::finish(node, stats_jh).await?;

        let results = outcome?;
        let duration = start_time.elapsed();

        info!(
            "Run complete: {} suites passed in {:.2}s",
            results.len(),
            duration.as_secs_f64()
        );

        Ok(RunSummary {
            run_id,
            results,
            stats,
            duration,
        })
    }

    /// Discover, filter and batch the suites for this invocation
    pub async fn select_suites(&self, config: &SuiteRunConfig) -> Result<Vec<SuiteDescriptor>> {
        let discovered =
            suites::discover_suites(&config.suites_root(), config.run.only_test()).await?;

        let total = discovered.len();
        let selected = suites::partition(discovered, config.run.batch());

        if let Some(batch) = config.run.batch() {
            info!(
                "Batch {}/{}: {} of {} suites",
                batch.index,
                batch.total,
                selected.len(),
                total
            );
        }

        Ok(selected)
    }

    /// Package-manager launchers resolve test tooling from `node_modules`
    async fn check_dependencies(config: &SuiteRunConfig) -> Result<()> {
        if !config.launcher.needs_dependencies() {
            return Ok(());
        }

        let deps = config.root.join(DEPENDENCIES_DIR);
        if !tokio::fs::try_exists(&deps).await.unwrap_or(false) {
            return Err(RunError::config(format!(
                "{} does not exist. Please run `yarn install` before running tests.",
                deps.display()
            ))
            .into());
        }
        Ok(())
    }

    async fn warm_up(&self) -> Result<()> {
        info!("Waiting for the network: {}", self.warmup.describe());
        self.warmup
            .wait()
            .await
            .context("Network warm-up failed")
    }

    async fn shutdown_node(node: Option<NodeHandle>) {
        if let Some(node) = node
            && let Err(e) = node.terminate().await
        {
            warn!("{:#}", e);
        }
    }

    /// Terminate the node, then hand back the collected statistics
    async fn finish(
        node: Option<NodeHandle>,
        stats_jh: JoinHandle<RunStats>,
    ) -> Result<RunStats> {
        let stats = stats_jh.await;
        Self::shutdown_node(node).await;
        stats.context("Telemetry collector panicked")
    }

    /// Aggregate executor telemetry into run statistics
    fn spawn_stats_collector(
        mut telemetry_rx: mpsc::UnboundedReceiver<TelemetryEvent>,
    ) -> JoinHandle<RunStats> {
        tokio::spawn(async move {
            let mut stats = RunStats::new();
            while let Some(event) = telemetry_rx.recv().await {
                stats.update(&event);
            }
            stats
        })
    }
}
