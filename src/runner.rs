//! High-level runner API for the suite runner.
//!
//! This module provides a simplified public interface that encapsulates the
//! setup of the node bootstrapper, warm-up probe and coordinator.
//!
//! This is the primary API for external users and for the CLI.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::{BOOTSTRAP_TIMEOUT, DEFAULT_RPC_URL, WARMUP_DELAY};
use crate::coordination::{Coordinator, Launcher, SuiteRunConfigBuilder};
use crate::network::{BlockHeightProbe, FixedDelay, NodeBootstrapper, NodeCommand, ReadinessProbe};
use crate::run_config::{NetworkMode, RunConfig};

pub use crate::error::RunError;
pub use crate::run_config::RawOptions;

/// What to wait for between node readiness and the first suite
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warmup {
    /// Sleep for a fixed duration
    Delay(Duration),
    /// Poll the node's JSON-RPC until the chain reaches `min_height`
    Blocks { rpc_url: String, min_height: u64 },
}

impl Default for Warmup {
    fn default() -> Self {
        Warmup::Delay(WARMUP_DELAY)
    }
}

impl Warmup {
    /// Block-height warm-up against the default local RPC endpoint
    pub fn blocks(min_height: u64) -> Self {
        Warmup::Blocks {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            min_height,
        }
    }

    fn into_probe(self) -> Result<Arc<dyn ReadinessProbe>> {
        Ok(match self {
            Warmup::Delay(delay) => Arc::new(FixedDelay(delay)),
            Warmup::Blocks {
                rpc_url,
                min_height,
            } => Arc::new(BlockHeightProbe::new(rpc_url, min_height)?),
        })
    }
}

/// Arguments for a suite run
#[derive(Debug, Clone)]
pub struct RunArgs {
    /// Harness root containing `suites/`
    pub root: PathBuf,
    /// Unvalidated network/batch/allow-list/verbosity options
    pub options: RawOptions,
    pub launcher: Launcher,

    // Node launch (self-hosted network only)
    /// Directory the node launch command runs in (default: `<root>/../..`)
    pub node_dir: Option<PathBuf>,
    /// Node home directory (default: a fresh temporary directory)
    pub node_home: Option<PathBuf>,
    /// Shell command that starts the node (default: `echo y | make localnet`)
    pub node_command: Option<String>,
    pub bootstrap_timeout: Duration,
    pub warmup: Warmup,
}

impl RunArgs {
    /// Defaults for everything but the harness root and options
    pub fn new(root: impl Into<PathBuf>, options: RawOptions) -> Self {
        Self {
            root: root.into(),
            options,
            launcher: Launcher::default(),
            node_dir: None,
            node_home: None,
            node_command: None,
            bootstrap_timeout: BOOTSTRAP_TIMEOUT,
            warmup: Warmup::default(),
        }
    }
}

/// Result of a completed suite run
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: String,
    pub network: NetworkMode,
    pub suites_passed: usize,
    pub duration: Duration,
    /// Longest-running suite and its duration
    pub slowest_suite: Option<(String, Duration)>,
}

/// Run the selected suites with the specified arguments
///
/// This is the main entry point. It:
/// - Validates the raw options (no side effects on failure)
/// - Prepares the node launch for self-hosted runs
/// - Discovers, filters and batches suites
/// - Runs them sequentially, failing on the first non-zero exit
///
/// When the node home is a temporary directory and the run fails, the
/// directory is kept and its path logged for debugging.
///
/// # Example
///
/// ```no_run
/// use suite_runner::coordination::Launcher;
/// use suite_runner::runner::{RawOptions, RunArgs, run_suites};
///
/// # async fn example() -> anyhow::Result<()> {
/// let options = RawOptions {
///     network: Some("external".to_string()),
///     batch: Some("1-2".to_string()),
///     allow_tests: None,
///     verbose_log: false,
/// };
/// let mut args = RunArgs::new("tests/solidity", options);
/// args.launcher = Launcher::Yarn;
///
/// let outcome = run_suites(args).await?;
/// println!("{} suites passed", outcome.suites_passed);
/// # Ok(())
/// # }
/// ```
pub async fn run_suites(args: RunArgs) -> Result<RunOutcome> {
    let run = RunConfig::resolve(&args.options)?;
    let network = run.network();

    // Scratch home only exists for self-hosted runs
    let (mut temp_home, home_dir) = match (&args.node_home, network) {
        (Some(dir), _) => (None, dir.clone()),
        (None, NetworkMode::Local) => {
            let temp = tempfile::Builder::new()
                .prefix("suite-runner-node-")
                .tempdir()
                .context("Failed to create node home directory")?;
            let path = temp.path().to_path_buf();
            (Some(temp), path)
        }
        (None, NetworkMode::External) => (None, args.root.join(".node-home")),
    };

    let node_dir = args
        .node_dir
        .clone()
        .unwrap_or_else(|| args.root.join("..").join(".."));
    let node_command = match &args.node_command {
        Some(script) => NodeCommand::shell(script, node_dir, home_dir),
        None => NodeCommand::localnet(node_dir, home_dir),
    };

    let bootstrapper = NodeBootstrapper::new(node_command)
        .with_timeout(args.bootstrap_timeout)
        .with_mirrored_output(run.verbose_log());

    let coordinator = Coordinator::new(bootstrapper, args.warmup.into_probe()?);

    let config = SuiteRunConfigBuilder::default()
        .root(args.root)
        .run(run)
        .launcher(args.launcher)
        .build()?;

    match coordinator.run(&config).await {
        Ok(summary) => {
            let suites_passed = summary.suites_passed();
            let slowest_suite = summary
                .stats
                .slowest()
                .map(|(name, d)| (name.to_string(), d));
            Ok(RunOutcome {
                run_id: summary.run_id,
                network,
                suites_passed,
                duration: summary.duration,
                slowest_suite,
            })
        }
        Err(e) => {
            // Runs that failed before the node wrote anything leave nothing to inspect
            if let Some(temp) = temp_home.take()
                && std::fs::read_dir(temp.path())
                    .map(|mut entries| entries.next().is_some())
                    .unwrap_or(false)
            {
                let kept = temp.keep();
                warn!("Node home preserved for debugging: {}", kept.display());
            }
            Err(e)
        }
    }
}

