//! Resolution of raw invocation options into a validated [`RunConfig`].

use std::fmt;

use tracing::info;

use crate::config::{EXTERNAL_NETWORK_SCRIPT, LOCAL_NETWORK_SCRIPT};
use crate::error::RunError;
use crate::suites::BatchSpec;

/// Network the suites run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkMode {
    /// The orchestrator launches and owns the node
    #[default]
    Local,
    /// A node is already running; its lifecycle is not ours
    External,
}

impl NetworkMode {
    /// Parse a network name (case-insensitive).
    ///
    /// `cosmos` and `ganache` are accepted as the historical names of the two
    /// modes.
    pub fn parse(s: &str) -> Result<Self, RunError> {
        match s.trim().to_lowercase().as_str() {
            "local" | "cosmos" => Ok(NetworkMode::Local),
            "external" | "ganache" => Ok(NetworkMode::External),
            _ => Err(RunError::config(format!(
                "network '{}' is invalid. Must be local (cosmos) or external (ganache)",
                s
            ))),
        }
    }

    /// Manifest script a suite runs for this mode
    pub fn script(self) -> &'static str {
        match self {
            NetworkMode::Local => LOCAL_NETWORK_SCRIPT,
            NetworkMode::External => EXTERNAL_NETWORK_SCRIPT,
        }
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkMode::Local => write!(f, "local"),
            NetworkMode::External => write!(f, "external"),
        }
    }
}

/// Option values as they arrive from the command line
#[derive(Debug, Clone, Default)]
pub struct RawOptions {
    pub network: Option<String>,
    pub batch: Option<String>,
    pub allow_tests: Option<String>,
    pub verbose_log: bool,
}

/// Validated, immutable configuration of one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    network: NetworkMode,
    batch: Option<BatchSpec>,
    only_test: Option<Vec<String>>,
    verbose_log: bool,
}

impl RunConfig {
    /// Validate raw options. Nothing is spawned or touched on disk here.
    pub fn resolve(raw: &RawOptions) -> Result<Self, RunError> {
        let network = match raw.network.as_deref() {
            None => NetworkMode::default(),
            Some(s) => NetworkMode::parse(s)?,
        };

        let batch = raw.batch.as_deref().map(BatchSpec::parse).transpose()?;

        let only_test = raw.allow_tests.as_deref().map(parse_allow_list);

        info!("Running on network: {}", network);

        Ok(Self {
            network,
            batch,
            only_test,
            verbose_log: raw.verbose_log,
        })
    }

    pub fn network(&self) -> NetworkMode {
        self.network
    }

    pub fn batch(&self) -> Option<BatchSpec> {
        self.batch
    }

    pub fn only_test(&self) -> Option<&[String]> {
        self.only_test.as_deref()
    }

    pub fn verbose_log(&self) -> bool {
        self.verbose_log
    }
}

/// Split "a,b , c" into trimmed, non-empty names
fn parse_allow_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
