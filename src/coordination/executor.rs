use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::RunError;
use crate::run_config::NetworkMode;
use crate::suites::SuiteDescriptor;
use crate::telemetry::TelemetryEvent;

/// How a suite's script is turned into a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Launcher {
    /// `yarn <script>`
    #[default]
    Yarn,
    /// `npm run <script>`
    Npm,
    /// `sh -c <script body from the manifest>`
    Shell,
}

impl Launcher {
    /// Parse launcher from string (case-insensitive)
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "yarn" => Ok(Launcher::Yarn),
            "npm" => Ok(Launcher::Npm),
            "shell" | "sh" => Ok(Launcher::Shell),
            _ => Err(anyhow!(
                "Unsupported launcher: {}. Supported launchers: yarn, npm, shell",
                s
            )),
        }
    }

    /// Package-manager launchers need installed dependencies in the harness root
    pub fn needs_dependencies(self) -> bool {
        !matches!(self, Launcher::Shell)
    }

    fn command(self, suite: &SuiteDescriptor, script: &str) -> Result<Command> {
        let mut cmd = match self {
            Launcher::Yarn => {
                let mut cmd = Command::new("yarn");
                cmd.arg(script);
                cmd
            }
            Launcher::Npm => {
                let mut cmd = Command::new("npm");
                cmd.args(["run", script]);
                cmd
            }
            Launcher::Shell => {
                let body = suite
                    .script(script)
                    .with_context(|| {
                        format!("{} has no command line for script `{}`", suite.id, script)
                    })?;
                let mut cmd = Command::new("sh");
                cmd.args(["-c", body]);
                cmd
            }
        };
        cmd.current_dir(&suite.dir);
        Ok(cmd)
    }
}

/// Outcome of one suite's test command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteRunResult {
    pub id: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl SuiteRunResult {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs suites one after another, stopping at the first failure
pub struct SuiteExecutor {
    network: NetworkMode,
    launcher: Launcher,
    telemetry_tx: mpsc::UnboundedSender<TelemetryEvent>,
}

impl SuiteExecutor {
    pub fn new(
        network: NetworkMode,
        launcher: Launcher,
        telemetry_tx: mpsc::UnboundedSender<TelemetryEvent>,
    ) -> Self {
        Self {
            network,
            launcher,
            telemetry_tx,
        }
    }

    /// Run every suite in order.
    ///
    /// Returns the results of all suites when each one exits 0. The first
    /// non-zero exit ends the run with [`RunError::SuiteFailed`]; later suites
    /// are never started.
    pub async fn run_all(&self, suites: &[SuiteDescriptor]) -> Result<Vec<SuiteRunResult>> {
        if suites.is_empty() {
            return Err(RunError::NoSuites.into());
        }

        let mut results = Vec::with_capacity(suites.len());
        for suite in suites {
            info!("Start test: {}", suite.id);
            let result = self.run_suite(suite).await?;

            if !result.passed() {
                return Err(RunError::SuiteFailed {
                    suite: result.id,
                    code: result.exit_code,
                }
                .into());
            }

            info!(
                "Test {} passed in {:.2}s",
                result.id,
                result.duration.as_secs_f64()
            );
            results.push(result);
        }

        info!("{} test suites passed!", results.len());
        Ok(results)
    }

    /// Spawn one suite's script with inherited stdout/stderr and wait for it
    async fn run_suite(&self, suite: &SuiteDescriptor) -> Result<SuiteRunResult> {
        let script = self.network.script();
        let mut cmd = self.launcher.command(suite, script)?;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let _ = self.telemetry_tx.send(TelemetryEvent::SuiteStarted {
            suite: suite.id.clone(),
        });
        let start = Instant::now();

        let status = cmd
            .status()
            .await
            .with_context(|| format!("Failed to run `{}` for test {}", script, suite.id))?;

        let duration = start.elapsed();
        let exit_code = match status.code() {
            Some(code) => code,
            None => {
                warn!("Test {} was terminated by a signal ({})", suite.id, status);
                -1
            }
        };

        let _ = self.telemetry_tx.send(TelemetryEvent::SuiteFinished {
            suite: suite.id.clone(),
            exit_code,
            duration,
        });

        Ok(SuiteRunResult {
            id: suite.id.clone(),
            exit_code,
            duration,
        })
    }
}
