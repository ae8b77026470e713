use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use super::readiness::{ReadySignal, watch_stream};
use crate::config::{BOOTSTRAP_TIMEOUT, NODE_HOME_ENV, NODE_LAUNCH_SCRIPT, READINESS_MARKER};
use crate::error::RunError;
use crate::run_config::NetworkMode;

/// How to launch the node under test
#[derive(Debug, Clone)]
pub struct NodeCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Directory the launch command runs in
    pub working_dir: PathBuf,
    /// Scratch home handed to the node through `HOMEDIR`
    pub home_dir: PathBuf,
}

impl NodeCommand {
    /// Run `script` through `sh -c`
    pub fn shell(script: &str, working_dir: PathBuf, home_dir: PathBuf) -> Self {
        Self {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            working_dir,
            home_dir,
        }
    }

    /// The default local network launch: `echo y | make localnet`
    pub fn localnet(working_dir: PathBuf, home_dir: PathBuf) -> Self {
        Self::shell(NODE_LAUNCH_SCRIPT, working_dir, home_dir)
    }
}

/// The running node process.
///
/// Only held so it can be terminated at the end of the run; its output
/// belongs to the watchers spawned at launch. Dropping the handle without
/// `terminate` (an interrupted run) still kills the process group.
pub struct NodeHandle {
    child: Child,
    /// Process group the launch command leads, until it has been killed
    pgid: Option<u32>,
    watchers: Vec<JoinHandle<()>>,
}

impl NodeHandle {
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the node's process group and stop its output watchers.
    ///
    /// The whole group goes down, so a node forked by a launch pipeline is
    /// stopped even when the launch shell itself has already exited.
    pub async fn terminate(mut self) -> Result<()> {
        if let Ok(Some(status)) = self.child.try_wait() {
            warn!("Node launch process already exited with {}", status);
        }
        self.stop().await.context("Failed to kill node process")?;
        info!("Node process terminated");
        Ok(())
    }

    /// SIGKILL the process group, reap the launch process, abort the watchers
    async fn stop(&mut self) -> std::io::Result<()> {
        for watcher in self.watchers.drain(..) {
            watcher.abort();
        }
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid)?;
        }
        match self.child.try_wait()? {
            Some(_) => Ok(()),
            None => self.child.kill().await,
        }
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take()
            && let Err(e) = kill_group(pgid)
        {
            warn!("Failed to kill node process group {}: {}", pgid, e);
        }
        for watcher in &self.watchers {
            watcher.abort();
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) -> std::io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pgid).map_err(std::io::Error::other)?;
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        // Every member already gone
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) -> std::io::Result<()> {
    Ok(())
}

/// Brings up the node for self-hosted runs.
///
/// Launching races the readiness marker against a deadline that starts before
/// the spawn. Whichever resolves first decides the outcome; a marker seen
/// after the deadline is ignored.
#[derive(Debug, Clone)]
pub struct NodeBootstrapper {
    command: NodeCommand,
    marker: Arc<str>,
    timeout: Duration,
    mirror_output: bool,
}

impl NodeBootstrapper {
    pub fn new(command: NodeCommand) -> Self {
        Self {
            command,
            marker: Arc::from(READINESS_MARKER),
            timeout: BOOTSTRAP_TIMEOUT,
            mirror_output: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_marker(mut self, marker: &str) -> Self {
        self.marker = Arc::from(marker);
        self
    }

    /// Copy the node's stdout and stderr to our stdout
    pub fn with_mirrored_output(mut self, mirror: bool) -> Self {
        self.mirror_output = mirror;
        self
    }

    /// Launch the node for `network`.
    ///
    /// External networks are not ours to manage: returns `None` without
    /// touching anything.
    pub async fn bootstrap(&self, network: NetworkMode) -> Result<Option<NodeHandle>> {
        match network {
            NetworkMode::External => Ok(None),
            NetworkMode::Local => self.launch().await.map(Some),
        }
    }

    async fn launch(&self) -> Result<NodeHandle> {
        let deadline = Instant::now() + self.timeout;

        tokio::fs::create_dir_all(&self.command.home_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create node home directory {}",
                    self.command.home_dir.display()
                )
            })?;

        info!(
            "Starting node process... timeout: {}ms",
            self.timeout.as_millis()
        );

        let mut command = Command::new(&self.command.program);
        command
            .args(&self.command.args)
            .current_dir(&self.command.working_dir)
            .env(NODE_HOME_ENV, &self.command.home_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group, so everything the launch command forks can be killed together
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .with_context(|| {
                format!(
                    "Failed to spawn node process '{}' in {}",
                    self.command.program,
                    self.command.working_dir.display()
                )
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut node = NodeHandle {
            pgid: if cfg!(unix) { child.id() } else { None },
            child,
            watchers: Vec::new(),
        };
        let stdout = stdout.context("Node stdout was not captured")?;
        let stderr = stderr.context("Node stderr was not captured")?;

        let (ready, ready_rx) = ReadySignal::new();
        node.watchers.push(tokio::spawn(watch_stream(
            stdout,
            Arc::clone(&self.marker),
            ready.clone(),
            self.mirror_output.then(tokio::io::stdout),
        )));
        node.watchers.push(tokio::spawn(watch_stream(
            stderr,
            Arc::clone(&self.marker),
            ready,
            self.mirror_output.then(tokio::io::stdout),
        )));

        let outcome = tokio::time::timeout_at(deadline, ready_rx).await;

        let failure = match outcome {
            Ok(Ok(())) => {
                info!("Node started (pid {:?})", node.pid());
                return Ok(node);
            }
            // Both streams hit EOF without the marker
            Ok(Err(_)) => RunError::NodeExited,
            Err(_) => RunError::BootstrapTimeout {
                marker: self.marker.to_string(),
                timeout: self.timeout,
            },
        };

        if let Err(e) = node.stop().await {
            warn!("Failed to kill node process after failed start: {}", e);
        }
        Err(failure.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bootstrapper(dir: &TempDir, script: &str, timeout_ms: u64) -> NodeBootstrapper {
        let command = NodeCommand::shell(
            script,
            dir.path().to_path_buf(),
            dir.path().join("home"),
        );
        NodeBootstrapper::new(command).with_timeout(Duration::from_millis(timeout_ms))
    }

    fn run_error(err: &anyhow::Error) -> &RunError {
        err.downcast_ref::<RunError>().expect("expected a RunError")
    }

    #[tokio::test]
    async fn test_external_network_spawns_nothing() {
        let dir = TempDir::new().unwrap();
        // Would fail loudly if it were ever launched
        let bootstrapper = bootstrapper(&dir, "exit 1", 100);

        let handle = bootstrapper.bootstrap(NetworkMode::External).await.unwrap();
        assert!(handle.is_none());
        assert!(!dir.path().join("home").exists());
    }

    #[tokio::test]
    async fn test_ready_on_stdout_marker() {
        let dir = TempDir::new().unwrap();
        let bootstrapper = bootstrapper(
            &dir,
            "echo booting; echo 'INF Starting JSON-RPC server address=127.0.0.1:8545'; sleep 30",
            5_000,
        );

        let handle = bootstrapper
            .bootstrap(NetworkMode::Local)
            .await
            .unwrap()
            .expect("local network should spawn a node");
        assert!(handle.pid().is_some());
        handle.terminate().await.unwrap();
    }

    #[tokio::test]
    async fn test_ready_on_stderr_marker() {
        let dir = TempDir::new().unwrap();
        let bootstrapper = bootstrapper(
            &dir,
            "echo 'Starting JSON-RPC server' 1>&2; sleep 30",
            5_000,
        );

        let handle = bootstrapper.bootstrap(NetworkMode::Local).await.unwrap();
        handle.unwrap().terminate().await.unwrap();
    }

    #[tokio::test]
    async fn test_node_home_is_exported() {
        let dir = TempDir::new().unwrap();
        let bootstrapper = bootstrapper(
            &dir,
            "touch \"$HOMEDIR/marker\"; echo 'Starting JSON-RPC server'; sleep 30",
            5_000,
        );

        let handle = bootstrapper.bootstrap(NetworkMode::Local).await.unwrap();
        assert!(dir.path().join("home").join("marker").exists());
        handle.unwrap().terminate().await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_when_marker_never_appears() {
        let dir = TempDir::new().unwrap();
        let bootstrapper = bootstrapper(&dir, "echo still syncing; sleep 30", 300);

        let err = bootstrapper
            .bootstrap(NetworkMode::Local)
            .await
            .err()
            .expect("bootstrap should time out");
        assert!(matches!(
            run_error(&err),
            RunError::BootstrapTimeout { .. }
        ));
    }

    #[tokio::test]
    async fn test_early_exit_fails_before_timeout() {
        let dir = TempDir::new().unwrap();
        let bootstrapper = bootstrapper(&dir, "echo 'panic: bad genesis'; exit 1", 30_000);

        let started = std::time::Instant::now();
        let err = bootstrapper
            .bootstrap(NetworkMode::Local)
            .await
            .err()
            .expect("bootstrap should fail");
        assert!(matches!(run_error(&err), RunError::NodeExited));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_custom_marker() {
        let dir = TempDir::new().unwrap();
        let bootstrapper =
            bootstrapper(&dir, "echo 'node ready'; sleep 30", 5_000).with_marker("node ready");

        let handle = bootstrapper.bootstrap(NetworkMode::Local).await.unwrap();
        handle.unwrap().terminate().await.unwrap();
    }

    /// Launch pipeline whose node is a grandchild of the launch shell
    #[cfg(unix)]
    const PIPELINE_NODE: &str = "echo y | sh -c 'echo $$ > \"$HOMEDIR/node.pid\"; echo Starting JSON-RPC server; exec sleep 300'";

    #[cfg(unix)]
    fn node_pid(dir: &TempDir) -> i32 {
        std::fs::read_to_string(dir.path().join("home").join("node.pid"))
            .unwrap()
            .trim()
            .parse()
            .unwrap()
    }

    #[cfg(unix)]
    fn process_alive(pid: i32) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        if kill(Pid::from_raw(pid), None).is_err() {
            return false;
        }
        // Unreaped zombies still accept signal 0
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => !stat
                .rsplit(')')
                .next()
                .is_some_and(|rest| rest.trim_start().starts_with('Z')),
            Err(_) => true,
        }
    }

    #[cfg(unix)]
    async fn exited_within(pid: i32, limit: Duration) -> bool {
        let deadline = std::time::Instant::now() + limit;
        while std::time::Instant::now() < deadline {
            if !process_alive(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        !process_alive(pid)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_stops_pipeline_node() {
        let dir = TempDir::new().unwrap();
        let bootstrapper = bootstrapper(&dir, PIPELINE_NODE, 5_000);

        let handle = bootstrapper
            .bootstrap(NetworkMode::Local)
            .await
            .unwrap()
            .expect("local network should spawn a node");
        let pid = node_pid(&dir);
        assert!(process_alive(pid));

        handle.terminate().await.unwrap();
        assert!(
            exited_within(pid, Duration::from_secs(5)).await,
            "node {pid} survived terminate"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dropped_handle_stops_pipeline_node() {
        let dir = TempDir::new().unwrap();
        let bootstrapper = bootstrapper(&dir, PIPELINE_NODE, 5_000);

        let handle = bootstrapper.bootstrap(NetworkMode::Local).await.unwrap();
        let pid = node_pid(&dir);
        drop(handle);

        assert!(
            exited_within(pid, Duration::from_secs(5)).await,
            "node {pid} survived a dropped handle"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_stops_pipeline_node() {
        let dir = TempDir::new().unwrap();
        let script = "echo y | sh -c 'echo $$ > \"$HOMEDIR/node.pid\"; exec sleep 300'";
        let bootstrapper = bootstrapper(&dir, script, 500);

        let err = bootstrapper
            .bootstrap(NetworkMode::Local)
            .await
            .err()
            .expect("bootstrap should time out");
        assert!(matches!(
            run_error(&err),
            RunError::BootstrapTimeout { .. }
        ));

        let pid = node_pid(&dir);
        assert!(
            exited_within(pid, Duration::from_secs(5)).await,
            "node {pid} survived a failed start"
        );
    }
}
