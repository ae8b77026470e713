//! Configuration constants for the suite runner
//!
//! This module centralizes the fixed names, markers and timings that the
//! orchestrator relies on.

use std::time::Duration;

// ============================================================================
// Filesystem Layout
// ============================================================================

/// Directory under the harness root holding one subdirectory per suite
pub const SUITES_DIR: &str = "suites";

/// Manifest file every suite must carry
pub const MANIFEST_FILE: &str = "package.json";

/// Directory holding the suite's test entry points
pub const TEST_ENTRY_DIR: &str = "test";

/// Installed package-manager dependencies, required before suites can run
pub const DEPENDENCIES_DIR: &str = "node_modules";

// ============================================================================
// Suite Scripts
// ============================================================================

/// Script a suite declares for running against the self-hosted node
pub const LOCAL_NETWORK_SCRIPT: &str = "test-cosmos";

/// Script a suite declares for running against an externally managed network
pub const EXTERNAL_NETWORK_SCRIPT: &str = "test-ganache";

// ============================================================================
// Node Bootstrap
// ============================================================================

/// Log substring the node prints once its RPC endpoint is serving
pub const READINESS_MARKER: &str = "Starting JSON-RPC server";

/// Shell invocation that brings up the local network.
///
/// The `echo y` auto-confirms the interactive reset prompt.
pub const NODE_LAUNCH_SCRIPT: &str = "echo y | make localnet";

/// Environment variable the node reads for its data/home directory
pub const NODE_HOME_ENV: &str = "HOMEDIR";

/// How long the node may take to print the readiness marker
pub const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(50);

// ============================================================================
// Warm-up
// ============================================================================

/// Fixed delay after bootstrap so the network can produce its first blocks
///
/// `--wait-for-blocks` replaces it with a block-height poll.
pub const WARMUP_DELAY: Duration = Duration::from_secs(20);

/// JSON-RPC endpoint of the local node
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Interval between block-height polls
pub const BLOCK_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound on the block-height poll
pub const BLOCK_POLL_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for a single JSON-RPC request
pub const RPC_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
