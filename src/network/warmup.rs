//! Waiting for the freshly started network to produce state.
//!
//! The node prints its readiness marker as soon as RPC is up, which is before
//! the first blocks exist. Suites need a few blocks, so the run pauses here
//! between bootstrap and the first suite.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{BLOCK_POLL_INTERVAL, BLOCK_POLL_TIMEOUT, RPC_REQUEST_TIMEOUT};

/// Something to wait on after the node reports ready
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn wait(&self) -> Result<()>;

    fn describe(&self) -> String;
}

/// Sleep for a fixed duration
#[derive(Debug, Clone)]
pub struct FixedDelay(pub Duration);

#[async_trait]
impl ReadinessProbe for FixedDelay {
    async fn wait(&self) -> Result<()> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("fixed delay of {}s", self.0.as_secs_f64())
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<serde_json::Value>,
}

/// Poll `eth_blockNumber` until the chain reaches `min_height`
#[derive(Debug, Clone)]
pub struct BlockHeightProbe {
    client: reqwest::Client,
    rpc_url: String,
    min_height: u64,
    poll_interval: Duration,
    timeout: Duration,
}

impl BlockHeightProbe {
    pub fn new(rpc_url: impl Into<String>, min_height: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(RPC_REQUEST_TIMEOUT)
            .build()
            .context("Failed to build RPC client")?;

        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
            min_height,
            poll_interval: BLOCK_POLL_INTERVAL,
            timeout: BLOCK_POLL_TIMEOUT,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn block_height(&self) -> Result<u64> {
        let request = json!({
            "jsonrpc": "2.0",
            "method": "eth_blockNumber",
            "params": [],
            "id": 1,
        });

        let response: RpcResponse = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            bail!("eth_blockNumber returned error: {}", error);
        }
        let height = response
            .result
            .ok_or_else(|| anyhow!("eth_blockNumber returned no result"))?;
        parse_quantity(&height)
    }
}

#[async_trait]
impl ReadinessProbe for BlockHeightProbe {
    async fn wait(&self) -> Result<()> {
        let deadline = Instant::now() + self.timeout;

        loop {
            match self.block_height().await {
                Ok(height) if height >= self.min_height => {
                    info!("Chain reached block height {}", height);
                    return Ok(());
                }
                Ok(height) => debug!("Block height {} < {}", height, self.min_height),
                Err(e) => debug!("Block height poll failed: {:#}", e),
            }

            if Instant::now() + self.poll_interval > deadline {
                bail!(
                    "Chain did not reach block height {} at {} within {}s",
                    self.min_height,
                    self.rpc_url,
                    self.timeout.as_secs_f64()
                );
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn describe(&self) -> String {
        format!(
            "block height >= {} at {}",
            self.min_height, self.rpc_url
        )
    }
}

/// Parse an Ethereum JSON-RPC hex quantity such as "0x1b4"
fn parse_quantity(s: &str) -> Result<u64> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| anyhow!("Quantity '{}' is missing the 0x prefix", s))?;
    u64::from_str_radix(digits, 16).with_context(|| format!("Invalid hex quantity '{}'", s))
}
