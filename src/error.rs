use std::time::Duration;

/// Fatal outcomes of a run that callers can tell apart.
///
/// Everything else travels as `anyhow::Error` with context attached.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("{0}")]
    Config(String),

    #[error("No tests are found or all invalid!")]
    NoSuites,

    #[error("Node did not print '{marker}' within {}ms", timeout.as_millis())]
    BootstrapTimeout { marker: String, timeout: Duration },

    #[error("Node exited before becoming ready")]
    NodeExited,

    #[error("Test: {suite} exited with error code {code}")]
    SuiteFailed { suite: String, code: i32 },
}

impl RunError {
    pub fn config(msg: impl Into<String>) -> Self {
        RunError::Config(msg.into())
    }
}
