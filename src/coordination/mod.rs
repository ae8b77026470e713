//! Run coordination: the end-to-end pipeline and the sequential executor

pub mod coordinator;
pub mod executor;

pub use coordinator::{Coordinator, RunSummary, SuiteRunConfig, SuiteRunConfigBuilder};
pub use executor::{Launcher, SuiteExecutor, SuiteRunResult};
