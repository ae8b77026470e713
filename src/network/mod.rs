//! Bringing up (or deferring to) the network the suites run against

pub mod bootstrap;
pub mod readiness;
pub mod warmup;

pub use bootstrap::{NodeBootstrapper, NodeCommand, NodeHandle};
pub use warmup::{BlockHeightProbe, FixedDelay, ReadinessProbe};
