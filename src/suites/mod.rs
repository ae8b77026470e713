//! Suite discovery, manifests and batch partitioning

pub mod batch;
pub mod discovery;
pub mod manifest;

pub use batch::{BatchSpec, partition};
pub use discovery::discover_suites;
pub use manifest::{SuiteDescriptor, SuiteManifest};
