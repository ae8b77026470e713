// Public API - the runner entry point plus the pieces it is assembled from
pub mod coordination;
pub mod network;
pub mod runner;
pub mod run_config;
pub mod suites;

// Internal modules
mod config;
mod error;
mod telemetry;
