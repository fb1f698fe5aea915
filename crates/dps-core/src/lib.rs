//! Shared plumbing for the DPS production drivers.
//!
//! # Modules
//!
//! - [`config`] -- `dps-config.yaml` loading with environment overrides
//! - [`logging`] -- `tracing` subscriber setup
//! - [`summary`] -- Machine-readable JSON run summaries

pub mod config;
pub mod logging;
pub mod summary;

pub use config::{ConfigError, DpsConfig, LoggingConfig, MixingConfig, SamplingConfig, ShowerMode};
pub use summary::{RunStatus, RunSummary, SummaryError};
