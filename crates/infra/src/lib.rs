//! # rtcscope Infrastructure
//!
//! Infrastructure implementations of the core ports.
//!
//! This crate contains:
//! - OpenTelemetry pipelines, emitters and the instrument cache
//! - The process-wide telemetry state (init/dispose/force flush)
//! - The recurring collection scheduler
//! - Configuration loading and logging setup
//!
//! ## Architecture
//! - Implements [`rtcscope_core::TelemetrySink`]
//! - Depends on `rtcscope-domain` and `rtcscope-core`
//! - Contains all "impure" code (exporters, timers, files, environment)

pub mod config;
pub mod errors;
pub mod observability;
pub mod scheduling;
pub mod telemetry;

// Re-export commonly used items
pub use errors::{InfraError, InfraResult};
pub use observability::init_tracing;
pub use scheduling::{CollectionScheduler, SchedulerError, SchedulerResult, SchedulerState};
pub use telemetry::{TelemetryDispatcher, TelemetryInstance, TelemetryRuntime};
