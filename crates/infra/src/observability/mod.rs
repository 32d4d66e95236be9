//! Observability infrastructure for the pipeline's own diagnostics
//!
//! The pipeline reports about itself through `tracing`; [`logging`] installs
//! the subscriber that renders those events. Telemetry produced *from* RTC
//! stats lives in [`crate::telemetry`].

pub mod logging;

pub use logging::init_tracing;
