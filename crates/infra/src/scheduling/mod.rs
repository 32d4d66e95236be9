//! Scheduling infrastructure for recurring stats collection
//!
//! The collection scheduler follows the runtime rules used across the
//! crate:
//! - Explicit lifecycle management (start/stop)
//! - Join handles for spawned tasks
//! - Cancellation token support
//! - Timeout wrapping on awaited shutdowns
//! - Structured tracing

pub mod collection_scheduler;
pub mod error;

pub use collection_scheduler::{
    CollectionScheduler, FixedSink, GlobalTelemetry, SchedulerState, SinkSource,
};
pub use error::{SchedulerError, SchedulerResult};
