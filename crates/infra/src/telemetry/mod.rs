//! OpenTelemetry adapters
//!
//! - [`pipeline`]: provider construction (OTLP/HTTP by default)
//! - [`runtime`]: process-wide telemetry state with init/dispose/flush
//! - [`trace_emitter`] and [`metric_emitter`]: render one stat record
//! - [`instruments`] and [`observations`]: instrument cache and the
//!   latest-value buffer read by observable instruments
//! - [`dispatcher`]: the collection sink tying the above together
//! - [`crash_report`]: recent-span ring buffer for crash reports

pub mod crash_report;
pub mod dispatcher;
pub mod error;
pub mod instruments;
pub mod metric_emitter;
pub mod observations;
pub mod pipeline;
pub mod runtime;
pub mod trace_emitter;

pub use crash_report::{CrashReportBuffer, CrashReportProcessor, CrashReportSpan};
pub use dispatcher::TelemetryDispatcher;
pub use error::{TelemetryError, TelemetryResult};
pub use instruments::{InstrumentCache, InstrumentHandle};
pub use metric_emitter::MetricEmitter;
pub use observations::ObservationBuffer;
#[cfg(feature = "otlp")]
pub use pipeline::OtlpPipelineBuilder;
pub use pipeline::{default_pipeline_builder, DisabledPipelineBuilder, PipelineBuilder, TelemetryPipeline};
pub use runtime::{current, dispose, force_flush, global, init, TelemetryInstance, TelemetryRuntime};
pub use trace_emitter::TraceEmitter;
