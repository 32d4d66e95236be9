//! Provider construction
//!
//! A [`TelemetryPipeline`] is the set of SDK providers one telemetry
//! instance renders into. [`PipelineBuilder`] is the seam between the
//! process state and the exporters: the default [`OtlpPipelineBuilder`]
//! ships spans and metrics over OTLP/HTTP, tests plug in builders backed by
//! in-memory exporters.

use std::fmt;
use std::sync::Arc;

use opentelemetry::global;
use opentelemetry::metrics::MeterProvider as _;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use rtcscope_domain::constants::INSTRUMENTATION_SCOPE;
use rtcscope_domain::TelemetryConfig;

use super::crash_report::CrashReportBuffer;
use super::error::{TelemetryError, TelemetryResult};

/// SDK providers backing one telemetry instance
#[derive(Clone, Default)]
pub struct TelemetryPipeline {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
    crash_reports: Option<CrashReportBuffer>,
}

impl fmt::Debug for TelemetryPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryPipeline")
            .field("traces", &self.tracer_provider.is_some())
            .field("metrics", &self.meter_provider.is_some())
            .field("crash_reports", &self.crash_reports.as_ref().map(CrashReportBuffer::len))
            .finish()
    }
}

impl TelemetryPipeline {
    /// Pipeline that drops everything
    pub fn disabled() -> Self {
        Self::default()
    }

    pub const fn new(
        tracer_provider: Option<SdkTracerProvider>,
        meter_provider: Option<SdkMeterProvider>,
    ) -> Self {
        Self { tracer_provider, meter_provider, crash_reports: None }
    }

    #[must_use]
    pub fn with_crash_reports(mut self, buffer: CrashReportBuffer) -> Self {
        self.crash_reports = Some(buffer);
        self
    }

    pub const fn tracer_provider(&self) -> Option<&SdkTracerProvider> {
        self.tracer_provider.as_ref()
    }

    pub const fn meter_provider(&self) -> Option<&SdkMeterProvider> {
        self.meter_provider.as_ref()
    }

    pub const fn crash_reports(&self) -> Option<&CrashReportBuffer> {
        self.crash_reports.as_ref()
    }

    pub const fn is_enabled(&self) -> bool {
        self.tracer_provider.is_some() || self.meter_provider.is_some()
    }

    pub(crate) fn tracer(&self) -> Option<SdkTracer> {
        self.tracer_provider.as_ref().map(|provider| provider.tracer(INSTRUMENTATION_SCOPE))
    }

    pub(crate) fn meter(&self) -> Option<opentelemetry::metrics::Meter> {
        self.meter_provider.as_ref().map(|provider| provider.meter(INSTRUMENTATION_SCOPE))
    }

    /// Register the providers with `opentelemetry::global`.
    pub(crate) fn install_global(&self) {
        if let Some(provider) = &self.tracer_provider {
            global::set_tracer_provider(provider.clone());
        }
        if let Some(provider) = &self.meter_provider {
            global::set_meter_provider(provider.clone());
        }
    }

    /// Replace the global providers with empty ones.
    pub(crate) fn detach_global() {
        global::set_tracer_provider(SdkTracerProvider::builder().build());
        global::set_meter_provider(SdkMeterProvider::builder().build());
    }

    /// Flush both providers. Blocks; call from the blocking pool.
    ///
    /// Both providers are flushed even if the first one fails; the first
    /// error is returned.
    pub(crate) fn force_flush_blocking(&self) -> TelemetryResult<()> {
        let traces = self
            .tracer_provider
            .as_ref()
            .map_or(Ok(()), SdkTracerProvider::force_flush)
            .map_err(|source| TelemetryError::Flush { signal: "traces", source });
        let metrics = self
            .meter_provider
            .as_ref()
            .map_or(Ok(()), SdkMeterProvider::force_flush)
            .map_err(|source| TelemetryError::Flush { signal: "metrics", source });
        traces.and(metrics)
    }

    /// Shut both providers down. Blocks; call from the blocking pool.
    pub(crate) fn shutdown_blocking(&self) -> TelemetryResult<()> {
        let traces = self
            .tracer_provider
            .as_ref()
            .map_or(Ok(()), SdkTracerProvider::shutdown)
            .map_err(|source| TelemetryError::Shutdown { signal: "traces", source });
        let metrics = self
            .meter_provider
            .as_ref()
            .map_or(Ok(()), SdkMeterProvider::shutdown)
            .map_err(|source| TelemetryError::Shutdown { signal: "metrics", source });
        traces.and(metrics)
    }
}

/// Builds the providers for a configuration
pub trait PipelineBuilder: Send + Sync + fmt::Debug {
    /// Build the pipeline. Runs on the blocking pool.
    ///
    /// # Errors
    /// Returns a [`TelemetryError`] when no usable pipeline can be built;
    /// the caller then falls back to [`TelemetryPipeline::disabled`].
    fn build(&self, config: &TelemetryConfig) -> TelemetryResult<TelemetryPipeline>;
}

/// Builder producing a disabled pipeline for every configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPipelineBuilder;

impl PipelineBuilder for DisabledPipelineBuilder {
    fn build(&self, _config: &TelemetryConfig) -> TelemetryResult<TelemetryPipeline> {
        Ok(TelemetryPipeline::disabled())
    }
}

/// Builder used by the process-wide runtime
pub fn default_pipeline_builder() -> Arc<dyn PipelineBuilder> {
    #[cfg(feature = "otlp")]
    {
        Arc::new(OtlpPipelineBuilder)
    }
    #[cfg(not(feature = "otlp"))]
    {
        tracing::warn!("Built without the `otlp` feature; telemetry export is disabled");
        Arc::new(DisabledPipelineBuilder)
    }
}

#[cfg(feature = "otlp")]
pub use otlp::OtlpPipelineBuilder;

#[cfg(feature = "otlp")]
mod otlp {
    use std::time::Duration;

    use opentelemetry::KeyValue;
    use opentelemetry_otlp::{MetricExporter, Protocol, SpanExporter, WithExportConfig};
    use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
    use opentelemetry_sdk::trace::SdkTracerProvider;
    use opentelemetry_sdk::Resource;
    use opentelemetry_semantic_conventions as semconv;
    use rtcscope_domain::TelemetryConfig;
    use tracing::{error, info};

    use super::{PipelineBuilder, TelemetryPipeline};
    use crate::telemetry::crash_report::{CrashReportBuffer, CrashReportProcessor};
    use crate::telemetry::error::{TelemetryError, TelemetryResult};

    /// OTLP/HTTP exporters with a batch span processor and a periodic
    /// metric reader
    #[derive(Debug, Clone, Copy, Default)]
    pub struct OtlpPipelineBuilder;

    impl OtlpPipelineBuilder {
        fn resource(config: &TelemetryConfig) -> Resource {
            Resource::builder()
                .with_service_name(config.service_name.clone())
                .with_attributes(vec![KeyValue::new(
                    semconv::attribute::SERVICE_VERSION,
                    env!("CARGO_PKG_VERSION"),
                )])
                .build()
        }

        fn span_exporter(endpoint: &str, timeout: Duration) -> TelemetryResult<SpanExporter> {
            SpanExporter::builder()
                .with_http()
                .with_endpoint(endpoint)
                .with_protocol(Protocol::HttpBinary)
                .with_timeout(timeout)
                .build()
                .map_err(|e| TelemetryError::ExporterBuild { signal: "traces", reason: e.to_string() })
        }

        fn metric_exporter(endpoint: &str, timeout: Duration) -> TelemetryResult<MetricExporter> {
            MetricExporter::builder()
                .with_http()
                .with_endpoint(endpoint)
                .with_protocol(Protocol::HttpBinary)
                .with_timeout(timeout)
                .build()
                .map_err(|e| TelemetryError::ExporterBuild { signal: "metrics", reason: e.to_string() })
        }
    }

    impl PipelineBuilder for OtlpPipelineBuilder {
        fn build(&self, config: &TelemetryConfig) -> TelemetryResult<TelemetryPipeline> {
            let enablement = config.enablement();
            let resource = Self::resource(config);
            let timeout = config.export_timeout();

            let span_exporter = match config.traces_endpoint.as_deref() {
                Some(endpoint) if enablement.traces => {
                    match Self::span_exporter(endpoint, timeout) {
                        Ok(exporter) => {
                            info!(endpoint, "OTLP traces collector enabled");
                            Some(exporter)
                        }
                        Err(err) => {
                            error!(error = %err, "Traces exporter disabled");
                            None
                        }
                    }
                }
                _ => {
                    info!("OTLP traces collector disabled");
                    None
                }
            };

            let crash_reports = enablement
                .crash_reports
                .then(|| CrashReportBuffer::new(config.crash_report_capacity));

            let tracer_provider = if span_exporter.is_some() || crash_reports.is_some() {
                let mut builder = SdkTracerProvider::builder().with_resource(resource.clone());
                if let Some(exporter) = span_exporter {
                    builder = builder.with_batch_exporter(exporter);
                }
                if let Some(buffer) = &crash_reports {
                    builder = builder.with_span_processor(CrashReportProcessor::new(buffer.clone()));
                }
                Some(builder.build())
            } else {
                None
            };

            let meter_provider = match config.metrics_endpoint.as_deref() {
                Some(endpoint) if enablement.metrics => {
                    match Self::metric_exporter(endpoint, timeout) {
                        Ok(exporter) => {
                            info!(endpoint, "OTLP metrics collector enabled");
                            let reader = PeriodicReader::builder(exporter)
                                .with_interval(config.metric_export_interval())
                                .build();
                            Some(
                                SdkMeterProvider::builder()
                                    .with_resource(resource)
                                    .with_reader(reader)
                                    .build(),
                            )
                        }
                        Err(err) => {
                            error!(error = %err, "Metrics exporter disabled");
                            None
                        }
                    }
                }
                _ => {
                    info!("OTLP metrics collector disabled");
                    None
                }
            };

            let pipeline = TelemetryPipeline::new(tracer_provider, meter_provider);
            Ok(match crash_reports {
                Some(buffer) => pipeline.with_crash_reports(buffer),
                None => pipeline,
            })
        }
    }
}
