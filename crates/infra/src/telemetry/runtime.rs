//! Telemetry process state
//!
//! [`TelemetryRuntime`] owns the single active [`TelemetryInstance`]. Every
//! `init` with a changed configuration and every `dispose` bumps a
//! generation counter; an instance is current only while its generation is
//! the runtime's latest and it has not been disposed. Collection ticks check
//! this after each await, so results of a superseded tick never reach the
//! instruments of a newer instance.
//!
//! Reconfiguration disposes the previous instance (flush, shutdown, detach
//! from the global providers) before the next one is built, so no two
//! instances export at the same time.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rtcscope_domain::{Result, TelemetryConfig};
use tracing::{debug, error, info, instrument, warn};

use super::crash_report::CrashReportBuffer;
use super::dispatcher::TelemetryDispatcher;
use super::error::TelemetryError;
use super::instruments::InstrumentCache;
use super::metric_emitter::MetricEmitter;
use super::observations::ObservationBuffer;
use super::pipeline::{default_pipeline_builder, PipelineBuilder, TelemetryPipeline};
use super::trace_emitter::TraceEmitter;
use crate::errors::InfraError;

/* -------------------------------------------------------------------------- */
/* Instance */
/* -------------------------------------------------------------------------- */

/// One generation of telemetry state: providers, emitters and instruments
#[derive(Debug)]
pub struct TelemetryInstance {
    generation: u64,
    config: TelemetryConfig,
    pipeline: TelemetryPipeline,
    observations: Arc<ObservationBuffer>,
    traces: Option<TraceEmitter>,
    metrics: Option<MetricEmitter>,
    disposed: AtomicBool,
    latest_generation: Arc<AtomicU64>,
}

impl TelemetryInstance {
    fn new(
        generation: u64,
        config: TelemetryConfig,
        pipeline: TelemetryPipeline,
        latest_generation: Arc<AtomicU64>,
    ) -> Self {
        let observations = Arc::new(ObservationBuffer::new());
        let traces = pipeline.tracer().map(TraceEmitter::new);
        let metrics = pipeline.meter().map(|meter| {
            MetricEmitter::new(Arc::new(InstrumentCache::new(meter, Arc::clone(&observations))))
        });

        Self {
            generation,
            config,
            pipeline,
            observations,
            traces,
            metrics,
            disposed: AtomicBool::new(false),
            latest_generation,
        }
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub const fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub const fn pipeline(&self) -> &TelemetryPipeline {
        &self.pipeline
    }

    pub const fn traces(&self) -> Option<&TraceEmitter> {
        self.traces.as_ref()
    }

    pub const fn metrics(&self) -> Option<&MetricEmitter> {
        self.metrics.as_ref()
    }

    /// Instrument cache, when metrics are enabled
    pub fn instruments(&self) -> Option<&Arc<InstrumentCache>> {
        self.metrics.as_ref().map(MetricEmitter::instruments)
    }

    pub const fn observations(&self) -> &Arc<ObservationBuffer> {
        &self.observations
    }

    pub const fn crash_reports(&self) -> Option<&CrashReportBuffer> {
        self.pipeline.crash_reports()
    }

    /// Recent spans as a JSON document for a crash report
    pub fn crash_report(&self) -> Option<serde_json::Value> {
        self.crash_reports().map(CrashReportBuffer::to_json)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// False once the instance was disposed or replaced.
    pub fn is_current(&self) -> bool {
        !self.is_disposed() && self.latest_generation.load(Ordering::SeqCst) == self.generation
    }

    /// Sink rendering collected records into this instance
    pub fn dispatcher(self: &Arc<Self>) -> TelemetryDispatcher {
        TelemetryDispatcher::new(Arc::clone(self))
    }

    fn blocking_timeout(&self) -> Duration {
        self.config.export_timeout().saturating_mul(2)
    }

    /// Flush both pipelines and wait for the exports to finish.
    ///
    /// A disposed instance has nothing left to flush.
    ///
    /// # Errors
    /// Returns `RtcScopeError::Telemetry` if a provider fails to flush and
    /// `RtcScopeError::Timeout` if flushing does not finish in time.
    pub async fn force_flush(&self) -> Result<()> {
        if self.is_disposed() {
            debug!(generation = self.generation, "Flush requested on disposed telemetry instance");
            return Ok(());
        }

        let pipeline = self.pipeline.clone();
        let timeout = self.blocking_timeout();
        let flushed = tokio::time::timeout(
            timeout,
            tokio::task::spawn_blocking(move || pipeline.force_flush_blocking()),
        )
        .await
        .map_err(|_| TelemetryError::Timeout { millis: millis(timeout) })?
        .map_err(InfraError::from)?;

        Ok(flushed?)
    }

    /// Flush, shut down, and detach the providers. Idempotent.
    async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let pipeline = self.pipeline.clone();
        let timeout = self.blocking_timeout();
        let closed = tokio::time::timeout(
            timeout,
            tokio::task::spawn_blocking(move || {
                let flushed = pipeline.force_flush_blocking();
                let shut_down = pipeline.shutdown_blocking();
                flushed.and(shut_down)
            }),
        )
        .await;

        match closed {
            Ok(Ok(Ok(()))) => debug!(generation = self.generation, "Telemetry providers shut down"),
            Ok(Ok(Err(err))) => warn!(error = %err, "Telemetry providers did not shut down cleanly"),
            Ok(Err(err)) => warn!(error = %err, "Telemetry shutdown task failed"),
            Err(_) => warn!(timeout_ms = millis(timeout), "Telemetry shutdown timed out"),
        }

        if self.config.install_global && self.pipeline.is_enabled() {
            TelemetryPipeline::detach_global();
        }
        info!(generation = self.generation, "Telemetry instance disposed");
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/* -------------------------------------------------------------------------- */
/* Runtime */
/* -------------------------------------------------------------------------- */

/// Container for the active telemetry instance
pub struct TelemetryRuntime {
    builder: Arc<dyn PipelineBuilder>,
    lifecycle: tokio::sync::Mutex<()>,
    active: RwLock<Option<Arc<TelemetryInstance>>>,
    generation: Arc<AtomicU64>,
}

impl std::fmt::Debug for TelemetryRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryRuntime")
            .field("builder", &self.builder)
            .field("generation", &self.generation())
            .field("active", &self.active.read().as_ref().map(|instance| instance.generation()))
            .finish_non_exhaustive()
    }
}

impl Default for TelemetryRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryRuntime {
    /// Runtime using the default pipeline builder
    pub fn new() -> Self {
        Self::with_builder(default_pipeline_builder())
    }

    pub fn with_builder(builder: Arc<dyn PipelineBuilder>) -> Self {
        Self {
            builder,
            lifecycle: tokio::sync::Mutex::new(()),
            active: RwLock::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Latest generation handed out
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The active instance, if any
    pub fn current(&self) -> Option<Arc<TelemetryInstance>> {
        self.active.read().clone()
    }

    /// Create or replace the active instance.
    ///
    /// Re-entrant: a configuration equal to the active one returns the active
    /// instance untouched. Any other configuration disposes the active
    /// instance before the new pipeline is built. A pipeline that fails to
    /// build is logged and replaced by a disabled one.
    #[instrument(skip(self, config), fields(service = %config.service_name))]
    pub async fn init(&self, config: TelemetryConfig) -> Arc<TelemetryInstance> {
        let _lifecycle = self.lifecycle.lock().await;

        if let Some(active) = self.current() {
            if active.config() == &config {
                debug!(generation = active.generation(), "Telemetry configuration unchanged");
                return active;
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = self.active.write().take();
        if let Some(previous) = previous {
            info!(previous = previous.generation(), "Reconfiguring telemetry; disposing previous instance");
            previous.dispose().await;
        }

        let builder = Arc::clone(&self.builder);
        let build_config = config.clone();
        let pipeline = match tokio::task::spawn_blocking(move || builder.build(&build_config)).await {
            Ok(Ok(pipeline)) => pipeline,
            Ok(Err(err)) => {
                error!(error = %err, "Failed to build telemetry pipeline; telemetry disabled");
                TelemetryPipeline::disabled()
            }
            Err(err) => {
                error!(error = %err, "Telemetry pipeline builder failed; telemetry disabled");
                TelemetryPipeline::disabled()
            }
        };

        if config.install_global && pipeline.is_enabled() {
            pipeline.install_global();
        }

        let instance = Arc::new(TelemetryInstance::new(
            generation,
            config,
            pipeline,
            Arc::clone(&self.generation),
        ));
        *self.active.write() = Some(Arc::clone(&instance));

        info!(
            generation,
            traces = instance.traces().is_some(),
            metrics = instance.metrics().is_some(),
            crash_reports = instance.crash_reports().is_some(),
            "Telemetry initialized"
        );
        instance
    }

    /// Dispose the active instance. Idempotent.
    #[instrument(skip(self))]
    pub async fn dispose(&self) {
        let _lifecycle = self.lifecycle.lock().await;

        let previous = self.active.write().take();
        if let Some(instance) = previous {
            self.generation.fetch_add(1, Ordering::SeqCst);
            instance.dispose().await;
        }
    }

    /// Flush the active instance; a no-op when none is active.
    ///
    /// # Errors
    /// See [`TelemetryInstance::force_flush`].
    pub async fn force_flush(&self) -> Result<()> {
        match self.current() {
            Some(instance) => instance.force_flush().await,
            None => Ok(()),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Process-wide runtime */
/* -------------------------------------------------------------------------- */

static GLOBAL_RUNTIME: Lazy<TelemetryRuntime> = Lazy::new(TelemetryRuntime::new);

/// The process-wide runtime
pub fn global() -> &'static TelemetryRuntime {
    &GLOBAL_RUNTIME
}

/// [`TelemetryRuntime::init`] on the process-wide runtime
pub async fn init(config: TelemetryConfig) -> Arc<TelemetryInstance> {
    global().init(config).await
}

/// [`TelemetryRuntime::dispose`] on the process-wide runtime
pub async fn dispose() {
    global().dispose().await;
}

/// [`TelemetryRuntime::force_flush`] on the process-wide runtime
///
/// # Errors
/// See [`TelemetryInstance::force_flush`].
pub async fn force_flush() -> Result<()> {
    global().force_flush().await
}

/// Active instance of the process-wide runtime
pub fn current() -> Option<Arc<TelemetryInstance>> {
    global().current()
}

#[cfg(test)]
mod tests {
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};

    use super::*;
    use crate::telemetry::error::TelemetryResult;

    #[derive(Debug, Default)]
    struct InMemoryBuilder;

    impl PipelineBuilder for InMemoryBuilder {
        fn build(&self, _config: &TelemetryConfig) -> TelemetryResult<TelemetryPipeline> {
            let tracer_provider = SdkTracerProvider::builder()
                .with_simple_exporter(InMemorySpanExporter::default())
                .build();
            Ok(TelemetryPipeline::new(Some(tracer_provider), Some(SdkMeterProvider::builder().build())))
        }
    }

    #[derive(Debug, Default)]
    struct FailingBuilder;

    impl PipelineBuilder for FailingBuilder {
        fn build(&self, _config: &TelemetryConfig) -> TelemetryResult<TelemetryPipeline> {
            Err(TelemetryError::ExporterBuild { signal: "traces", reason: "unreachable".into() })
        }
    }

    fn config(service_name: &str) -> TelemetryConfig {
        TelemetryConfig {
            service_name: service_name.into(),
            install_global: false,
            ..TelemetryConfig::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_init_with_same_config_is_reentrant() {
        let runtime = TelemetryRuntime::with_builder(Arc::new(InMemoryBuilder));

        let first = runtime.init(config("a")).await;
        let second = runtime.init(config("a")).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(runtime.generation(), 1);
        assert!(first.is_current());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reconfiguration_disposes_previous_instance() {
        let runtime = TelemetryRuntime::with_builder(Arc::new(InMemoryBuilder));

        let first = runtime.init(config("a")).await;
        let second = runtime.init(config("b")).await;

        assert!(first.is_disposed());
        assert!(!first.is_current());
        assert!(second.is_current());
        assert_eq!(second.generation(), 2);
        assert!(first.force_flush().await.is_ok(), "flushing a disposed instance is a no-op");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dispose_is_idempotent() {
        let runtime = TelemetryRuntime::with_builder(Arc::new(InMemoryBuilder));
        let instance = runtime.init(config("a")).await;

        runtime.dispose().await;
        runtime.dispose().await;

        assert!(instance.is_disposed());
        assert!(runtime.current().is_none());
        assert!(runtime.force_flush().await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_builder_failure_falls_back_to_disabled_pipeline() {
        let runtime = TelemetryRuntime::with_builder(Arc::new(FailingBuilder));
        let instance = runtime.init(config("a")).await;

        assert!(!instance.pipeline().is_enabled());
        assert!(instance.traces().is_none());
        assert!(instance.instruments().is_none());
        assert!(instance.force_flush().await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_enabled_pipeline_gets_emitters() {
        let runtime = TelemetryRuntime::with_builder(Arc::new(InMemoryBuilder));
        let instance = runtime.init(config("a")).await;

        assert!(instance.traces().is_some());
        assert!(instance.instruments().is_some_and(|cache| cache.is_empty()));
        assert!(instance.crash_report().is_none());
        instance.force_flush().await.expect("in-memory flush succeeds");
    }
}
