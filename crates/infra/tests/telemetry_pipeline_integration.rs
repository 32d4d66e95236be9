//! Integration tests for the collection → telemetry path
//!
//! Drives real collection sweeps over fake rooms into a telemetry runtime
//! whose pipeline exports to memory.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, Span, SpanData, SpanProcessor};
use rtcscope_core::testing::{FakeParticipant, FakePublication, FakeRoom, StatsScript};
use rtcscope_core::{CollectionOptions, CollectionService, DescriptorKey};
use rtcscope_domain::{
    AttributeSet, CollectionConfig, ConnectionState, RawStatRecord, StatType, StatValue, StatsReport,
    TelemetryConfig, TrackKind,
};
use rtcscope_infra::scheduling::SinkSource;
use rtcscope_infra::telemetry::{
    CrashReportBuffer, CrashReportProcessor, PipelineBuilder, TelemetryPipeline, TelemetryResult,
};
use rtcscope_infra::{CollectionScheduler, TelemetryRuntime};
use tokio_test::assert_ok;

/* -------------------------------------------------------------------------- */
/* Harness */
/* -------------------------------------------------------------------------- */

type EventLog = Arc<Mutex<Vec<String>>>;

fn push(log: &EventLog, event: String) {
    log.lock().expect("event log").push(event);
}

/// Records the shutdown of the provider it is attached to, once.
#[derive(Debug)]
struct ShutdownProbe {
    label: String,
    log: EventLog,
    done: AtomicBool,
}

impl ShutdownProbe {
    fn record(&self) -> OTelSdkResult {
        if !self.done.swap(true, Ordering::SeqCst) {
            push(&self.log, format!("shutdown:{}", self.label));
        }
        Ok(())
    }
}

impl SpanProcessor for ShutdownProbe {
    fn on_start(&self, _span: &mut Span, _cx: &opentelemetry::Context) {}

    fn on_end(&self, _span: SpanData) {}

    fn force_flush(&self) -> OTelSdkResult {
        Ok(())
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> OTelSdkResult {
        self.record()
    }

    fn shutdown(&self) -> OTelSdkResult {
        self.record()
    }
}

/// Builds in-memory pipelines and logs every build.
#[derive(Debug, Default)]
struct InMemoryPipelineBuilder {
    spans: InMemorySpanExporter,
    log: EventLog,
}

impl PipelineBuilder for InMemoryPipelineBuilder {
    fn build(&self, config: &TelemetryConfig) -> TelemetryResult<TelemetryPipeline> {
        push(&self.log, format!("build:{}", config.service_name));

        let crash_reports = CrashReportBuffer::new(config.crash_report_capacity);
        let tracer_provider = SdkTracerProvider::builder()
            .with_simple_exporter(self.spans.clone())
            .with_span_processor(CrashReportProcessor::new(crash_reports.clone()))
            .with_span_processor(ShutdownProbe {
                label: config.service_name.clone(),
                log: Arc::clone(&self.log),
                done: AtomicBool::new(false),
            })
            .build();
        let meter_provider = SdkMeterProvider::builder().build();

        Ok(TelemetryPipeline::new(Some(tracer_provider), Some(meter_provider)).with_crash_reports(crash_reports))
    }
}

fn telemetry_config(service_name: &str) -> TelemetryConfig {
    TelemetryConfig {
        service_name: service_name.into(),
        crash_report_capacity: 16,
        install_global: false,
        ..TelemetryConfig::default()
    }
}

fn outbound_audio(bytes_sent: Option<f64>) -> StatsReport {
    let mut record = RawStatRecord::new("OT01A", "outbound-rtp").with_field("packetsSent", StatValue::Number(120.0));
    if let Some(bytes) = bytes_sent {
        record = record.with_field("bytesSent", StatValue::Number(bytes));
    }
    std::iter::once(record).collect()
}

fn inbound_video() -> StatsReport {
    std::iter::once(
        RawStatRecord::new("IT01V", "inbound-rtp")
            .with_field("bytesReceived", StatValue::Number(64_000.0))
            .with_field("framesDecoded", StatValue::Number(300.0)),
    )
    .collect()
}

fn standup_room(audio: Arc<FakePublication>) -> FakeRoom {
    FakeRoom::new("standup", FakeParticipant::new("@alice:example.org").with_audio(audio))
}

fn bytes_sent_key() -> DescriptorKey {
    DescriptorKey { stat_type: StatType::OutboundRtp, track_kind: TrackKind::Audio, field: "bytesSent" }
}

/* -------------------------------------------------------------------------- */
/* Collection into telemetry */
/* -------------------------------------------------------------------------- */

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_bytes_sent_is_exported_as_zero() {
    let builder = Arc::new(InMemoryPipelineBuilder::default());
    let runtime = TelemetryRuntime::with_builder(builder.clone());
    let instance = runtime.init(telemetry_config("client")).await;

    let room = standup_room(FakePublication::with_report("TR_A", outbound_audio(None)));
    let report = CollectionService::default().collect(&room, &instance.dispatcher()).await;

    assert_eq!(report.records_dispatched, 1);
    assert_eq!(report.spans_emitted, 1);
    assert_eq!(report.failures, 0);

    let series = AttributeSet::new("alice", TrackKind::Audio, "standup");
    assert_eq!(instance.observations().latest(&bytes_sent_key(), &series), Some(0.0));

    let spans = assert_ok!(builder.spans.get_finished_spans());
    assert_eq!(spans.len(), 1);
    assert_eq!(
        spans[0].name,
        "Room: standup, Participant: alice, RTCStatsType: outbound-rtp, TrackType: audio"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_instruments_are_created_once_across_ticks() {
    let runtime = Arc::new(TelemetryRuntime::with_builder(Arc::new(InMemoryPipelineBuilder::default())));
    let instance = runtime.init(telemetry_config("client")).await;
    let scheduler =
        CollectionScheduler::with_sinks(CollectionConfig::default(), Arc::clone(&runtime) as Arc<dyn SinkSource>);

    let publication = FakePublication::with_report("TR_A", outbound_audio(Some(1_000.0)));
    let room = standup_room(Arc::clone(&publication));

    scheduler.collect_now(&room).await;
    let cache = instance.instruments().expect("metrics enabled");
    let after_first = cache.instruments_created();
    assert!(after_first > 0);

    for tick in 2..=5 {
        publication.set_script(StatsScript::Report(outbound_audio(Some(f64::from(tick) * 1_000.0))));
        let report = scheduler.collect_now(&room).await;
        assert_eq!(report.records_dispatched, 1);
    }

    assert_eq!(cache.instruments_created(), after_first);
    assert_eq!(cache.len(), after_first);
    assert!(cache.callbacks_registered() <= cache.len());
    assert_eq!(scheduler.ticks_completed(), 5);

    let series = AttributeSet::new("alice", TrackKind::Audio, "standup");
    assert_eq!(instance.observations().latest(&bytes_sent_key(), &series), Some(5_000.0));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cumulative_totals_of_one_participant_are_summed() {
    let runtime = TelemetryRuntime::with_builder(Arc::new(InMemoryPipelineBuilder::default()));
    let instance = runtime.init(telemetry_config("client")).await;

    let outbound_video = |id: &str, bytes: f64| -> StatsReport {
        std::iter::once(
            RawStatRecord::new(id, "outbound-rtp").with_field("bytesSent", StatValue::Number(bytes)),
        )
        .collect()
    };
    let local = FakeParticipant::new("@alice:example.org")
        .with_video(FakePublication::with_report("TR_CAM", outbound_video("OT01V", 1_000_000.0)))
        .with_video(FakePublication::with_report("TR_SCR", outbound_video("OT02V", 2_000.0)));
    let room = FakeRoom::new("standup", local);

    let report = CollectionService::default().collect(&room, &instance.dispatcher()).await;
    assert_eq!(report.records_dispatched, 2);

    let key = DescriptorKey { stat_type: StatType::OutboundRtp, track_kind: TrackKind::Video, field: "bytesSent" };
    let series = AttributeSet::new("alice", TrackKind::Video, "standup");
    assert_eq!(instance.observations().observations(&key).len(), 1);
    assert_eq!(instance.observations().latest(&key, &series), Some(1_002_000.0));

    // next tick starts from the fresh totals instead of adding to the old sum
    let report = CollectionService::default().collect(&room, &instance.dispatcher()).await;
    assert_eq!(report.records_dispatched, 2);
    assert_eq!(instance.observations().latest(&key, &series), Some(1_002_000.0));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disconnected_room_is_not_polled() {
    let builder = Arc::new(InMemoryPipelineBuilder::default());
    let runtime = TelemetryRuntime::with_builder(builder.clone());
    let instance = runtime.init(telemetry_config("client")).await;

    let publication = FakePublication::with_report("TR_A", outbound_audio(Some(10.0)));
    let room = standup_room(Arc::clone(&publication));
    room.set_state(ConnectionState::Reconnecting);

    let report = CollectionService::default().collect(&room, &instance.dispatcher()).await;

    assert!(report.skipped);
    assert_eq!(publication.requests(), 0);
    assert_eq!(instance.observations().series_count(), 0);
    assert!(assert_ok!(builder.spans.get_finished_spans()).is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failing_publication_does_not_stop_the_tick() {
    let builder = Arc::new(InMemoryPipelineBuilder::default());
    let runtime = TelemetryRuntime::with_builder(builder.clone());
    let instance = runtime.init(telemetry_config("client")).await;

    let local = FakeParticipant::new("@alice:example.org")
        .with_audio(FakePublication::failing("TR_A", "peer connection closed"))
        .with_video(FakePublication::with_report("TR_V", inbound_video()));
    let room = FakeRoom::new("standup", local);

    let report = CollectionService::default().collect(&room, &instance.dispatcher()).await;

    assert_eq!(report.failures, 1);
    assert_eq!(report.stats_requests, 2);
    assert_eq!(report.records_dispatched, 1);

    let spans = assert_ok!(builder.spans.get_finished_spans());
    assert_eq!(spans.len(), 1);
    assert!(spans[0].name.contains("TrackType: video"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_crash_report_contains_recent_spans() {
    let runtime = TelemetryRuntime::with_builder(Arc::new(InMemoryPipelineBuilder::default()));
    let instance = runtime.init(telemetry_config("client")).await;

    let room = standup_room(FakePublication::with_report("TR_A", outbound_audio(Some(512.0))));
    CollectionService::default().collect(&room, &instance.dispatcher()).await;

    let document = instance.crash_report().expect("crash reports enabled");
    assert_eq!(document["capacity"], 16);
    let spans = document["spans"].as_array().expect("spans array");
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0]["attributes"]["participant.identity"], "alice");
}

/* -------------------------------------------------------------------------- */
/* Reconfiguration */
/* -------------------------------------------------------------------------- */

#[tokio::test(flavor = "multi_thread")]
async fn test_reconfiguration_shuts_down_before_rebuilding() {
    let builder = Arc::new(InMemoryPipelineBuilder::default());
    let runtime = TelemetryRuntime::with_builder(builder.clone());

    let first = runtime.init(telemetry_config("a")).await;
    let again = runtime.init(telemetry_config("a")).await;
    assert!(Arc::ptr_eq(&first, &again));

    let second = runtime.init(telemetry_config("b")).await;

    assert!(first.is_disposed());
    assert!(second.is_current());
    assert_eq!(
        builder.log.lock().expect("event log").clone(),
        vec!["build:a".to_string(), "shutdown:a".to_string(), "build:b".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_tick_superseded_by_reconfiguration_is_discarded() {
    let runtime = TelemetryRuntime::with_builder(Arc::new(InMemoryPipelineBuilder::default()));
    let first = runtime.init(telemetry_config("a")).await;

    let slow = FakePublication::with_report("TR_A", outbound_audio(Some(2_048.0))).delayed(Duration::from_millis(300));
    let room = Arc::new(standup_room(slow));

    let sink = first.dispatcher();
    let tick_room = Arc::clone(&room);
    let tick = tokio::spawn(async move {
        CollectionService::new(CollectionOptions::default()).collect(tick_room.as_ref(), &sink).await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = runtime.init(telemetry_config("b")).await;

    let report = assert_ok!(tick.await);
    assert!(report.superseded);
    assert_eq!(report.records_dispatched, 0);
    assert_eq!(first.observations().series_count(), 0);
    assert_eq!(second.observations().series_count(), 0);
    assert!(second.instruments().is_some_and(|cache| cache.is_empty()));
}
