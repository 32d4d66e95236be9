//! Crash-report span buffer
//!
//! When a crash-report endpoint is configured, the tracer provider gets an
//! extra [`CrashReportProcessor`] that keeps the most recent finished spans
//! in a bounded ring buffer. The host attaches [`CrashReportBuffer::to_json`]
//! to the crash or bug report it submits to that endpoint.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use opentelemetry::trace::Status;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::trace::{Span, SpanData, SpanProcessor};
use parking_lot::Mutex;
use serde::Serialize;

/// One finished span as kept for crash reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrashReportSpan {
    pub name: String,
    pub trace_id: String,
    /// Start time in milliseconds since the Unix epoch
    pub start_unix_ms: u64,
    pub duration_ms: u64,
    pub status: String,
    pub attributes: BTreeMap<String, String>,
}

impl CrashReportSpan {
    fn from_span_data(span: &SpanData) -> Self {
        let start_unix_ms = span
            .start_time
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| millis(elapsed));
        let duration_ms =
            span.end_time.duration_since(span.start_time).map_or(0, |elapsed| millis(elapsed));
        let status = match &span.status {
            Status::Unset => "unset".to_string(),
            Status::Ok => "ok".to_string(),
            Status::Error { description } => format!("error: {description}"),
        };

        Self {
            name: span.name.to_string(),
            trace_id: span.span_context.trace_id().to_string(),
            start_unix_ms,
            duration_ms,
            status,
            attributes: span
                .attributes
                .iter()
                .map(|kv| (kv.key.as_str().to_string(), kv.value.to_string()))
                .collect(),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Bounded, shareable ring buffer of recent spans
#[derive(Debug, Clone)]
pub struct CrashReportBuffer {
    capacity: usize,
    spans: Arc<Mutex<VecDeque<CrashReportSpan>>>,
}

impl CrashReportBuffer {
    /// Create a buffer keeping at most `capacity` spans (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { capacity, spans: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))) }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.spans.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.lock().is_empty()
    }

    fn push(&self, span: CrashReportSpan) {
        let mut spans = self.spans.lock();
        while spans.len() >= self.capacity {
            spans.pop_front();
        }
        spans.push_back(span);
    }

    /// Oldest-first copy of the buffered spans
    pub fn snapshot(&self) -> Vec<CrashReportSpan> {
        self.spans.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.spans.lock().clear();
    }

    /// Report document: capture time, capacity, and the buffered spans.
    pub fn to_json(&self) -> serde_json::Value {
        let captured_at_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| millis(elapsed));
        serde_json::json!({
            "captured_at_ms": captured_at_ms,
            "capacity": self.capacity,
            "spans": self.snapshot(),
        })
    }
}

/// Span processor feeding a [`CrashReportBuffer`]
#[derive(Debug)]
pub struct CrashReportProcessor {
    buffer: CrashReportBuffer,
}

impl CrashReportProcessor {
    pub const fn new(buffer: CrashReportBuffer) -> Self {
        Self { buffer }
    }
}

impl SpanProcessor for CrashReportProcessor {
    fn on_start(&self, _span: &mut Span, _cx: &opentelemetry::Context) {}

    fn on_end(&self, span: SpanData) {
        self.buffer.push(CrashReportSpan::from_span_data(&span));
    }

    fn force_flush(&self) -> OTelSdkResult {
        Ok(())
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> OTelSdkResult {
        Ok(())
    }

    fn shutdown(&self) -> OTelSdkResult {
        Ok(())
    }
}
