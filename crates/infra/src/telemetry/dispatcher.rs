//! [`TelemetrySink`] implementation over a telemetry instance

use std::sync::Arc;

use async_trait::async_trait;
use rtcscope_core::{EmitOutcome, RecordContext, SchemaEntry, TelemetrySink};
use rtcscope_domain::{RawStatRecord, Result};
use tracing::debug;

use super::runtime::TelemetryInstance;

/// Routes each record to the trace and metric emitters of one instance
#[derive(Debug, Clone)]
pub struct TelemetryDispatcher {
    instance: Arc<TelemetryInstance>,
}

impl TelemetryDispatcher {
    pub const fn new(instance: Arc<TelemetryInstance>) -> Self {
        Self { instance }
    }

    pub const fn instance(&self) -> &Arc<TelemetryInstance> {
        &self.instance
    }
}

#[async_trait]
impl TelemetrySink for TelemetryDispatcher {
    fn is_current(&self) -> bool {
        self.instance.is_current()
    }

    fn emit(&self, context: &RecordContext, record: &RawStatRecord, entry: &'static SchemaEntry) -> EmitOutcome {
        if self.instance.is_disposed() {
            return EmitOutcome::default();
        }

        let spans = self
            .instance
            .traces()
            .map(|traces| traces.emit(context, record, entry))
            .unwrap_or_default();
        let metrics = self
            .instance
            .metrics()
            .map(|metrics| metrics.emit(context, record, entry))
            .unwrap_or_default();

        // both emitters see the same malformed fields
        EmitOutcome {
            span_emitted: spans.span_emitted,
            metric_points: metrics.metric_points,
            field_errors: spans.field_errors.max(metrics.field_errors),
        }
    }

    async fn flush(&self) -> Result<()> {
        let pruned = self.instance.observations().end_tick();
        if pruned > 0 {
            debug!(pruned, "Dropped metric series not refreshed this tick");
        }
        self.instance.force_flush().await
    }
}
