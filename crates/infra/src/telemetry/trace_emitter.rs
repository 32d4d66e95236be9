//! Renders one stat record as one span

use opentelemetry::trace::{Span as _, Status, Tracer as _};
use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::trace::SdkTracer;
use rtcscope_core::{EmitOutcome, RecordContext, SchemaEntry};
use rtcscope_domain::constants::{
    ATTR_PARTICIPANT_IDENTITY, ATTR_ROOM_NAME, ATTR_STAT_TYPE, ATTR_TRACK_SID, ATTR_TRACK_TYPE,
};
use rtcscope_domain::{RawStatRecord, StatValue};
use tracing::warn;

/// Span renderer bound to one tracer
#[derive(Debug, Clone)]
pub struct TraceEmitter {
    tracer: SdkTracer,
}

impl TraceEmitter {
    pub const fn new(tracer: SdkTracer) -> Self {
        Self { tracer }
    }

    /// Emit the span for one record.
    ///
    /// Fields with an unexpected shape are logged and left off the span,
    /// which then carries an error status. The span is always ended.
    pub fn emit(
        &self,
        context: &RecordContext,
        record: &RawStatRecord,
        entry: &'static SchemaEntry,
    ) -> EmitOutcome {
        let mut span = self.tracer.start(span_name(context, entry));

        span.set_attribute(KeyValue::new(ATTR_STAT_TYPE, entry.stat_type.as_str()));
        span.set_attribute(KeyValue::new(ATTR_TRACK_SID, context.track_sid.clone()));
        span.set_attribute(KeyValue::new(
            ATTR_PARTICIPANT_IDENTITY,
            context.participant_name.clone(),
        ));
        span.set_attribute(KeyValue::new(ATTR_TRACK_TYPE, context.track_kind.as_str()));
        span.set_attribute(KeyValue::new(ATTR_ROOM_NAME, context.room_name.clone()));

        let mut field_errors = 0;
        for field in entry.active_fields(record) {
            match record.field(field.source, field.value) {
                Ok(Some(value)) => span.set_attribute(KeyValue::new(field.attribute, otel_value(value))),
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        record_id = %record.id,
                        stat_type = %entry.stat_type,
                        error = %err,
                        "Skipping span attribute with unexpected shape"
                    );
                    field_errors += 1;
                }
            }
        }

        if field_errors > 0 {
            span.set_status(Status::error(format!("{field_errors} field(s) with unexpected shape")));
        }
        span.end();

        EmitOutcome { span_emitted: true, metric_points: 0, field_errors }
    }
}

fn span_name(context: &RecordContext, entry: &SchemaEntry) -> String {
    format!(
        "Room: {}, Participant: {}, RTCStatsType: {}, TrackType: {}",
        context.room_name,
        context.participant_name,
        entry.stat_type,
        context.track_kind.as_str()
    )
}

fn otel_value(value: StatValue) -> Value {
    match value {
        StatValue::Number(number) => Value::F64(number),
        StatValue::Flag(flag) => Value::Bool(flag),
        StatValue::Text(text) => Value::from(text),
        StatValue::Structured(json) => Value::from(json.to_string()),
    }
}
