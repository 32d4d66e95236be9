//! Renders one stat record as metric values
//!
//! Push instruments are recorded immediately. Observable instruments get the
//! value staged in the [`ObservationBuffer`] and report it from their
//! callback at the next collection. A field missing from the record is
//! recorded with its zero value (`0`, `false`, `""`), so every instrument of
//! the record's schema entry has a value in each tick the record appears.

use std::sync::Arc;

use rtcscope_core::{descriptor, EmitOutcome, RecordContext, SchemaEntry};
use rtcscope_domain::{AttributeSet, RawStatRecord, StatValue};
use tracing::{trace, warn};

use super::instruments::{InstrumentCache, InstrumentHandle};
use super::observations::{key_values, ObservationBuffer};

/// Metric renderer over a shared [`InstrumentCache`]
#[derive(Debug, Clone)]
pub struct MetricEmitter {
    instruments: Arc<InstrumentCache>,
}

impl MetricEmitter {
    pub const fn new(instruments: Arc<InstrumentCache>) -> Self {
        Self { instruments }
    }

    pub const fn instruments(&self) -> &Arc<InstrumentCache> {
        &self.instruments
    }

    fn observations(&self) -> &ObservationBuffer {
        self.instruments.observations()
    }

    /// Record every metric field of `entry` for one record. Never blocks.
    pub fn emit(
        &self,
        context: &RecordContext,
        record: &RawStatRecord,
        entry: &'static SchemaEntry,
    ) -> EmitOutcome {
        let attributes = AttributeSet::new(
            context.participant_name.clone(),
            context.track_kind,
            context.room_name.clone(),
        );
        let mut outcome = EmitOutcome::default();

        for field in entry.active_fields(record).filter(|field| field.metric.is_some()) {
            let Some(descriptor) = descriptor(&entry.key(field)) else {
                continue;
            };

            let value = match record.field(field.source, field.value) {
                Ok(Some(value)) => value,
                Ok(None) => field.default_value(),
                Err(err) => {
                    warn!(
                        record_id = %record.id,
                        instrument = %descriptor.name,
                        error = %err,
                        "Skipping metric field with unexpected shape"
                    );
                    outcome.field_errors += 1;
                    continue;
                }
            };

            match self.instruments.get_or_create(descriptor) {
                InstrumentHandle::Histogram(histogram) => {
                    histogram.record(numeric(&value), &key_values(&attributes));
                }
                InstrumentHandle::Occurrences(counter) => {
                    let dimension = descriptor.dimension.unwrap_or(field.attribute);
                    let series = attributes.with_dimension(dimension, text(value));
                    counter.add(1, &key_values(&series));
                }
                InstrumentHandle::ObservedGauge(_) => {
                    self.observations().stage(descriptor.key, attributes.clone(), numeric(&value));
                }
                InstrumentHandle::ObservedCounter(_) => {
                    self.observations().accumulate(descriptor.key, attributes.clone(), numeric(&value));
                }
            }
            outcome.metric_points += 1;
        }

        trace!(
            stat_type = %entry.stat_type,
            points = outcome.metric_points,
            "Recorded metrics for stat record"
        );
        outcome
    }
}

fn numeric(value: &StatValue) -> f64 {
    match value {
        StatValue::Number(number) => *number,
        StatValue::Flag(flag) => f64::from(u8::from(*flag)),
        StatValue::Text(_) | StatValue::Structured(_) => 0.0,
    }
}

fn text(value: StatValue) -> String {
    match value {
        StatValue::Text(text) => text,
        StatValue::Number(number) => number.to_string(),
        StatValue::Flag(flag) => flag.to_string(),
        StatValue::Structured(json) => json.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::metrics::MeterProvider as _;
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use rtcscope_core::{lookup, DescriptorKey};
    use rtcscope_domain::{StatType, TrackKind};

    use super::*;

    fn emitter() -> MetricEmitter {
        let provider = SdkMeterProvider::builder().build();
        let cache = InstrumentCache::new(provider.meter("metric-emitter-test"), Arc::new(ObservationBuffer::new()));
        MetricEmitter::new(Arc::new(cache))
    }

    fn context(participant: &str, track_kind: TrackKind) -> RecordContext {
        RecordContext {
            room_name: "standup".into(),
            participant_identity: format!("@{participant}:example.org"),
            participant_name: participant.into(),
            track_sid: "TR_1".into(),
            track_kind,
        }
    }

    fn key(stat_type: StatType, track_kind: TrackKind, field: &'static str) -> DescriptorKey {
        DescriptorKey { stat_type, track_kind, field }
    }

    #[test]
    fn test_missing_bytes_sent_is_observed_as_zero() {
        let emitter = emitter();
        let entry = lookup(StatType::OutboundRtp, TrackKind::Audio).expect("outbound audio entry");
        let record = RawStatRecord::new("OT01A", "outbound-rtp")
            .with_field("packetsSent", StatValue::Number(42.0));

        let outcome = emitter.emit(&context("alice", TrackKind::Audio), &record, entry);
        assert!(outcome.metric_points > 0);

        let series = AttributeSet::new("alice", TrackKind::Audio, "standup");
        let observations = emitter.instruments().observations();
        assert_eq!(
            observations.latest(&key(StatType::OutboundRtp, TrackKind::Audio, "bytesSent"), &series),
            Some(0.0)
        );
        assert_eq!(
            observations.latest(&key(StatType::OutboundRtp, TrackKind::Audio, "packetsSent"), &series),
            Some(42.0)
        );
    }

    #[test]
    fn test_every_metric_field_gets_an_instrument() {
        let emitter = emitter();
        let entry = lookup(StatType::OutboundRtp, TrackKind::Audio).expect("outbound audio entry");
        let record = RawStatRecord::new("OT01A", "outbound-rtp");

        let outcome = emitter.emit(&context("alice", TrackKind::Audio), &record, entry);

        let expected = entry.active_fields(&record).filter(|field| field.metric.is_some()).count();
        assert_eq!(outcome.metric_points, expected);
        assert_eq!(emitter.instruments().len(), expected);
    }

    #[test]
    fn test_repeated_ticks_reuse_instruments_and_callbacks() {
        let emitter = emitter();
        let entry = lookup(StatType::InboundRtp, TrackKind::Video).expect("inbound video entry");

        for tick in 0..10 {
            let record = RawStatRecord::new("IT01V", "inbound-rtp")
                .with_field("bytesReceived", StatValue::Number(f64::from(tick) * 1000.0));
            emitter.emit(&context("bob", TrackKind::Video), &record, entry);
            emitter.instruments().observations().end_tick();
        }

        let cache = emitter.instruments();
        assert_eq!(cache.instruments_created(), cache.len());
        assert_eq!(cache.misses(), cache.len());
        assert!(cache.callbacks_registered() <= cache.len());
        assert_eq!(cache.hits(), cache.len() * 9);
    }

    #[test]
    fn test_flags_are_observed_as_one_or_zero() {
        assert!((numeric(&StatValue::Flag(true)) - 1.0).abs() < f64::EPSILON);
        assert!(numeric(&StatValue::Flag(false)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shape_errors_skip_only_the_bad_field() {
        let emitter = emitter();
        let entry = lookup(StatType::OutboundRtp, TrackKind::Audio).expect("outbound audio entry");
        let record = RawStatRecord::new("OT01A", "outbound-rtp")
            .with_field("bytesSent", StatValue::Flag(true))
            .with_field("packetsSent", StatValue::Number(7.0));

        let outcome = emitter.emit(&context("alice", TrackKind::Audio), &record, entry);
        assert_eq!(outcome.field_errors, 1);

        let series = AttributeSet::new("alice", TrackKind::Audio, "standup");
        let observations = emitter.instruments().observations();
        assert_eq!(
            observations.latest(&key(StatType::OutboundRtp, TrackKind::Audio, "bytesSent"), &series),
            None
        );
        assert_eq!(
            observations.latest(&key(StatType::OutboundRtp, TrackKind::Audio, "packetsSent"), &series),
            Some(7.0)
        );
    }
}
