//! Stats collection service - one sweep over a room

use std::time::Duration;

use rtcscope_domain::{extract_name, CollectionConfig, RawStatRecord, TrackKind};
use serde::Serialize;
use tracing::{debug, info, instrument, trace, warn};

use super::ports::{Participant, RecordContext, Room, TelemetrySink, TrackPublication};
use crate::schema;

/// Knobs for a sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionOptions {
    pub include_remote_participants: bool,
    pub include_aggregate_tracks: bool,
    /// Upper bound for a single stats request
    pub stats_timeout: Duration,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self::from(&CollectionConfig::default())
    }
}

impl From<&CollectionConfig> for CollectionOptions {
    fn from(config: &CollectionConfig) -> Self {
        Self {
            include_remote_participants: config.include_remote_participants,
            include_aggregate_tracks: config.include_aggregate_tracks,
            stats_timeout: config.stats_timeout(),
        }
    }
}

/// Counters describing one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Room was not connected; nothing was requested
    pub skipped: bool,
    /// Telemetry state was replaced mid-sweep; remaining results discarded
    pub superseded: bool,
    pub publications_skipped: usize,
    pub stats_requests: usize,
    pub records_dispatched: usize,
    pub records_ignored: usize,
    pub spans_emitted: usize,
    pub metric_points: usize,
    pub field_errors: usize,
    pub failures: usize,
}

/// Walks participants and publications of a room and feeds every supported
/// stat record to a [`TelemetrySink`].
#[derive(Debug, Clone, Default)]
pub struct CollectionService {
    options: CollectionOptions,
}

impl CollectionService {
    /// Create a new collection service
    pub const fn new(options: CollectionOptions) -> Self {
        Self { options }
    }

    pub const fn options(&self) -> &CollectionOptions {
        &self.options
    }

    /// Perform one sweep.
    ///
    /// Never fails: per-publication problems are logged and counted in the
    /// returned report. The sink is flushed once at the end unless the tick
    /// was skipped or superseded.
    #[instrument(skip_all, fields(room = %room.name()))]
    pub async fn collect(&self, room: &dyn Room, sink: &dyn TelemetrySink) -> TickReport {
        let mut report = TickReport::default();

        let state = room.connection_state();
        if !state.is_connected() {
            info!(state = ?state, "Room not connected; skipping stats collection");
            report.skipped = true;
            return report;
        }

        let room_name = room.name();
        let mut participants = Vec::new();
        if self.options.include_remote_participants {
            participants.extend(room.remote_participants());
        }
        participants.push(room.local_participant());

        for participant in participants {
            self.collect_participant(participant.as_ref(), &room_name, sink, &mut report).await;
            if report.superseded {
                info!("Telemetry state replaced during collection; discarding tick");
                return report;
            }
        }

        if let Err(err) = sink.flush().await {
            warn!(error = %err, "Failed to flush telemetry after collection");
            report.failures += 1;
        }

        debug!(
            stats_requests = report.stats_requests,
            records = report.records_dispatched,
            spans = report.spans_emitted,
            metric_points = report.metric_points,
            failures = report.failures,
            "Stats collection finished"
        );
        report
    }

    async fn collect_participant(
        &self,
        participant: &dyn Participant,
        room_name: &str,
        sink: &dyn TelemetrySink,
        report: &mut TickReport,
    ) {
        let identity = participant.identity();
        let name = extract_name(&identity);

        let mut groups = vec![
            (TrackKind::Audio, participant.audio_publications()),
            (TrackKind::Video, participant.video_publications()),
        ];
        if self.options.include_aggregate_tracks {
            groups.push((TrackKind::AllTracks, participant.all_publications()));
        }

        for (track_kind, publications) in groups {
            for publication in publications {
                let context = RecordContext {
                    room_name: room_name.to_string(),
                    participant_identity: identity.clone(),
                    participant_name: name.clone(),
                    track_sid: publication.track_sid(),
                    track_kind,
                };
                self.collect_publication(publication.as_ref(), &context, sink, report).await;
                if report.superseded {
                    return;
                }
            }
        }
    }

    async fn collect_publication(
        &self,
        publication: &dyn TrackPublication,
        context: &RecordContext,
        sink: &dyn TelemetrySink,
        report: &mut TickReport,
    ) {
        if !publication.is_subscribed() || !publication.has_track() {
            info!(
                participant = %context.participant_identity,
                track_sid = %context.track_sid,
                track_kind = %context.track_kind,
                "Track not subscribed; skipping"
            );
            report.publications_skipped += 1;
            return;
        }

        report.stats_requests += 1;
        let timeout = self.options.stats_timeout;
        let snapshot = match tokio::time::timeout(timeout, publication.stats_report()).await {
            Ok(Ok(Some(snapshot))) => snapshot,
            Ok(Ok(None)) => {
                info!(track_sid = %context.track_sid, "No stats available for track yet");
                return;
            }
            Ok(Err(err)) => {
                warn!(
                    participant = %context.participant_identity,
                    track_sid = %context.track_sid,
                    error = %err,
                    "Stats request failed"
                );
                report.failures += 1;
                return;
            }
            Err(_) => {
                warn!(
                    track_sid = %context.track_sid,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "Stats request timed out"
                );
                report.failures += 1;
                return;
            }
        };

        if !sink.is_current() {
            report.superseded = true;
            return;
        }

        for record in snapshot.records() {
            Self::dispatch(record, context, sink, report);
        }
    }

    fn dispatch(
        record: &RawStatRecord,
        context: &RecordContext,
        sink: &dyn TelemetrySink,
        report: &mut TickReport,
    ) {
        let entry = record.kind().and_then(|stat_type| schema::lookup(stat_type, context.track_kind));
        let Some(entry) = entry else {
            trace!(stat_type = %record.stat_type, "Ignoring unsupported stat record");
            report.records_ignored += 1;
            return;
        };

        let outcome = sink.emit(context, record, entry);
        report.records_dispatched += 1;
        if outcome.span_emitted {
            report.spans_emitted += 1;
        }
        report.metric_points += outcome.metric_points;
        report.field_errors += outcome.field_errors;
    }
}

#[cfg(test)]
mod tests {
    use rtcscope_domain::{ConnectionState, StatType, StatValue, StatsReport};

    use super::*;
    use crate::testing::{FakeParticipant, FakePublication, FakeRoom, RecordingSink};

    fn outbound_report(id: &str) -> StatsReport {
        [RawStatRecord::new(id, "outbound-rtp").with_field("bytesSent", StatValue::Number(10.0))]
            .into_iter()
            .collect()
    }

    fn fast_options() -> CollectionOptions {
        CollectionOptions { stats_timeout: Duration::from_millis(200), ..CollectionOptions::default() }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_disconnected_room_performs_no_requests() {
        let publication = FakePublication::with_report("TR_audio", outbound_report("o1"));
        let local = FakeParticipant::new("@alice:example.org").with_audio(publication.clone());
        let room = FakeRoom::new("standup", local);
        room.set_state(ConnectionState::Reconnecting);
        let sink = RecordingSink::new();

        let report = CollectionService::new(fast_options()).collect(&room, &sink).await;

        assert!(report.skipped);
        assert_eq!(report.stats_requests, 0);
        assert_eq!(report.spans_emitted, 0);
        assert_eq!(publication.requests(), 0);
        assert_eq!(sink.emitted().len(), 0);
        assert_eq!(sink.flushes(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failing_publication_does_not_block_others() {
        let failing = FakePublication::failing("TR_audio", "peer connection closed");
        let healthy = FakePublication::with_report("TR_video", outbound_report("o2"));
        let local = FakeParticipant::new("@alice:example.org")
            .with_audio(failing.clone())
            .with_video(healthy.clone());
        let room = FakeRoom::new("standup", local);
        let sink = RecordingSink::new();

        let report = CollectionService::new(fast_options()).collect(&room, &sink).await;

        assert_eq!(report.stats_requests, 2);
        assert_eq!(report.failures, 1);
        assert_eq!(report.spans_emitted, 1);
        let emitted = sink.emitted();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].context.track_sid, "TR_video");
        assert_eq!(emitted[0].context.track_kind, TrackKind::Video);
        assert_eq!(sink.flushes(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_slow_publication_times_out_and_sweep_continues() {
        let slow = FakePublication::with_report("TR_slow", outbound_report("o1"))
            .delayed(Duration::from_secs(5));
        let healthy = FakePublication::with_report("TR_fast", outbound_report("o2"));
        let local = FakeParticipant::new("@alice:example.org").with_audio(slow).with_audio(healthy);
        let room = FakeRoom::new("standup", local);
        let sink = RecordingSink::new();

        let options = CollectionOptions { stats_timeout: Duration::from_millis(50), ..fast_options() };
        let report = CollectionService::new(options).collect(&room, &sink).await;

        assert_eq!(report.failures, 1);
        assert_eq!(report.records_dispatched, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unsubscribed_and_unavailable_tracks_are_skipped() {
        let unsubscribed = FakePublication::with_report("TR_a", outbound_report("o1")).unsubscribed();
        let unavailable = FakePublication::unavailable("TR_b");
        let local = FakeParticipant::new("@alice:example.org")
            .with_audio(unsubscribed.clone())
            .with_video(unavailable.clone());
        let room = FakeRoom::new("standup", local);
        let sink = RecordingSink::new();

        let report = CollectionService::new(fast_options()).collect(&room, &sink).await;

        assert_eq!(report.publications_skipped, 1);
        assert_eq!(unsubscribed.requests(), 0);
        assert_eq!(unavailable.requests(), 1);
        assert_eq!(report.failures, 0);
        assert_eq!(report.records_dispatched, 0);
        assert_eq!(sink.flushes(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_publication_without_track_is_skipped() {
        let detached = FakePublication::with_report("TR_a", outbound_report("o1")).without_track();
        let healthy = FakePublication::with_report("TR_v", outbound_report("o2"));
        let local = FakeParticipant::new("@alice:example.org")
            .with_audio(detached.clone())
            .with_video(healthy.clone());
        let room = FakeRoom::new("standup", local);
        let sink = RecordingSink::new();

        let report = CollectionService::new(fast_options()).collect(&room, &sink).await;

        assert_eq!(report.publications_skipped, 1);
        assert_eq!(detached.requests(), 0);
        assert_eq!(healthy.requests(), 1);
        assert_eq!(report.stats_requests, 1);
        assert_eq!(report.records_dispatched, 1);
        assert_eq!(sink.emitted()[0].context.track_sid, "TR_v");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remote_participants_follow_options() {
        let local = FakeParticipant::new("@alice:example.org")
            .with_audio(FakePublication::with_report("TR_local", outbound_report("o1")));
        let remote = FakeParticipant::new("@bob:example.org")
            .with_audio(FakePublication::with_report("TR_remote", outbound_report("o2")));
        let room = FakeRoom::new("standup", local).with_remote(remote);

        let sink = RecordingSink::new();
        let report = CollectionService::new(fast_options()).collect(&room, &sink).await;
        assert_eq!(report.records_dispatched, 2);
        let names: Vec<_> =
            sink.emitted().into_iter().map(|emitted| emitted.context.participant_name).collect();
        assert_eq!(names, vec!["bob".to_string(), "alice".to_string()]);

        let local_only = CollectionOptions { include_remote_participants: false, ..fast_options() };
        let sink = RecordingSink::new();
        let report = CollectionService::new(local_only).collect(&room, &sink).await;
        assert_eq!(report.records_dispatched, 1);
        assert_eq!(sink.emitted()[0].context.participant_name, "alice");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_aggregate_tracks_dispatch_every_publication_again() {
        let local = FakeParticipant::new("@alice:example.org")
            .with_audio(FakePublication::with_report("TR_a", outbound_report("o1")))
            .with_video(FakePublication::with_report("TR_v", outbound_report("o2")));
        let room = FakeRoom::new("standup", local);
        let options = CollectionOptions { include_aggregate_tracks: true, ..fast_options() };
        let sink = RecordingSink::new();

        let report = CollectionService::new(options).collect(&room, &sink).await;

        assert_eq!(report.stats_requests, 4);
        let aggregate = sink
            .emitted()
            .into_iter()
            .filter(|emitted| emitted.context.track_kind == TrackKind::AllTracks)
            .count();
        assert_eq!(aggregate, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unsupported_records_are_ignored() {
        let report_with_unknown: StatsReport = [
            RawStatRecord::new("c1", "certificate"),
            RawStatRecord::new("i1", "inbound-rtp"),
        ]
        .into_iter()
        .collect();
        let local = FakeParticipant::new("@alice:example.org")
            .with_audio(FakePublication::with_report("TR_a", report_with_unknown));
        let room = FakeRoom::new("standup", local);
        let sink = RecordingSink::new();

        let report = CollectionService::new(fast_options()).collect(&room, &sink).await;

        assert_eq!(report.records_ignored, 1);
        assert_eq!(report.records_dispatched, 1);
        assert_eq!(sink.emitted()[0].stat_type, StatType::InboundRtp);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_superseded_sink_discards_results_and_skips_flush() {
        let publication = FakePublication::with_report("TR_a", outbound_report("o1"));
        let local = FakeParticipant::new("@alice:example.org").with_audio(publication.clone());
        let room = FakeRoom::new("standup", local);
        let sink = RecordingSink::new();
        sink.set_current(false);

        let report = CollectionService::new(fast_options()).collect(&room, &sink).await;

        assert!(report.superseded);
        assert_eq!(publication.requests(), 1);
        assert!(sink.emitted().is_empty());
        assert_eq!(sink.flushes(), 0);
    }

    #[test]
    fn test_options_follow_config() {
        let config = CollectionConfig {
            include_remote_participants: false,
            include_aggregate_tracks: true,
            stats_timeout_ms: 750,
            ..CollectionConfig::default()
        };
        let options = CollectionOptions::from(&config);
        assert!(!options.include_remote_participants);
        assert!(options.include_aggregate_tracks);
        assert_eq!(options.stats_timeout, Duration::from_millis(750));
        assert_eq!(CollectionService::new(options.clone()).options(), &options);
    }
}
