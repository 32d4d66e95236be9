//! Port interfaces for stats collection
//!
//! The room traits describe the read-only query surface of the hosting call
//! application; [`TelemetrySink`] is implemented by the telemetry adapters
//! that render records into spans and metrics.

use std::sync::Arc;

use async_trait::async_trait;
use rtcscope_domain::{ConnectionState, RawStatRecord, Result, StatsReport, TrackKind};

use crate::schema::SchemaEntry;

/// Read-only view of a call room
pub trait Room: Send + Sync {
    /// Room name attached to every span and metric
    fn name(&self) -> String;

    fn connection_state(&self) -> ConnectionState;

    fn local_participant(&self) -> Arc<dyn Participant>;

    fn remote_participants(&self) -> Vec<Arc<dyn Participant>>;
}

/// A call participant, local or remote
pub trait Participant: Send + Sync {
    /// Opaque protocol identifier, usually `@user:domain`
    fn identity(&self) -> String;

    fn audio_publications(&self) -> Vec<Arc<dyn TrackPublication>>;

    fn video_publications(&self) -> Vec<Arc<dyn TrackPublication>>;

    /// Every publication regardless of media kind
    fn all_publications(&self) -> Vec<Arc<dyn TrackPublication>> {
        let mut publications = self.audio_publications();
        publications.extend(self.video_publications());
        publications
    }
}

/// One published track
#[async_trait]
pub trait TrackPublication: Send + Sync {
    fn track_sid(&self) -> String;

    fn is_subscribed(&self) -> bool;

    /// Whether a media track is attached to the publication
    fn has_track(&self) -> bool;

    /// Request a stats snapshot; `Ok(None)` when none is available yet.
    async fn stats_report(&self) -> Result<Option<StatsReport>>;
}

/// Identity of the publication a record was taken from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordContext {
    pub room_name: String,
    /// Raw participant identifier
    pub participant_identity: String,
    /// Human-readable participant name
    pub participant_name: String,
    pub track_sid: String,
    pub track_kind: TrackKind,
}

/// What rendering one record produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitOutcome {
    pub span_emitted: bool,
    pub metric_points: usize,
    /// Fields skipped or defaulted because of an unexpected shape
    pub field_errors: usize,
}

/// Destination for classified stat records
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// False once the telemetry state this sink renders into was replaced.
    fn is_current(&self) -> bool;

    /// Render one record. Must not block.
    fn emit(&self, context: &RecordContext, record: &RawStatRecord, entry: &'static SchemaEntry) -> EmitOutcome;

    /// Finish the tick and flush both pipelines.
    async fn flush(&self) -> Result<()>;
}
