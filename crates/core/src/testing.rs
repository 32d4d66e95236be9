//! In-memory collaborators for tests
//!
//! Enabled with the `test-utils` feature. The fakes implement the room
//! ports with scripted stats responses and request counters;
//! [`RecordingSink`] captures what the collection service dispatches.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rtcscope_domain::{
    ConnectionState, RawStatRecord, Result, RtcScopeError, StatType, StatsReport,
};

use crate::collection::{EmitOutcome, Participant, RecordContext, Room, TelemetrySink, TrackPublication};
use crate::schema::SchemaEntry;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/* -------------------------------------------------------------------------- */
/* Publications */
/* -------------------------------------------------------------------------- */

/// Scripted response of a [`FakePublication`]
#[derive(Debug, Clone)]
pub enum StatsScript {
    Report(StatsReport),
    Unavailable,
    Fail(String),
}

/// Track publication returning a scripted stats response
#[derive(Debug)]
pub struct FakePublication {
    sid: String,
    subscribed: AtomicBool,
    has_track: AtomicBool,
    script: Mutex<StatsScript>,
    delay: Mutex<Option<Duration>>,
    requests: AtomicUsize,
}

impl FakePublication {
    pub fn new(sid: &str, script: StatsScript) -> Arc<Self> {
        Arc::new(Self {
            sid: sid.to_string(),
            subscribed: AtomicBool::new(true),
            has_track: AtomicBool::new(true),
            script: Mutex::new(script),
            delay: Mutex::new(None),
            requests: AtomicUsize::new(0),
        })
    }

    pub fn with_report(sid: &str, report: StatsReport) -> Arc<Self> {
        Self::new(sid, StatsScript::Report(report))
    }

    pub fn unavailable(sid: &str) -> Arc<Self> {
        Self::new(sid, StatsScript::Unavailable)
    }

    pub fn failing(sid: &str, message: &str) -> Arc<Self> {
        Self::new(sid, StatsScript::Fail(message.to_string()))
    }

    /// Mark the publication as not subscribed.
    pub fn unsubscribed(self: Arc<Self>) -> Arc<Self> {
        self.subscribed.store(false, Ordering::SeqCst);
        self
    }

    /// Detach the media track.
    pub fn without_track(self: Arc<Self>) -> Arc<Self> {
        self.has_track.store(false, Ordering::SeqCst);
        self
    }

    /// Sleep before answering each stats request.
    pub fn delayed(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        *lock(&self.delay) = Some(delay);
        self
    }

    pub fn set_script(&self, script: StatsScript) {
        *lock(&self.script) = script;
    }

    /// Number of stats requests received
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrackPublication for FakePublication {
    fn track_sid(&self) -> String {
        self.sid.clone()
    }

    fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }

    fn has_track(&self) -> bool {
        self.has_track.load(Ordering::SeqCst)
    }

    async fn stats_report(&self) -> Result<Option<StatsReport>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let script = lock(&self.script).clone();
        match script {
            StatsScript::Report(report) => Ok(Some(report)),
            StatsScript::Unavailable => Ok(None),
            StatsScript::Fail(message) => Err(RtcScopeError::Stats(message)),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Participants and rooms */
/* -------------------------------------------------------------------------- */

/// Participant with a fixed set of publications
#[derive(Debug, Clone)]
pub struct FakeParticipant {
    identity: String,
    audio: Vec<Arc<FakePublication>>,
    video: Vec<Arc<FakePublication>>,
}

impl FakeParticipant {
    pub fn new(identity: &str) -> Self {
        Self { identity: identity.to_string(), audio: Vec::new(), video: Vec::new() }
    }

    #[must_use]
    pub fn with_audio(mut self, publication: Arc<FakePublication>) -> Self {
        self.audio.push(publication);
        self
    }

    #[must_use]
    pub fn with_video(mut self, publication: Arc<FakePublication>) -> Self {
        self.video.push(publication);
        self
    }
}

impl Participant for FakeParticipant {
    fn identity(&self) -> String {
        self.identity.clone()
    }

    fn audio_publications(&self) -> Vec<Arc<dyn TrackPublication>> {
        self.audio.iter().map(|publication| publication.clone() as Arc<dyn TrackPublication>).collect()
    }

    fn video_publications(&self) -> Vec<Arc<dyn TrackPublication>> {
        self.video.iter().map(|publication| publication.clone() as Arc<dyn TrackPublication>).collect()
    }
}

/// Room with a switchable connection state
#[derive(Debug)]
pub struct FakeRoom {
    name: String,
    state: Mutex<ConnectionState>,
    local: Arc<FakeParticipant>,
    remotes: Vec<Arc<FakeParticipant>>,
}

impl FakeRoom {
    /// A connected room with only a local participant.
    pub fn new(name: &str, local: FakeParticipant) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(ConnectionState::Connected),
            local: Arc::new(local),
            remotes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_remote(mut self, remote: FakeParticipant) -> Self {
        self.remotes.push(Arc::new(remote));
        self
    }

    pub fn set_state(&self, state: ConnectionState) {
        *lock(&self.state) = state;
    }
}

impl Room for FakeRoom {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn connection_state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    fn local_participant(&self) -> Arc<dyn Participant> {
        self.local.clone()
    }

    fn remote_participants(&self) -> Vec<Arc<dyn Participant>> {
        self.remotes.iter().map(|remote| remote.clone() as Arc<dyn Participant>).collect()
    }
}

/* -------------------------------------------------------------------------- */
/* Sink */
/* -------------------------------------------------------------------------- */

/// One record seen by a [`RecordingSink`]
#[derive(Debug, Clone)]
pub struct EmittedRecord {
    pub context: RecordContext,
    pub record_id: String,
    pub stat_type: StatType,
}

/// Sink that remembers every dispatched record
#[derive(Debug)]
pub struct RecordingSink {
    current: AtomicBool,
    emitted: Mutex<Vec<EmittedRecord>>,
    flushes: AtomicUsize,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self { current: AtomicBool::new(true), emitted: Mutex::new(Vec::new()), flushes: AtomicUsize::new(0) }
    }

    pub fn set_current(&self, current: bool) {
        self.current.store(current, Ordering::SeqCst);
    }

    pub fn emitted(&self) -> Vec<EmittedRecord> {
        lock(&self.emitted).clone()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetrySink for RecordingSink {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst)
    }

    fn emit(&self, context: &RecordContext, record: &RawStatRecord, entry: &'static SchemaEntry) -> EmitOutcome {
        lock(&self.emitted).push(EmittedRecord {
            context: context.clone(),
            record_id: record.id.clone(),
            stat_type: entry.stat_type,
        });
        EmitOutcome { span_emitted: true, metric_points: 0, field_errors: 0 }
    }

    async fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
