//! Recurring stats collection loop
//!
//! [`CollectionScheduler`] runs one [`CollectionService`] sweep per period
//! against the sink of the active telemetry instance. The first tick fires
//! one period after `start`; `stop` cancels the timer, lets an in-flight
//! tick finish, and joins the loop task within the configured timeout.
//!
//! State machine: `Idle → Running → (Collecting → Running)* → Stopped`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rtcscope_core::Room;
//! use rtcscope_domain::Config;
//! use rtcscope_infra::scheduling::{CollectionScheduler, SchedulerResult};
//! use rtcscope_infra::telemetry;
//!
//! # async fn example(room: Arc<dyn Room>) -> SchedulerResult<()> {
//! let config = Config::default();
//! telemetry::init(config.telemetry.clone()).await;
//!
//! let mut scheduler = CollectionScheduler::new(config.collection);
//! scheduler.start(room)?;
//! // ... call runs ...
//! scheduler.stop().await?;
//! telemetry::dispose().await;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rtcscope_core::{CollectionOptions, CollectionService, Room, TelemetrySink, TickReport};
use rtcscope_domain::CollectionConfig;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};
use crate::telemetry::{self, TelemetryRuntime};

/* -------------------------------------------------------------------------- */
/* Sink sources */
/* -------------------------------------------------------------------------- */

/// Provides the sink a tick renders into
pub trait SinkSource: Send + Sync {
    /// Sink of the active telemetry state; `None` skips the tick.
    fn current_sink(&self) -> Option<Arc<dyn TelemetrySink>>;
}

impl SinkSource for TelemetryRuntime {
    fn current_sink(&self) -> Option<Arc<dyn TelemetrySink>> {
        self.current().map(|instance| Arc::new(instance.dispatcher()) as Arc<dyn TelemetrySink>)
    }
}

/// The process-wide telemetry runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalTelemetry;

impl SinkSource for GlobalTelemetry {
    fn current_sink(&self) -> Option<Arc<dyn TelemetrySink>> {
        telemetry::global().current_sink()
    }
}

/// Always the same sink
#[derive(Clone)]
pub struct FixedSink(pub Arc<dyn TelemetrySink>);

impl SinkSource for FixedSink {
    fn current_sink(&self) -> Option<Arc<dyn TelemetrySink>> {
        Some(Arc::clone(&self.0))
    }
}

/* -------------------------------------------------------------------------- */
/* Scheduler */
/* -------------------------------------------------------------------------- */

/// Lifecycle state of a [`CollectionScheduler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    /// Never started
    Idle,
    /// Waiting for the next tick
    Running,
    /// A sweep is in progress
    Collecting,
    Stopped,
}

struct TickRunner {
    service: CollectionService,
    sinks: Arc<dyn SinkSource>,
    state: Mutex<SchedulerState>,
    ticks: AtomicU64,
}

impl TickRunner {
    async fn run(&self, room: &dyn Room) -> TickReport {
        let Some(sink) = self.sinks.current_sink() else {
            debug!("Telemetry not initialized; skipping collection tick");
            return TickReport { skipped: true, ..TickReport::default() };
        };

        let previous = std::mem::replace(&mut *self.state.lock(), SchedulerState::Collecting);
        let report = self.service.collect(room, sink.as_ref()).await;
        {
            let mut state = self.state.lock();
            if *state == SchedulerState::Collecting {
                *state = previous;
            }
        }

        self.ticks.fetch_add(1, Ordering::SeqCst);
        report
    }

    fn set_state(&self, state: SchedulerState) {
        *self.state.lock() = state;
    }
}

/// Periodic collection loop with explicit lifecycle management
pub struct CollectionScheduler {
    config: CollectionConfig,
    runner: Arc<TickRunner>,
    task_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl std::fmt::Debug for CollectionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionScheduler")
            .field("interval", &self.interval())
            .field("state", &self.state())
            .field("ticks_completed", &self.ticks_completed())
            .finish_non_exhaustive()
    }
}

impl CollectionScheduler {
    /// Scheduler rendering into the process-wide telemetry runtime
    pub fn new(config: CollectionConfig) -> Self {
        Self::with_sinks(config, Arc::new(GlobalTelemetry))
    }

    pub fn with_sinks(config: CollectionConfig, sinks: Arc<dyn SinkSource>) -> Self {
        let runner = TickRunner {
            service: CollectionService::new(CollectionOptions::from(&config)),
            sinks,
            state: Mutex::new(SchedulerState::Idle),
            ticks: AtomicU64::new(0),
        };
        Self {
            config,
            runner: Arc::new(runner),
            task_handle: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Tick period, clamped to the supported range
    pub fn interval(&self) -> Duration {
        self.config.interval()
    }

    /// Start collecting from `room` every [`interval`](Self::interval).
    ///
    /// # Errors
    /// Returns [`SchedulerError::AlreadyRunning`] if the loop is active.
    #[instrument(skip(self, room), fields(room = %room.name()))]
    pub fn start(&mut self, room: Arc<dyn Room>) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();
        let cancel = self.cancellation.clone();
        let runner = Arc::clone(&self.runner);
        let period = self.interval();

        runner.set_state(SchedulerState::Running);
        let handle = tokio::spawn(async move {
            Self::collection_loop(runner, room, period, cancel).await;
        });
        self.task_handle = Some(handle);

        info!(interval_secs = period.as_secs(), "Stats collection started");
        Ok(())
    }

    /// Cancel the timer and wait for the loop task to finish.
    ///
    /// # Errors
    /// Returns [`SchedulerError::NotRunning`] if the loop is not active,
    /// [`SchedulerError::Timeout`] if an in-flight tick outlives the join
    /// timeout.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let joined = match self.task_handle.take() {
            Some(handle) => {
                let join_timeout = self.config.join_timeout();
                match tokio::time::timeout(join_timeout, handle).await {
                    Ok(result) => result.map_err(SchedulerError::from),
                    Err(_) => Err(SchedulerError::Timeout { duration: join_timeout }),
                }
            }
            None => Ok(()),
        };

        // the loop is cancelled either way; an in-flight tick finishes detached
        self.runner.set_state(SchedulerState::Stopped);
        self.cancellation = CancellationToken::new();
        if let Err(err) = &joined {
            warn!(error = %err, "Collection loop did not stop cleanly");
        }
        joined?;

        info!(ticks = self.ticks_completed(), "Stats collection stopped");
        Ok(())
    }

    /// Returns true while the loop task is active.
    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    pub fn state(&self) -> SchedulerState {
        *self.runner.state.lock()
    }

    /// Ticks that ran to completion, including skipped ones
    pub fn ticks_completed(&self) -> u64 {
        self.runner.ticks.load(Ordering::SeqCst)
    }

    /// Run one sweep immediately, outside the timer.
    pub async fn collect_now(&self, room: &dyn Room) -> TickReport {
        self.runner.run(room).await
    }

    async fn collection_loop(
        runner: Arc<TickRunner>,
        room: Arc<dyn Room>,
        period: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("Collection loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    let report = runner.run(room.as_ref()).await;
                    debug!(
                        skipped = report.skipped,
                        superseded = report.superseded,
                        records = report.records_dispatched,
                        failures = report.failures,
                        "Collection tick finished"
                    );
                }
            }
        }
    }
}

impl Drop for CollectionScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("CollectionScheduler dropped while running; cancelling collection loop");
            self.cancellation.cancel();
        }
    }
}
