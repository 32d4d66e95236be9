//! Instrument cache
//!
//! Holds exactly one instrument per [`MetricDescriptor`] for the lifetime of
//! a telemetry instance. Observable instruments register their single
//! callback when they are created; later lookups return the cached handle
//! without touching the meter again.
//!
//! | Descriptor                     | Instrument                  |
//! |--------------------------------|-----------------------------|
//! | histogram                      | `Histogram<f64>` (push)     |
//! | gauge                          | `ObservableGauge<f64>`      |
//! | counter over a number          | `ObservableCounter<f64>`    |
//! | counter over text (occurrence) | `Counter<u64>` (push, `+1`) |

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use opentelemetry::metrics::{Counter, Histogram, Meter, ObservableCounter, ObservableGauge};
use parking_lot::RwLock;
use rtcscope_core::{DescriptorKey, InstrumentKind, MetricDescriptor};
use rtcscope_domain::ValueKind;
use tracing::debug;

use super::observations::{key_values, ObservationBuffer};

/// A created instrument
#[derive(Clone)]
pub enum InstrumentHandle {
    Histogram(Histogram<f64>),
    Occurrences(Counter<u64>),
    ObservedGauge(ObservableGauge<f64>),
    ObservedCounter(ObservableCounter<f64>),
}

impl InstrumentHandle {
    /// Whether values go through the observation buffer
    pub const fn is_observed(&self) -> bool {
        matches!(self, Self::ObservedGauge(_) | Self::ObservedCounter(_))
    }
}

impl fmt::Debug for InstrumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Histogram(_) => "Histogram",
            Self::Occurrences(_) => "Occurrences",
            Self::ObservedGauge(_) => "ObservedGauge",
            Self::ObservedCounter(_) => "ObservedCounter",
        };
        f.debug_tuple("InstrumentHandle").field(&kind).finish()
    }
}

/// Cache counters
#[derive(Debug, Default)]
pub struct InstrumentCacheMetrics {
    /// Instruments created on the meter
    pub instruments_created: AtomicUsize,
    /// Observation callbacks registered
    pub callbacks_registered: AtomicUsize,
    pub cache_hits: AtomicUsize,
    pub cache_misses: AtomicUsize,
}

/// One instrument per descriptor, created lazily on a single meter
pub struct InstrumentCache {
    meter: Meter,
    observations: Arc<ObservationBuffer>,
    handles: RwLock<HashMap<DescriptorKey, InstrumentHandle>>,
    metrics: InstrumentCacheMetrics,
}

impl fmt::Debug for InstrumentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentCache")
            .field("instruments", &self.handles.read().len())
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl InstrumentCache {
    pub fn new(meter: Meter, observations: Arc<ObservationBuffer>) -> Self {
        Self {
            meter,
            observations,
            handles: RwLock::new(HashMap::new()),
            metrics: InstrumentCacheMetrics::default(),
        }
    }

    /// Return the instrument for `descriptor`, creating it on first use.
    pub fn get_or_create(&self, descriptor: &'static MetricDescriptor) -> InstrumentHandle {
        if let Some(handle) = self.handles.read().get(&descriptor.key) {
            self.metrics.cache_hits.fetch_add(1, Ordering::SeqCst);
            return handle.clone();
        }

        let mut handles = self.handles.write();
        // Another caller may have created it between the two locks.
        if let Some(handle) = handles.get(&descriptor.key) {
            self.metrics.cache_hits.fetch_add(1, Ordering::SeqCst);
            return handle.clone();
        }

        self.metrics.cache_misses.fetch_add(1, Ordering::SeqCst);
        let handle = self.create(descriptor);
        handles.insert(descriptor.key, handle.clone());
        handle
    }

    fn create(&self, descriptor: &'static MetricDescriptor) -> InstrumentHandle {
        let name = descriptor.name.clone();
        let description = descriptor.description.clone();

        let handle = match (descriptor.instrument, descriptor.value) {
            (InstrumentKind::Histogram, _) => InstrumentHandle::Histogram(
                self.meter.f64_histogram(name).with_description(description).build(),
            ),
            (InstrumentKind::Counter, ValueKind::Text | ValueKind::Json) => {
                InstrumentHandle::Occurrences(
                    self.meter.u64_counter(name).with_description(description).build(),
                )
            }
            (InstrumentKind::Counter, _) => {
                let observations = Arc::clone(&self.observations);
                let key = descriptor.key;
                let counter = self
                    .meter
                    .f64_observable_counter(name)
                    .with_description(description)
                    .with_callback(move |observer| {
                        for (attributes, value) in observations.observations(&key) {
                            observer.observe(value, &key_values(&attributes));
                        }
                    })
                    .build();
                self.metrics.callbacks_registered.fetch_add(1, Ordering::SeqCst);
                InstrumentHandle::ObservedCounter(counter)
            }
            (InstrumentKind::Gauge, _) => {
                let observations = Arc::clone(&self.observations);
                let key = descriptor.key;
                let gauge = self
                    .meter
                    .f64_observable_gauge(name)
                    .with_description(description)
                    .with_callback(move |observer| {
                        for (attributes, value) in observations.observations(&key) {
                            observer.observe(value, &key_values(&attributes));
                        }
                    })
                    .build();
                self.metrics.callbacks_registered.fetch_add(1, Ordering::SeqCst);
                InstrumentHandle::ObservedGauge(gauge)
            }
        };

        self.metrics.instruments_created.fetch_add(1, Ordering::SeqCst);
        debug!(instrument = %descriptor.name, kind = ?handle, "Created metrics instrument");
        handle
    }

    /// Whether an instrument exists for `key`
    pub fn contains(&self, key: &DescriptorKey) -> bool {
        self.handles.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }

    pub fn instruments_created(&self) -> usize {
        self.metrics.instruments_created.load(Ordering::SeqCst)
    }

    pub fn callbacks_registered(&self) -> usize {
        self.metrics.callbacks_registered.load(Ordering::SeqCst)
    }

    pub fn hits(&self) -> usize {
        self.metrics.cache_hits.load(Ordering::SeqCst)
    }

    pub fn misses(&self) -> usize {
        self.metrics.cache_misses.load(Ordering::SeqCst)
    }

    pub const fn observations(&self) -> &Arc<ObservationBuffer> {
        &self.observations
    }
}
