//! Latest-value buffer behind the observable instruments
//!
//! The metric emitter stages one value per descriptor and attribute series;
//! the instrument callbacks read the buffer when the meter provider collects.
//! Gauges keep the latest staged value, cumulative counters sum everything
//! staged for the series within one tick.
//! A series is the full [`AttributeSet`], dimensions included.
//!
//! Every series remembers the tick it was last written in. [`end_tick`]
//! drops series that were not refreshed during the tick that is ending, so
//! participants who left the call stop being reported.
//!
//! [`end_tick`]: ObservationBuffer::end_tick

use std::collections::HashMap;

use opentelemetry::KeyValue;
use parking_lot::RwLock;
use rtcscope_core::DescriptorKey;
use rtcscope_domain::AttributeSet;

#[derive(Debug, Clone, Copy)]
struct Observation {
    value: f64,
    tick: u64,
}

#[derive(Debug, Default)]
struct BufferState {
    tick: u64,
    series: HashMap<DescriptorKey, HashMap<AttributeSet, Observation>>,
}

/// Per-descriptor latest values, shared with instrument callbacks
#[derive(Debug, Default)]
pub struct ObservationBuffer {
    state: RwLock<BufferState>,
}

impl ObservationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` as the latest observation of one series.
    pub fn stage(&self, key: DescriptorKey, attributes: AttributeSet, value: f64) {
        let mut state = self.state.write();
        let tick = state.tick;
        state.series.entry(key).or_default().insert(attributes, Observation { value, tick });
    }

    /// Add `value` to a series already staged in the current tick, or start
    /// the series from `value`.
    ///
    /// Used for cumulative totals: several records of one participant and
    /// track kind (camera and screenshare, simulcast layers) report into the
    /// same series, and their totals sum.
    pub fn accumulate(&self, key: DescriptorKey, attributes: AttributeSet, value: f64) {
        let mut state = self.state.write();
        let tick = state.tick;
        let observation = state
            .series
            .entry(key)
            .or_default()
            .entry(attributes)
            .or_insert(Observation { value: 0.0, tick });
        if observation.tick == tick {
            observation.value += value;
        } else {
            *observation = Observation { value, tick };
        }
    }

    pub fn latest(&self, key: &DescriptorKey, attributes: &AttributeSet) -> Option<f64> {
        self.state
            .read()
            .series
            .get(key)
            .and_then(|series| series.get(attributes))
            .map(|observation| observation.value)
    }

    /// Every series of a descriptor with its latest value.
    pub fn observations(&self, key: &DescriptorKey) -> Vec<(AttributeSet, f64)> {
        self.state.read().series.get(key).map_or_else(Vec::new, |series| {
            series
                .iter()
                .map(|(attributes, observation)| (attributes.clone(), observation.value))
                .collect()
        })
    }

    /// Total number of buffered series across descriptors
    pub fn series_count(&self) -> usize {
        self.state.read().series.values().map(HashMap::len).sum()
    }

    /// Close the current tick.
    ///
    /// Drops series not staged since the previous call and returns how many
    /// were dropped.
    pub fn end_tick(&self) -> usize {
        let mut state = self.state.write();
        let current = state.tick;
        let mut pruned = 0;

        state.series.retain(|_, series| {
            let before = series.len();
            series.retain(|_, observation| observation.tick == current);
            pruned += before - series.len();
            !series.is_empty()
        });

        state.tick = current.wrapping_add(1);
        pruned
    }
}

/// OpenTelemetry attributes for one series
pub(crate) fn key_values(attributes: &AttributeSet) -> Vec<KeyValue> {
    attributes
        .pairs()
        .map(|(key, value)| KeyValue::new(key.to_string(), value.to_string()))
        .collect()
}
