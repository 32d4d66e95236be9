//! Stat Schema Registry
//!
//! Static mapping from `(StatType, TrackKind)` to the ordered fields the
//! trace and metric renderers extract, and for each metric field the
//! instrument it feeds.
//!
//! ## Lookup
//! [`lookup`] scans a fixed table; nothing here runs per field or per tick.
//! Stat types without an entry (or unknown to [`StatType`]) are ignored by
//! the collection loop.
//!
//! ## Metric descriptors
//! [`descriptor`] resolves the process-wide [`MetricDescriptor`] for a
//! `(stat type, track kind, field)` key. The descriptor table is built once
//! from the schema on first access and never changes afterwards.
//!
//! ## Missing values
//! Renderers substitute [`FieldSpec::default_value`] for absent metric
//! fields: `0` for numbers and flags, `""` for text.

mod table;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rtcscope_domain::{RawStatRecord, StatType, StatValue, TrackKind, ValueKind};
use serde::{Deserialize, Serialize};

/* -------------------------------------------------------------------------- */
/* Schema types */
/* -------------------------------------------------------------------------- */

/// Metrics instrument kind a field feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Counter,
    Gauge,
    Histogram,
}

/// One extracted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Key in the raw stat record
    pub source: &'static str,
    /// Span attribute name
    pub attribute: &'static str,
    pub value: ValueKind,
    /// Instrument fed by this field; `None` for trace-only fields
    pub metric: Option<InstrumentKind>,
}

impl FieldSpec {
    /// Value recorded when the field is absent from a record.
    #[must_use]
    pub fn default_value(&self) -> StatValue {
        match self.value {
            ValueKind::Number => StatValue::Number(0.0),
            ValueKind::Flag => StatValue::Flag(false),
            ValueKind::Text | ValueKind::Json => StatValue::Text(String::new()),
        }
    }

    /// True for text fields counted once per record.
    #[must_use]
    pub fn is_occurrence(&self) -> bool {
        self.metric == Some(InstrumentKind::Counter) && self.value == ValueKind::Text
    }
}

/// When a section applies to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Always,
    /// Only when a text field has the given value
    TextEquals { field: &'static str, value: &'static str },
}

/// Contiguous group of fields sharing an activation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub activation: Activation,
    /// Instrument-name segment overriding the track kind
    pub segment: Option<&'static str>,
    pub fields: &'static [FieldSpec],
}

impl Section {
    #[must_use]
    pub fn is_active(&self, record: &RawStatRecord) -> bool {
        match self.activation {
            Activation::Always => true,
            Activation::TextEquals { field, value } => record.text(field) == Some(value),
        }
    }
}

/// Schema for one `(StatType, TrackKind)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaEntry {
    pub stat_type: StatType,
    pub track_kind: TrackKind,
    pub sections: &'static [Section],
}

impl SchemaEntry {
    /// Every field of the entry, active or not.
    pub fn fields(&'static self) -> impl Iterator<Item = &'static FieldSpec> {
        self.sections.iter().flat_map(|section| section.fields.iter())
    }

    /// Fields whose section applies to `record`, in schema order.
    pub fn active_fields<'r>(
        &'static self,
        record: &'r RawStatRecord,
    ) -> impl Iterator<Item = &'static FieldSpec> + 'r {
        self.sections
            .iter()
            .filter(move |section| section.is_active(record))
            .flat_map(|section| section.fields.iter())
    }

    /// Descriptor key for one of this entry's fields.
    #[must_use]
    pub const fn key(&self, field: &FieldSpec) -> DescriptorKey {
        DescriptorKey { stat_type: self.stat_type, track_kind: self.track_kind, field: field.source }
    }
}

/// Schema entry for a pair, if the pair is dispatched at all.
#[must_use]
pub fn lookup(stat_type: StatType, track_kind: TrackKind) -> Option<&'static SchemaEntry> {
    table::ENTRIES
        .iter()
        .find(|entry| entry.stat_type == stat_type && entry.track_kind == track_kind)
}

/// Every schema entry.
pub fn entries() -> impl Iterator<Item = &'static SchemaEntry> {
    table::ENTRIES.iter()
}

/* -------------------------------------------------------------------------- */
/* Metric descriptors */
/* -------------------------------------------------------------------------- */

/// Identity of an instrument: `(stat type, track kind, field)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorKey {
    pub stat_type: StatType,
    pub track_kind: TrackKind,
    pub field: &'static str,
}

/// Static description of one metrics instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub key: DescriptorKey,
    /// Instrument name, e.g. `outbound_rtp_audio_bytes_sent`
    pub name: String,
    pub description: String,
    pub instrument: InstrumentKind,
    pub value: ValueKind,
    /// Dimension key for occurrence counters
    pub dimension: Option<&'static str>,
}

impl MetricDescriptor {
    fn new(entry: &SchemaEntry, section: &Section, field: &FieldSpec, instrument: InstrumentKind) -> Self {
        let (segment, segment_label) = section.segment.map_or_else(
            || (entry.track_kind.metric_segment(), entry.track_kind.metric_segment().replace('_', " ")),
            |segment| (segment, segment.replace('_', " ")),
        );
        let field_name = snake_case(field.source);
        let occurrence = field.is_occurrence();

        let name = if occurrence {
            format!("{}_{segment}_{field_name}_count", entry.stat_type.metric_prefix())
        } else {
            format!("{}_{segment}_{field_name}", entry.stat_type.metric_prefix())
        };
        let description = if occurrence {
            format!(
                "Occurrences of each {} for {} {segment_label}",
                humanize(field.source).to_lowercase(),
                entry.stat_type.label()
            )
        } else {
            format!("{} for {} {segment_label}", humanize(field.source), entry.stat_type.label())
        };

        Self {
            key: entry.key(field),
            name,
            description,
            instrument,
            value: field.value,
            dimension: occurrence.then_some(field.attribute),
        }
    }
}

static DESCRIPTORS: Lazy<HashMap<DescriptorKey, MetricDescriptor>> = Lazy::new(|| {
    let mut descriptors = HashMap::new();
    for entry in table::ENTRIES {
        for section in entry.sections {
            for field in section.fields {
                if let Some(instrument) = field.metric {
                    let descriptor = MetricDescriptor::new(entry, section, field, instrument);
                    descriptors.insert(descriptor.key, descriptor);
                }
            }
        }
    }
    descriptors
});

/// Descriptor for a key, if the field feeds an instrument.
#[must_use]
pub fn descriptor(key: &DescriptorKey) -> Option<&'static MetricDescriptor> {
    DESCRIPTORS.get(key)
}

/// Every metric descriptor derived from the schema.
pub fn descriptors() -> impl Iterator<Item = &'static MetricDescriptor> {
    DESCRIPTORS.values()
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (index, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if index > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn humanize(name: &str) -> String {
    let spaced = snake_case(name).replace('_', " ");
    let mut chars = spaced.chars();
    chars.next().map_or_else(String::new, |first| first.to_ascii_uppercase().to_string() + chars.as_str())
}
