//! RTC statistics record types
//!
//! This module models the loosely-typed WebRTC stats dictionaries the media
//! SDK hands back for each track publication:
//! - `StatType`: the ten supported stat dictionaries
//! - `TrackKind`: media kind of the publication a record came from
//! - `StatValue` / `ValueKind`: field values and the shape a field should have
//! - `RawStatRecord` / `StatsReport`: one record and an id-keyed snapshot

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{FieldShapeError, Result, RtcScopeError};

/* -------------------------------------------------------------------------- */
/* Stat Types */
/* -------------------------------------------------------------------------- */

/// Supported WebRTC stat dictionaries.
///
/// Records whose `type` is not listed here are ignored by the pipeline;
/// use [`StatType::parse`] to classify a raw type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatType {
    #[serde(rename = "codec")]
    Codec,
    #[serde(rename = "inbound-rtp")]
    InboundRtp,
    #[serde(rename = "outbound-rtp")]
    OutboundRtp,
    #[serde(rename = "remote-inbound-rtp")]
    RemoteInboundRtp,
    #[serde(rename = "remote-outbound-rtp")]
    RemoteOutboundRtp,
    #[serde(rename = "candidate-pair")]
    CandidatePair,
    #[serde(rename = "transport")]
    Transport,
    #[serde(rename = "data-channel")]
    DataChannel,
    #[serde(rename = "media-source")]
    MediaSource,
    #[serde(rename = "media-playout")]
    MediaPlayout,
}

impl StatType {
    /// Every supported stat type, in dispatch order.
    pub const ALL: [Self; 10] = [
        Self::Codec,
        Self::InboundRtp,
        Self::OutboundRtp,
        Self::RemoteInboundRtp,
        Self::RemoteOutboundRtp,
        Self::CandidatePair,
        Self::Transport,
        Self::DataChannel,
        Self::MediaSource,
        Self::MediaPlayout,
    ];

    /// WebRTC dictionary name, e.g. `outbound-rtp`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Codec => "codec",
            Self::InboundRtp => "inbound-rtp",
            Self::OutboundRtp => "outbound-rtp",
            Self::RemoteInboundRtp => "remote-inbound-rtp",
            Self::RemoteOutboundRtp => "remote-outbound-rtp",
            Self::CandidatePair => "candidate-pair",
            Self::Transport => "transport",
            Self::DataChannel => "data-channel",
            Self::MediaSource => "media-source",
            Self::MediaPlayout => "media-playout",
        }
    }

    /// Snake-case prefix used in instrument names, e.g. `outbound_rtp`.
    #[must_use]
    pub const fn metric_prefix(&self) -> &'static str {
        match self {
            Self::Codec => "codec",
            Self::InboundRtp => "inbound_rtp",
            Self::OutboundRtp => "outbound_rtp",
            Self::RemoteInboundRtp => "remote_inbound_rtp",
            Self::RemoteOutboundRtp => "remote_outbound_rtp",
            Self::CandidatePair => "candidate_pair",
            Self::Transport => "transport",
            Self::DataChannel => "data_channel",
            Self::MediaSource => "media_source",
            Self::MediaPlayout => "media_playout",
        }
    }

    /// Human label used in instrument descriptions.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Codec => "codec",
            Self::InboundRtp => "inbound RTP",
            Self::OutboundRtp => "outbound RTP",
            Self::RemoteInboundRtp => "remote inbound RTP",
            Self::RemoteOutboundRtp => "remote outbound RTP",
            Self::CandidatePair => "candidate pair",
            Self::Transport => "transport",
            Self::DataChannel => "data channel",
            Self::MediaSource => "media source",
            Self::MediaPlayout => "media playout",
        }
    }

    /// Classify a raw `type` name; unknown names yield `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stat_type| stat_type.as_str() == raw)
    }
}

impl fmt::Display for StatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatType {
    type Err = RtcScopeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
            .ok_or_else(|| RtcScopeError::InvalidRecord(format!("unsupported stat type: {s}")))
    }
}

/* -------------------------------------------------------------------------- */
/* Track Kinds */
/* -------------------------------------------------------------------------- */

/// Media kind a record is attributed to.
///
/// `AllTracks` is the aggregate pseudo-kind covering every publication of a
/// participant regardless of media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackKind {
    Audio,
    Video,
    AllTracks,
}

impl TrackKind {
    pub const ALL: [Self; 3] = [Self::Audio, Self::Video, Self::AllTracks];

    /// Attribute rendering: `audio`, `video`, `allTracks`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::AllTracks => "allTracks",
        }
    }

    /// Instrument-name segment: `audio`, `video`, `all_tracks`.
    #[must_use]
    pub const fn metric_segment(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::AllTracks => "all_tracks",
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* -------------------------------------------------------------------------- */
/* Field Values */
/* -------------------------------------------------------------------------- */

/// Shape a schema field expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Number,
    Text,
    Flag,
    /// Nested dictionaries, rendered as a JSON string
    Json,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Number => "number",
            Self::Text => "text",
            Self::Flag => "flag",
            Self::Json => "json",
        })
    }
}

/// A single stat field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Number(f64),
    Text(String),
    Flag(bool),
    Structured(Value),
}

impl StatValue {
    /// Convert a JSON value; `null` has no stat representation.
    #[must_use]
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(flag) => Some(Self::Flag(flag)),
            Value::Number(number) => number.as_f64().map(Self::Number),
            Value::String(text) => Some(Self::Text(text)),
            other @ (Value::Array(_) | Value::Object(_)) => Some(Self::Structured(other)),
        }
    }

    /// Short shape name used in error messages.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Flag(_) => "flag",
            Self::Structured(_) => "structured",
        }
    }

    /// Check the value against `expected`, coercing where lossless.
    ///
    /// Numbers are accepted as text and anything is accepted as JSON.
    ///
    /// # Errors
    /// Returns [`FieldShapeError`] for every other mismatch.
    pub fn conform(&self, field: &str, expected: ValueKind) -> std::result::Result<Self, FieldShapeError> {
        match (expected, self) {
            (ValueKind::Number, Self::Number(_))
            | (ValueKind::Text, Self::Text(_))
            | (ValueKind::Flag, Self::Flag(_)) => Ok(self.clone()),
            (ValueKind::Text, Self::Number(number)) => Ok(Self::Text(format_number(*number))),
            (ValueKind::Json, Self::Structured(value)) => Ok(Self::Text(value.to_string())),
            (ValueKind::Json, Self::Text(text)) => Ok(Self::Text(text.clone())),
            (ValueKind::Json, Self::Number(number)) => Ok(Self::Text(format_number(*number))),
            (ValueKind::Json, Self::Flag(flag)) => Ok(Self::Text(flag.to_string())),
            (_, other) => Err(FieldShapeError {
                field: field.to_string(),
                expected,
                found: other.shape(),
            }),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

/* -------------------------------------------------------------------------- */
/* Records */
/* -------------------------------------------------------------------------- */

/// One WebRTC stats dictionary.
///
/// The `type` is kept raw so that unsupported dictionaries survive parsing
/// and can be skipped at dispatch time.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatRecord {
    pub id: String,
    pub stat_type: String,
    pub fields: BTreeMap<String, StatValue>,
}

impl RawStatRecord {
    /// Create a record of the given type carrying only its `id` field.
    #[must_use]
    pub fn new(id: impl Into<String>, stat_type: impl Into<String>) -> Self {
        let id = id.into();
        let mut fields = BTreeMap::new();
        if !id.is_empty() {
            fields.insert("id".to_string(), StatValue::Text(id.clone()));
        }
        Self { id, stat_type: stat_type.into(), fields }
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: StatValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Parse a browser-style stats object (`{"id": .., "type": .., ...}`).
    ///
    /// `null` fields are dropped; `id` is also kept as a regular field so
    /// the schema can surface it as an attribute.
    ///
    /// # Errors
    /// Returns `InvalidRecord` when the value is not an object or lacks a
    /// string `type`.
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(RtcScopeError::InvalidRecord("stat record is not an object".into()));
        };

        let stat_type = match map.get("type") {
            Some(Value::String(stat_type)) => stat_type.clone(),
            _ => return Err(RtcScopeError::InvalidRecord("stat record has no type".into())),
        };
        let id = match map.get("id") {
            Some(Value::String(id)) => id.clone(),
            _ => String::new(),
        };

        let fields = map
            .into_iter()
            .filter(|(name, _)| name != "type")
            .filter_map(|(name, value)| StatValue::from_json(value).map(|value| (name, value)))
            .collect();

        Ok(Self { id, stat_type, fields })
    }

    /// Supported stat type of this record, if any.
    #[must_use]
    pub fn kind(&self) -> Option<StatType> {
        StatType::parse(&self.stat_type)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StatValue> {
        self.fields.get(name)
    }

    /// Field value conformed to `expected`; `Ok(None)` when absent.
    ///
    /// # Errors
    /// Returns [`FieldShapeError`] when the value has the wrong shape.
    pub fn field(
        &self,
        name: &str,
        expected: ValueKind,
    ) -> std::result::Result<Option<StatValue>, FieldShapeError> {
        self.fields.get(name).map(|value| value.conform(name, expected)).transpose()
    }

    /// Text value of a field, if present and textual.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(StatValue::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }
}

/// Keyed stats snapshot returned for one track publication.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsReport {
    records: BTreeMap<String, RawStatRecord>,
}

impl StatsReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record keyed by its id. Records without an id get a
    /// positional key.
    pub fn insert(&mut self, record: RawStatRecord) {
        let key = if record.id.is_empty() {
            format!("#{}", self.records.len())
        } else {
            record.id.clone()
        };
        self.records.insert(key, record);
    }

    /// Parse a JSON array of records or an object keyed by record id.
    ///
    /// # Errors
    /// Returns `InvalidRecord` for any entry that is not a valid record.
    pub fn from_json(value: Value) -> Result<Self> {
        let entries: Vec<Value> = match value {
            Value::Array(entries) => entries,
            Value::Object(map) => map.into_iter().map(|(_, entry)| entry).collect(),
            _ => {
                return Err(RtcScopeError::InvalidRecord(
                    "stats report must be an array or an object".into(),
                ))
            }
        };

        let mut report = Self::new();
        for entry in entries {
            report.insert(RawStatRecord::from_json(entry)?);
        }
        Ok(report)
    }

    pub fn records(&self) -> impl Iterator<Item = &RawStatRecord> {
        self.records.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<RawStatRecord> for StatsReport {
    fn from_iter<I: IntoIterator<Item = RawStatRecord>>(iter: I) -> Self {
        let mut report = Self::new();
        for record in iter {
            report.insert(record);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_stat_type_names_round_trip_through_parse() {
        for stat_type in StatType::ALL {
            assert_eq!(StatType::parse(stat_type.as_str()), Some(stat_type));
        }
        assert_eq!(StatType::parse("certificate"), None);
        assert!("peer-connection".parse::<StatType>().is_err());
    }

    #[test]
    fn test_stat_type_serde_uses_webrtc_names() {
        let encoded = serde_json::to_string(&StatType::RemoteInboundRtp).expect("serializes");
        assert_eq!(encoded, "\"remote-inbound-rtp\"");
    }

    #[test]
    fn test_track_kind_renderings() {
        assert_eq!(TrackKind::AllTracks.as_str(), "allTracks");
        assert_eq!(TrackKind::AllTracks.metric_segment(), "all_tracks");
        assert_eq!(serde_json::to_string(&TrackKind::AllTracks).expect("ok"), "\"allTracks\"");
    }

    #[test]
    fn test_record_from_browser_json() {
        let record = RawStatRecord::from_json(json!({
            "id": "OT01A1234",
            "type": "outbound-rtp",
            "timestamp": 1_700_000_000_000.0_f64,
            "bytesSent": 1200,
            "active": true,
            "rid": null,
            "qualityLimitationDurations": { "none": 1.5, "cpu": 0.0 }
        }))
        .expect("valid record");

        assert_eq!(record.kind(), Some(StatType::OutboundRtp));
        assert_eq!(record.id, "OT01A1234");
        assert_eq!(record.get("bytesSent"), Some(&StatValue::Number(1200.0)));
        assert_eq!(record.get("active"), Some(&StatValue::Flag(true)));
        assert!(record.get("rid").is_none());
        assert_eq!(record.text("id"), Some("OT01A1234"));
        assert!(matches!(record.get("qualityLimitationDurations"), Some(StatValue::Structured(_))));
    }

    #[test]
    fn test_record_without_type_is_rejected() {
        let err = RawStatRecord::from_json(json!({ "id": "x" })).expect_err("no type");
        assert!(matches!(err, RtcScopeError::InvalidRecord(_)));
        assert!(RawStatRecord::from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn test_field_conformance() {
        let record = RawStatRecord::new("r", "inbound-rtp")
            .with_field("ssrc", StatValue::Number(1234.0))
            .with_field("jitter", StatValue::Text("high".into()))
            .with_field("nested", StatValue::Structured(json!({ "a": 1 })));

        assert_eq!(
            record.field("ssrc", ValueKind::Text).expect("coerces"),
            Some(StatValue::Text("1234".into()))
        );
        assert_eq!(
            record.field("nested", ValueKind::Json).expect("renders"),
            Some(StatValue::Text("{\"a\":1}".into()))
        );
        assert_eq!(record.field("missing", ValueKind::Number).expect("absent"), None);

        let err = record.field("jitter", ValueKind::Number).expect_err("text is not a number");
        assert_eq!(err.field, "jitter");
        assert_eq!(err.expected, ValueKind::Number);
        assert_eq!(err.found, "text");
    }

    #[test]
    fn test_report_accepts_arrays_and_maps() {
        let from_array = StatsReport::from_json(json!([
            { "id": "a", "type": "codec", "mimeType": "audio/opus" },
            { "id": "b", "type": "certificate" }
        ]))
        .expect("array");
        assert_eq!(from_array.len(), 2);

        let from_map = StatsReport::from_json(json!({
            "a": { "id": "a", "type": "codec" }
        }))
        .expect("map");
        assert_eq!(from_map.records().count(), 1);

        assert!(StatsReport::from_json(json!("nope")).is_err());
    }
}
