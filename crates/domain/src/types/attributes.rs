//! Attribute sets attached to recorded and observed metric values

use serde::{Deserialize, Serialize};

use crate::constants::{METRIC_ATTR_PARTICIPANT, METRIC_ATTR_ROOM_NAME, METRIC_ATTR_TRACK_TYPE};
use crate::types::TrackKind;

/// `{participant, trackType, roomName}` plus stat-specific dimensions.
///
/// Two sets with equal fields and dimensions identify the same metric
/// series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeSet {
    pub participant: String,
    pub track_type: TrackKind,
    pub room_name: String,
    pub dimensions: Vec<(String, String)>,
}

impl AttributeSet {
    #[must_use]
    pub fn new(participant: impl Into<String>, track_type: TrackKind, room_name: impl Into<String>) -> Self {
        Self {
            participant: participant.into(),
            track_type,
            room_name: room_name.into(),
            dimensions: Vec::new(),
        }
    }

    /// Copy of this set with one more dimension, e.g. `mimeType`.
    #[must_use]
    pub fn with_dimension(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut extended = self.clone();
        extended.dimensions.push((key.into(), value.into()));
        extended
    }

    /// Flattened `(key, value)` pairs in export order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        [
            (METRIC_ATTR_PARTICIPANT, self.participant.as_str()),
            (METRIC_ATTR_TRACK_TYPE, self.track_type.as_str()),
            (METRIC_ATTR_ROOM_NAME, self.room_name.as_str()),
        ]
        .into_iter()
        .chain(self.dimensions.iter().map(|(key, value)| (key.as_str(), value.as_str())))
    }
}
