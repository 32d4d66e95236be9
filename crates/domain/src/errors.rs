//! Error types used throughout the pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ValueKind;

/// Main error type for rtcscope
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum RtcScopeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("Exporter error: {0}")]
    Exporter(String),

    #[error("Stats retrieval error: {0}")]
    Stats(String),

    #[error("Invalid stat record: {0}")]
    InvalidRecord(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for rtcscope operations
pub type Result<T> = std::result::Result<T, RtcScopeError>;

/// A stat field whose value does not have the shape the schema expects.
///
/// Raised at the record boundary; the emitters log it, count it, and move on
/// to the next field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("field '{field}' expected {expected} but found {found}")]
pub struct FieldShapeError {
    /// Field name as it appears in the stat record
    pub field: String,
    /// Shape the schema declares for the field
    pub expected: ValueKind,
    /// Shape actually present in the record
    pub found: &'static str,
}

impl From<FieldShapeError> for RtcScopeError {
    fn from(err: FieldShapeError) -> Self {
        Self::InvalidRecord(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_serialize_with_type_tag() {
        let err = RtcScopeError::Stats("track has no stats yet".into());
        let json = serde_json::to_value(&err).expect("serializes");
        assert_eq!(json["type"], "Stats");
        assert_eq!(json["message"], "track has no stats yet");
    }

    #[test]
    fn test_field_shape_error_converts_to_invalid_record() {
        let err = FieldShapeError {
            field: "bytesSent".into(),
            expected: ValueKind::Number,
            found: "text",
        };
        let converted: RtcScopeError = err.into();
        assert_eq!(
            converted,
            RtcScopeError::InvalidRecord(
                "field 'bytesSent' expected number but found text".into()
            )
        );
    }
}
