//! Pipeline constants
//!
//! Centralized location for domain-level constants shared by the collection
//! loop, the emitters and the configuration defaults.

// Telemetry defaults
pub const DEFAULT_SERVICE_NAME: &str = "rtcscope";
pub const DEFAULT_METRIC_EXPORT_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_EXPORT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CRASH_REPORT_CAPACITY: usize = 256;
pub const INSTRUMENTATION_SCOPE: &str = "rtcscope";

// Collection loop
pub const DEFAULT_COLLECTION_INTERVAL_SECS: u64 = 30;
pub const MIN_COLLECTION_INTERVAL_SECS: u64 = 10;
pub const MAX_COLLECTION_INTERVAL_SECS: u64 = 40;
pub const DEFAULT_STATS_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 5_000;

// Logging
pub const DEFAULT_LOG_FILTER: &str = "info";

// Span attribute keys set on every stat span
pub const ATTR_STAT_TYPE: &str = "stat.type";
pub const ATTR_TRACK_SID: &str = "track.sid";
pub const ATTR_PARTICIPANT_IDENTITY: &str = "participant.identity";
pub const ATTR_TRACK_TYPE: &str = "track.type";
pub const ATTR_ROOM_NAME: &str = "room.name";

// Metric attribute keys
pub const METRIC_ATTR_PARTICIPANT: &str = "participant";
pub const METRIC_ATTR_TRACK_TYPE: &str = "trackType";
pub const METRIC_ATTR_ROOM_NAME: &str = "roomName";

/// `contentType` value that activates the screenshare encoder fields.
pub const SCREENSHARE_CONTENT_TYPE: &str = "screenshare";
