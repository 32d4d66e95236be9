//! Domain types and models

pub mod attributes;
pub mod call;
pub mod stats;

pub use attributes::AttributeSet;
pub use call::ConnectionState;
pub use stats::{RawStatRecord, StatType, StatValue, StatsReport, TrackKind, ValueKind};
