//! Stats collection: room ports, the telemetry sink port and the sweep
//! service driven by the scheduler.

pub mod ports;
pub mod service;

pub use ports::{EmitOutcome, Participant, RecordContext, Room, TelemetrySink, TrackPublication};
pub use service::{CollectionOptions, CollectionService, TickReport};
