//! # rtcscope Core
//!
//! Pure pipeline logic - no telemetry SDK or I/O dependencies.
//!
//! This crate contains:
//! - The Stat Schema Registry and metric descriptors
//! - Port interfaces for the room collaborator and the telemetry sink
//! - The collection service performing one sweep over a room
//!
//! ## Architecture Principles
//! - Only depends on `rtcscope-domain`
//! - All external collaborators via traits
//! - Pure, testable business logic

pub mod collection;
pub mod schema;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export specific items to avoid ambiguity
pub use collection::ports::{
    EmitOutcome, Participant, RecordContext, Room, TelemetrySink, TrackPublication,
};
pub use collection::{CollectionOptions, CollectionService, TickReport};
pub use schema::{
    descriptor, lookup, DescriptorKey, FieldSpec, InstrumentKind, MetricDescriptor, SchemaEntry,
};
