//! # rtcscope Domain
//!
//! Domain types and models for the RTC telemetry pipeline.
//!
//! This crate contains:
//! - Stat record types (`StatType`, `TrackKind`, `RawStatRecord`, ...)
//! - Telemetry attribute sets and call connection state
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Participant identity helpers
//!
//! ## Architecture
//! - No dependencies on other rtcscope crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
pub use utils::identity::extract_name;
