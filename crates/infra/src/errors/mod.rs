//! Infrastructure error handling

mod conversions;

pub use conversions::InfraError;

/// Result alias for infrastructure operations
pub type InfraResult<T> = Result<T, InfraError>;
