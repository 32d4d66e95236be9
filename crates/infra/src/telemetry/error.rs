//! Telemetry error types

use opentelemetry_sdk::error::OTelSdkError;
use rtcscope_domain::RtcScopeError;
use thiserror::Error;

use crate::errors::InfraError;

/// Telemetry pipeline errors
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// An exporter could not be constructed
    #[error("Failed to build {signal} exporter: {reason}")]
    ExporterBuild { signal: &'static str, reason: String },

    /// Flushing a provider failed
    #[error("Failed to flush {signal} provider: {source}")]
    Flush {
        signal: &'static str,
        #[source]
        source: OTelSdkError,
    },

    /// Shutting a provider down failed
    #[error("Failed to shut down {signal} provider: {source}")]
    Shutdown {
        signal: &'static str,
        #[source]
        source: OTelSdkError,
    },

    /// Operation timed out
    #[error("Telemetry operation timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// Blocking flush or shutdown task did not complete
    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

impl From<TelemetryError> for InfraError {
    fn from(err: TelemetryError) -> Self {
        let rtc_err = match err {
            TelemetryError::ExporterBuild { .. } => RtcScopeError::Exporter(err.to_string()),
            TelemetryError::Timeout { .. } => RtcScopeError::Timeout(err.to_string()),
            TelemetryError::TaskJoinFailed(_) => RtcScopeError::Internal(err.to_string()),
            TelemetryError::Flush { .. } | TelemetryError::Shutdown { .. } => {
                RtcScopeError::Telemetry(err.to_string())
            }
        };
        InfraError(rtc_err)
    }
}

impl From<TelemetryError> for RtcScopeError {
    fn from(err: TelemetryError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_build_maps_to_exporter_error() {
        let err = TelemetryError::ExporterBuild { signal: "traces", reason: "bad url".into() };
        let mapped: RtcScopeError = err.into();
        match mapped {
            RtcScopeError::Exporter(msg) => {
                assert!(msg.contains("traces"));
                assert!(msg.contains("bad url"));
            }
            other => panic!("expected exporter error, got {other:?}"),
        }
    }

    #[test]
    fn test_flush_failure_maps_to_telemetry_error() {
        let err = TelemetryError::Flush { signal: "metrics", source: OTelSdkError::AlreadyShutdown };
        assert!(matches!(RtcScopeError::from(err), RtcScopeError::Telemetry(_)));
    }
}
