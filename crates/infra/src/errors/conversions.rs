//! Conversions from external infrastructure errors into domain errors.

use std::fmt;

use opentelemetry_sdk::error::OTelSdkError;
use rtcscope_domain::RtcScopeError;
use tokio::task::JoinError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfraError(pub RtcScopeError);

impl fmt::Display for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for InfraError {}

impl From<InfraError> for RtcScopeError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<RtcScopeError> for InfraError {
    fn from(value: RtcScopeError) -> Self {
        Self(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoRtcScopeError {
    fn into_rtcscope(self) -> RtcScopeError;
}

/* -------------------------------------------------------------------------- */
/* OTelSdkError → RtcScopeError */
/* -------------------------------------------------------------------------- */

impl IntoRtcScopeError for OTelSdkError {
    fn into_rtcscope(self) -> RtcScopeError {
        #[allow(unreachable_patterns)]
        match self {
            OTelSdkError::AlreadyShutdown => {
                RtcScopeError::Telemetry("telemetry provider already shut down".into())
            }
            OTelSdkError::Timeout(duration) => RtcScopeError::Timeout(format!(
                "telemetry operation exceeded {}ms",
                duration.as_millis()
            )),
            OTelSdkError::InternalFailure(message) => RtcScopeError::Telemetry(message),
            other => RtcScopeError::Telemetry(other.to_string()),
        }
    }
}

impl From<OTelSdkError> for InfraError {
    fn from(value: OTelSdkError) -> Self {
        Self(value.into_rtcscope())
    }
}

/* -------------------------------------------------------------------------- */
/* Config parsing and I/O → RtcScopeError */
/* -------------------------------------------------------------------------- */

impl IntoRtcScopeError for std::io::Error {
    fn into_rtcscope(self) -> RtcScopeError {
        RtcScopeError::Config(format!("I/O failure: {self}"))
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        Self(value.into_rtcscope())
    }
}

impl IntoRtcScopeError for toml::de::Error {
    fn into_rtcscope(self) -> RtcScopeError {
        RtcScopeError::Config(format!("Invalid TOML format: {self}"))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        Self(value.into_rtcscope())
    }
}

impl IntoRtcScopeError for serde_json::Error {
    fn into_rtcscope(self) -> RtcScopeError {
        RtcScopeError::Config(format!("Invalid JSON format: {self}"))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        Self(value.into_rtcscope())
    }
}

/* -------------------------------------------------------------------------- */
/* JoinError → RtcScopeError */
/* -------------------------------------------------------------------------- */

impl IntoRtcScopeError for JoinError {
    fn into_rtcscope(self) -> RtcScopeError {
        if self.is_cancelled() {
            RtcScopeError::Internal("background task cancelled".into())
        } else {
            RtcScopeError::Internal(format!("background task panicked: {self}"))
        }
    }
}

impl From<JoinError> for InfraError {
    fn from(value: JoinError) -> Self {
        Self(value.into_rtcscope())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
