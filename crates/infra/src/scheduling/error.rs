//! Scheduler error types

use std::time::Duration;

use rtcscope_domain::RtcScopeError;
use thiserror::Error;
use tokio::task::JoinError;

use crate::errors::InfraError;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler not running")]
    NotRunning,

    /// Operation timed out
    #[error("Operation timed out after {}ms", duration.as_millis())]
    Timeout { duration: Duration },

    /// Task join failed
    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

impl From<JoinError> for SchedulerError {
    fn from(err: JoinError) -> Self {
        Self::TaskJoinFailed(err.to_string())
    }
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let rtc_err = match err {
            SchedulerError::Timeout { .. } => RtcScopeError::Timeout(err.to_string()),
            SchedulerError::AlreadyRunning
            | SchedulerError::NotRunning
            | SchedulerError::TaskJoinFailed(_) => RtcScopeError::Internal(err.to_string()),
        };
        InfraError(rtc_err)
    }
}

impl From<SchedulerError> for RtcScopeError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_timeout_error() {
        let err = SchedulerError::Timeout { duration: Duration::from_millis(1500) };
        match RtcScopeError::from(err) {
            RtcScopeError::Timeout(msg) => assert!(msg.contains("1500ms")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_lifecycle_misuse_maps_to_internal() {
        assert!(matches!(
            RtcScopeError::from(SchedulerError::AlreadyRunning),
            RtcScopeError::Internal(_)
        ));
    }
}
