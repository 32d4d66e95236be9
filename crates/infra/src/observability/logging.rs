//! Tracing subscriber installation

use rtcscope_domain::{LoggingConfig, Result, RtcScopeError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise from
/// [`LoggingConfig::filter`]. With [`LoggingConfig::json`] events are written
/// as JSON lines.
///
/// # Errors
/// Returns `RtcScopeError::Config` if the filter directive is invalid or a
/// global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        registry.with(fmt::layer().json().with_current_span(false)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    installed.map_err(|e| {
        RtcScopeError::Config(format!("Failed to install tracing subscriber: {e}"))
    })?;

    tracing::debug!(filter = %config.filter, json = config.json, "Tracing initialized");
    Ok(())
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(&config.filter).map_err(|e| {
        RtcScopeError::Config(format!("Invalid log filter '{}': {e}", config.filter))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::ENV_LOCK;

    #[test]
    fn test_second_install_is_a_config_error() {
        let config = LoggingConfig::default();
        let _ = init_tracing(&config);

        let err = init_tracing(&config).expect_err("second install must fail");
        assert!(matches!(err, RtcScopeError::Config(_)));
    }

    #[test]
    fn test_filter_is_taken_from_config() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig { filter: "rtcscope_infra=debug".into(), json: false };
        let filter = build_filter(&config).expect("valid filter");
        assert!(filter.to_string().contains("rtcscope_infra=debug"));
    }
}
