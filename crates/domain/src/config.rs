//! Configuration structures
//!
//! Every struct deserializes with per-field defaults, so a partial JSON or
//! TOML document (or none at all) yields a usable configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_COLLECTION_INTERVAL_SECS, DEFAULT_CRASH_REPORT_CAPACITY, DEFAULT_EXPORT_TIMEOUT_MS,
    DEFAULT_JOIN_TIMEOUT_MS, DEFAULT_LOG_FILTER, DEFAULT_METRIC_EXPORT_INTERVAL_MS,
    DEFAULT_SERVICE_NAME, DEFAULT_STATS_TIMEOUT_MS, MAX_COLLECTION_INTERVAL_SECS,
    MIN_COLLECTION_INTERVAL_SECS,
};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telemetry: TelemetryConfig,
    pub collection: CollectionConfig,
    pub logging: LoggingConfig,
}

/// Exporter configuration for the telemetry process state.
///
/// Two configs comparing equal describe the same pipeline; `init` with an
/// equal config keeps the running instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `service.name` resource attribute
    pub service_name: String,
    /// OTLP/HTTP endpoint for spans; `None` disables trace export
    pub traces_endpoint: Option<String>,
    /// OTLP/HTTP endpoint for metrics; `None` disables metric export
    pub metrics_endpoint: Option<String>,
    /// Crash-report submission endpoint; `None` disables the span buffer
    pub crash_report_endpoint: Option<String>,
    pub metric_export_interval_ms: u64,
    pub export_timeout_ms: u64,
    /// Number of finished spans kept for crash reports
    pub crash_report_capacity: usize,
    /// Register providers with the `opentelemetry::global` facade
    pub install_global: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            traces_endpoint: None,
            metrics_endpoint: None,
            crash_report_endpoint: None,
            metric_export_interval_ms: DEFAULT_METRIC_EXPORT_INTERVAL_MS,
            export_timeout_ms: DEFAULT_EXPORT_TIMEOUT_MS,
            crash_report_capacity: DEFAULT_CRASH_REPORT_CAPACITY,
            install_global: true,
        }
    }
}

impl TelemetryConfig {
    /// Which collectors this configuration turns on.
    #[must_use]
    pub fn enablement(&self) -> CollectorEnablement {
        CollectorEnablement {
            traces: has_endpoint(self.traces_endpoint.as_deref()),
            metrics: has_endpoint(self.metrics_endpoint.as_deref()),
            crash_reports: has_endpoint(self.crash_report_endpoint.as_deref()),
        }
    }

    #[must_use]
    pub fn metric_export_interval(&self) -> Duration {
        Duration::from_millis(self.metric_export_interval_ms.max(1))
    }

    #[must_use]
    pub fn export_timeout(&self) -> Duration {
        Duration::from_millis(self.export_timeout_ms.max(1))
    }
}

fn has_endpoint(endpoint: Option<&str>) -> bool {
    endpoint.is_some_and(|url| !url.trim().is_empty())
}

/// Enabled/disabled state of each collector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorEnablement {
    pub traces: bool,
    pub metrics: bool,
    pub crash_reports: bool,
}

impl CollectorEnablement {
    /// True when at least one exporter ships data somewhere.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.traces || self.metrics || self.crash_reports
    }
}

/// Collection loop configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub interval_seconds: u64,
    /// Sweep remote participants in addition to the local one
    pub include_remote_participants: bool,
    /// Also dispatch every publication under the `allTracks` pseudo-kind
    pub include_aggregate_tracks: bool,
    pub stats_timeout_ms: u64,
    pub join_timeout_ms: u64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_COLLECTION_INTERVAL_SECS,
            include_remote_participants: true,
            include_aggregate_tracks: false,
            stats_timeout_ms: DEFAULT_STATS_TIMEOUT_MS,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
        }
    }
}

impl CollectionConfig {
    /// Tick period, clamped to the supported 10-40 second window.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(
            self.interval_seconds.clamp(MIN_COLLECTION_INTERVAL_SECS, MAX_COLLECTION_INTERVAL_SECS),
        )
    }

    #[must_use]
    pub fn stats_timeout(&self) -> Duration {
        Duration::from_millis(self.stats_timeout_ms.max(1))
    }

    #[must_use]
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms.max(1))
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: DEFAULT_LOG_FILTER.to_string(), json: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_endpoints_disable_collectors() {
        let config = TelemetryConfig {
            traces_endpoint: Some("http://collector:4318/v1/traces".into()),
            metrics_endpoint: Some("   ".into()),
            ..TelemetryConfig::default()
        };

        let enablement = config.enablement();
        assert!(enablement.traces);
        assert!(!enablement.metrics);
        assert!(!enablement.crash_reports);
        assert!(enablement.any());
        assert!(!TelemetryConfig::default().enablement().any());
    }

    #[test]
    fn test_collection_interval_is_clamped() {
        let mut config = CollectionConfig { interval_seconds: 1, ..CollectionConfig::default() };
        assert_eq!(config.interval(), Duration::from_secs(10));

        config.interval_seconds = 600;
        assert_eq!(config.interval(), Duration::from_secs(40));

        config.interval_seconds = 25;
        assert_eq!(config.interval(), Duration::from_secs(25));
    }

    #[test]
    fn test_partial_documents_fill_defaults() {
        let config: Config = serde_json::from_str(
            r#"{ "telemetry": { "traces_endpoint": "http://localhost:4318/v1/traces" } }"#,
        )
        .expect("parses");

        assert_eq!(config.telemetry.service_name, "rtcscope");
        assert_eq!(config.telemetry.metric_export_interval_ms, 10_000);
        assert!(config.collection.include_remote_participants);
        assert!(!config.collection.include_aggregate_tracks);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_toml_documents_parse() {
        let config: Config = toml::from_str(
            r#"
            [collection]
            interval_seconds = 15
            include_aggregate_tracks = true

            [logging]
            json = true
            "#,
        )
        .expect("parses");

        assert_eq!(config.collection.interval(), Duration::from_secs(15));
        assert!(config.collection.include_aggregate_tracks);
        assert!(config.logging.json);
    }
}
