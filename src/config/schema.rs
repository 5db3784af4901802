//! Configuration schema definitions.
//!
//! All sections are read once at startup and are immutable afterwards.
//! Types derive Serde traits so a resolved configuration can be dumped for
//! diagnostics.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Identity of the running service, supplied by the host program.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    /// Development mode switches on human-readable console logs.
    pub development: bool,
}

impl ServiceInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            development: false,
        }
    }
}

/// Root configuration for the bootstrap.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct BootstrapConfig {
    /// `DEVELOPMENT`
    pub development: bool,

    /// Root logger output.
    pub log: LogConfig,

    /// Trace signal settings.
    pub tracing: TracingConfig,

    /// Metric signal settings.
    pub metrics: MetricsConfig,

    /// Log signal (OTLP log export) settings.
    pub logs: LogExportConfig,

    /// Health server settings.
    pub health: HealthServerConfig,

    /// Process shutdown settings.
    pub shutdown: ShutdownConfig,
}

/// Root logger configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Write to stderr (`LOG_CONSOLE_OUTPUT`).
    pub console_output: bool,

    /// Append JSON lines to this file (`LOG_FILE_OUTPUT`).
    pub file_output: Option<PathBuf>,

    /// Per-callsite rate limiting.
    pub sampling: LogSamplingConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_output: true,
            file_output: None,
            sampling: LogSamplingConfig::default(),
        }
    }
}

/// Log sampling, counted per callsite and level in one-second windows.
///
/// The first `initial` events of a window are written, then every
/// `thereafter`-th one. `initial = 0` switches sampling off.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogSamplingConfig {
    /// `LOG_SAMPLING_INITIAL`
    pub initial: u64,

    /// `LOG_SAMPLING_THEREAFTER`; 0 drops everything past `initial`.
    pub thereafter: u64,
}

impl LogSamplingConfig {
    pub fn is_enabled(&self) -> bool {
        self.initial > 0
    }
}

impl Default for LogSamplingConfig {
    fn default() -> Self {
        Self {
            initial: 100,
            thereafter: 100,
        }
    }
}

/// Tracing configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TracingConfig {
    /// Fraction of root traces to sample (`OTEL_TRACING_SAMPLE_RATE`).
    ///
    /// `<= 0` disables tracing, `>= 1` samples everything.
    pub sample_rate: f64,

    /// Log completed spans instead of exporting them (`OTEL_TRACING_LOG`).
    pub log: bool,

    /// OTLP endpoint for traces, if any.
    pub endpoint: Option<String>,

    /// Context propagation formats (`OTEL_PROPAGATORS`). Empty disables
    /// propagation.
    pub propagators: Vec<PropagatorKind>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1.0,
            log: false,
            endpoint: None,
            propagators: vec![PropagatorKind::TraceContext, PropagatorKind::Baggage],
        }
    }
}

/// Supported text-map propagation formats.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PropagatorKind {
    /// W3C `traceparent` / `tracestate`
    TraceContext,
    /// W3C `baggage`
    Baggage,
}

impl FromStr for PropagatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tracecontext" => Ok(PropagatorKind::TraceContext),
            "baggage" => Ok(PropagatorKind::Baggage),
            other => Err(format!("unsupported propagator {other:?}")),
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct MetricsConfig {
    /// OTLP endpoint for metrics, if any.
    pub endpoint: Option<String>,
}

/// OTLP log export configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct LogExportConfig {
    /// OTLP endpoint for logs, if any.
    pub endpoint: Option<String>,
}

/// Health server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct HealthServerConfig {
    /// Port to bind on all interfaces (`HEALTH_SERVER_PORT`). 0 picks a free port.
    pub port: u16,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self { port: 8088 }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Upper bound for running all shutdown hooks (`SHUTDOWN_TIMEOUT_SECS`).
    pub timeout_secs: u64,
}

impl ShutdownConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { timeout_secs: 15 }
    }
}
