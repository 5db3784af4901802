//! Meter provider selection.

use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::Resource;

use crate::config::MetricsConfig;
use crate::lifecycle::ShutdownHooks;
use crate::logging::Logging;
use crate::telemetry::endpoint::validate_endpoint;
use crate::telemetry::{register_provider_shutdown, Signal, TelemetryError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricsPlan {
    Disabled,
    Export { endpoint: String },
}

/// Metrics are exported only when an endpoint is configured.
pub fn select_metrics(config: &MetricsConfig) -> MetricsPlan {
    match config.endpoint.as_deref().map(str::trim) {
        Some(endpoint) if !endpoint.is_empty() => MetricsPlan::Export {
            endpoint: endpoint.to_string(),
        },
        _ => MetricsPlan::Disabled,
    }
}

#[derive(Debug, Clone)]
pub struct MeterProviderHandle {
    plan: MetricsPlan,
    provider: SdkMeterProvider,
}

impl MeterProviderHandle {
    /// A provider without readers; instruments record into nothing.
    pub fn disabled() -> Self {
        Self {
            plan: MetricsPlan::Disabled,
            provider: SdkMeterProvider::builder().build(),
        }
    }

    pub fn plan(&self) -> &MetricsPlan {
        &self.plan
    }

    pub fn provider(&self) -> &SdkMeterProvider {
        &self.provider
    }

    pub fn is_enabled(&self) -> bool {
        self.plan != MetricsPlan::Disabled
    }
}

/// Build the meter provider with a periodic OTLP/gRPC reader when configured.
pub fn setup_metrics(
    config: &MetricsConfig,
    resource: &Resource,
    logging: &Logging,
    hooks: &ShutdownHooks,
) -> Result<MeterProviderHandle, TelemetryError> {
    let logger = logging.logger(&["otel"]);
    let plan = select_metrics(config);

    let MetricsPlan::Export { endpoint } = &plan else {
        logger.warn("No metrics exporter endpoint set, disabling metrics", &[]);
        return Ok(MeterProviderHandle::disabled());
    };

    validate_endpoint(Signal::Metrics, endpoint)?;
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.as_str())
        .build()
        .map_err(|e| TelemetryError::Exporter {
            signal: Signal::Metrics,
            reason: e.to_string(),
        })?;

    let provider = SdkMeterProvider::builder()
        .with_reader(PeriodicReader::builder(exporter).build())
        .with_resource(resource.clone())
        .build();

    let shutdown = provider.clone();
    register_provider_shutdown(hooks, Signal::Metrics, move |timeout| {
        shutdown.shutdown_with_timeout(timeout)
    });

    logger.info("Metrics enabled", &[]);
    Ok(MeterProviderHandle { plan, provider })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{Level, LevelResolver, MemorySink};
    use std::sync::Arc;

    fn config(endpoint: Option<&str>) -> MetricsConfig {
        MetricsConfig {
            endpoint: endpoint.map(String::from),
        }
    }

    #[test]
    fn test_select() {
        assert_eq!(select_metrics(&config(None)), MetricsPlan::Disabled);
        assert_eq!(select_metrics(&config(Some(""))), MetricsPlan::Disabled);
        assert_eq!(
            select_metrics(&config(Some("http://collector:4317"))),
            MetricsPlan::Export {
                endpoint: "http://collector:4317".into()
            }
        );
    }

    #[test]
    fn test_disabled_warns_once() {
        let memory = MemorySink::new();
        let logging = Logging::new(LevelResolver::default(), Arc::new(memory.clone()));
        let hooks = ShutdownHooks::new();

        let handle =
            setup_metrics(&config(None), &Resource::builder().build(), &logging, &hooks).unwrap();
        assert!(!handle.is_enabled());
        assert!(hooks.is_empty());

        let records = memory.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Level::Warn);
        assert_eq!(
            records[0].message,
            "No metrics exporter endpoint set, disabling metrics"
        );
    }

    #[test]
    fn test_bad_scheme_rejected_before_export() {
        let logging = Logging::new(LevelResolver::default(), Arc::new(MemorySink::new()));
        let hooks = ShutdownHooks::new();
        let err = setup_metrics(
            &config(Some("udp://collector:4317")),
            &Resource::builder().build(),
            &logging,
            &hooks,
        )
        .unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidEndpoint { .. }));
        assert!(hooks.is_empty());
    }
}
