//! OTLP log export.
//!
//! Built before the root subscriber is installed, so nothing here logs.
//! The returned provider is attached to the subscriber as a bridge layer.

use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::Resource;

use crate::config::LogExportConfig;
use crate::lifecycle::ShutdownHooks;
use crate::telemetry::endpoint::validate_endpoint;
use crate::telemetry::{register_provider_shutdown, Signal, TelemetryError};

/// Logger provider for the configured logs endpoint, or `None`.
pub fn setup_logs(
    config: &LogExportConfig,
    resource: &Resource,
    hooks: &ShutdownHooks,
) -> Result<Option<SdkLoggerProvider>, TelemetryError> {
    let Some(endpoint) = config
        .endpoint
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
    else {
        return Ok(None);
    };

    validate_endpoint(Signal::Logs, endpoint)?;
    let exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| TelemetryError::Exporter {
            signal: Signal::Logs,
            reason: e.to_string(),
        })?;

    let provider = SdkLoggerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource.clone())
        .build();

    let shutdown = provider.clone();
    register_provider_shutdown(hooks, Signal::Logs, move |timeout| {
        shutdown.shutdown_with_timeout(timeout)
    });
    Ok(Some(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_endpoint_no_provider() {
        let hooks = ShutdownHooks::new();
        let provider = setup_logs(
            &LogExportConfig { endpoint: None },
            &Resource::builder().build(),
            &hooks,
        )
        .unwrap();
        assert!(provider.is_none());
        assert!(hooks.is_empty());
    }

    #[test]
    fn test_invalid_endpoint() {
        let err = setup_logs(
            &LogExportConfig {
                endpoint: Some("://".into()),
            },
            &Resource::builder().build(),
            &ShutdownHooks::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TelemetryError::InvalidEndpoint { signal: Signal::Logs, .. }
        ));
    }
}
