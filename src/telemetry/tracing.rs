//! Trace provider selection.
//!
//! # Decision Table
//! ```text
//! sample rate <= 0          → disabled (warning)
//! OTEL_TRACING_LOG=true     → debug: spans logged synchronously
//! no traces endpoint        → disabled (warning)
//! otherwise                 → batched OTLP export, parent-based sampling
//! ```

use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider, SpanExporter};
use opentelemetry_sdk::Resource;
use opentelemetry_otlp::WithExportConfig;

use crate::config::TracingConfig;
use crate::lifecycle::ShutdownHooks;
use crate::logging::{Field, Logging};
use crate::telemetry::debug_exporter::LoggingSpanExporter;
use crate::telemetry::endpoint::validate_endpoint;
use crate::telemetry::{register_provider_shutdown, Signal, TelemetryError};

/// Why tracing was switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledReason {
    NonPositiveSampleRate,
    NoEndpoint,
}

impl DisabledReason {
    pub fn message(&self) -> &'static str {
        match self {
            DisabledReason::NonPositiveSampleRate => {
                "Sample rate is less than or equal to 0, disabling tracing"
            }
            DisabledReason::NoEndpoint => "No tracing exporter endpoint set, disabling tracing",
        }
    }
}

/// Outcome of the tracing decision.
#[derive(Debug, Clone, PartialEq)]
pub enum TracingPlan {
    Disabled(DisabledReason),
    Debug { sample_rate: f64 },
    Export { sample_rate: f64, endpoint: String },
}

impl TracingPlan {
    pub fn sample_rate(&self) -> Option<f64> {
        match self {
            TracingPlan::Disabled(_) => None,
            TracingPlan::Debug { sample_rate } | TracingPlan::Export { sample_rate, .. } => {
                Some(*sample_rate)
            }
        }
    }
}

/// Decide how traces are handled. Pure; logs nothing.
pub fn select_tracing(config: &TracingConfig) -> TracingPlan {
    let sample_rate = config.sample_rate;
    // NaN falls through here as well.
    if !(sample_rate > 0.0) {
        return TracingPlan::Disabled(DisabledReason::NonPositiveSampleRate);
    }
    if config.log {
        return TracingPlan::Debug { sample_rate };
    }
    match config.endpoint.as_deref().map(str::trim) {
        Some(endpoint) if !endpoint.is_empty() => TracingPlan::Export {
            sample_rate,
            endpoint: endpoint.to_string(),
        },
        _ => TracingPlan::Disabled(DisabledReason::NoEndpoint),
    }
}

/// Parent-based sampler: always-on at `>= 1`, trace-id ratio below.
pub fn sampler(sample_rate: f64) -> Sampler {
    let root = if sample_rate >= 1.0 {
        Sampler::AlwaysOn
    } else {
        Sampler::TraceIdRatioBased(sample_rate)
    };
    Sampler::ParentBased(Box::new(root))
}

/// The selected tracer provider together with the plan that produced it.
#[derive(Debug, Clone)]
pub struct TracerProviderHandle {
    plan: TracingPlan,
    provider: SdkTracerProvider,
}

impl TracerProviderHandle {
    /// A provider that records nothing.
    pub fn disabled(reason: DisabledReason) -> Self {
        Self {
            plan: TracingPlan::Disabled(reason),
            provider: SdkTracerProvider::builder()
                .with_sampler(Sampler::AlwaysOff)
                .build(),
        }
    }

    pub fn plan(&self) -> &TracingPlan {
        &self.plan
    }

    pub fn provider(&self) -> &SdkTracerProvider {
        &self.provider
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.plan, TracingPlan::Disabled(_))
    }
}

/// Build the tracer provider, exporting over OTLP/gRPC when configured.
pub fn setup_tracing(
    config: &TracingConfig,
    resource: &Resource,
    logging: &Logging,
    hooks: &ShutdownHooks,
) -> Result<TracerProviderHandle, TelemetryError> {
    build(config, resource, logging, hooks, |endpoint| {
        opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| TelemetryError::Exporter {
                signal: Signal::Traces,
                reason: e.to_string(),
            })
    })
}

/// Same decision as [`setup_tracing`], but the export path uses `exporter`.
pub fn setup_tracing_with<E>(
    config: &TracingConfig,
    exporter: E,
    resource: &Resource,
    logging: &Logging,
    hooks: &ShutdownHooks,
) -> Result<TracerProviderHandle, TelemetryError>
where
    E: SpanExporter + 'static,
{
    build(config, resource, logging, hooks, |_| Ok(exporter))
}

fn build<E, F>(
    config: &TracingConfig,
    resource: &Resource,
    logging: &Logging,
    hooks: &ShutdownHooks,
    make_exporter: F,
) -> Result<TracerProviderHandle, TelemetryError>
where
    E: SpanExporter + 'static,
    F: FnOnce(&str) -> Result<E, TelemetryError>,
{
    let logger = logging.logger(&["otel"]);
    let plan = select_tracing(config);

    let provider = match &plan {
        TracingPlan::Disabled(reason) => {
            logger.warn(reason.message(), &[]);
            return Ok(TracerProviderHandle::disabled(*reason));
        }
        TracingPlan::Debug { sample_rate } => {
            logger.info("Traces enabled for development mode, logging traces", &[]);
            let exporter = LoggingSpanExporter::new(logging.logger(&["otel", "trace"]));
            SdkTracerProvider::builder()
                .with_simple_exporter(exporter)
                .with_sampler(sampler(*sample_rate))
                .with_resource(resource.clone())
                .build()
        }
        TracingPlan::Export {
            sample_rate,
            endpoint,
        } => {
            validate_endpoint(Signal::Traces, endpoint)?;
            let exporter = make_exporter(endpoint)?;
            let provider = SdkTracerProvider::builder()
                .with_batch_exporter(exporter)
                .with_sampler(sampler(*sample_rate))
                .with_resource(resource.clone())
                .build();

            let shutdown = provider.clone();
            register_provider_shutdown(hooks, Signal::Traces, move |timeout| {
                shutdown.shutdown_with_timeout(timeout)
            });
            provider
        }
    };

    if let Some(rate) = plan.sample_rate() {
        logger.info("Tracing enabled", &[Field::new("rate", rate)]);
    }
    Ok(TracerProviderHandle { plan, provider })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{FieldValue, Level, LevelResolver, MemorySink};
    use opentelemetry::trace::{Span, Tracer, TracerProvider};
    use opentelemetry_sdk::error::OTelSdkResult;
    use opentelemetry_sdk::trace::SpanData;
    use std::future::{ready, Future};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn config(sample_rate: f64, log: bool, endpoint: Option<&str>) -> TracingConfig {
        TracingConfig {
            sample_rate,
            log,
            endpoint: endpoint.map(String::from),
            ..Default::default()
        }
    }

    fn logging(entries: &[(&str, &str)]) -> (Logging, MemorySink) {
        let memory = MemorySink::new();
        let logging = Logging::new(
            LevelResolver::from_entries(entries.iter().copied()),
            Arc::new(memory.clone()),
        );
        (logging, memory)
    }

    #[derive(Debug, Clone, Default)]
    struct RecordingExporter {
        spans: Arc<Mutex<Vec<String>>>,
    }

    impl SpanExporter for RecordingExporter {
        fn export(&self, batch: Vec<SpanData>) -> impl Future<Output = OTelSdkResult> + Send {
            let mut spans = self.spans.lock().unwrap();
            spans.extend(batch.into_iter().map(|s| s.name.to_string()));
            ready(Ok(()))
        }
    }

    /// Blocks the batch worker for `delay` on every export.
    #[derive(Debug)]
    struct StalledExporter {
        delay: Duration,
    }

    impl SpanExporter for StalledExporter {
        fn export(&self, _batch: Vec<SpanData>) -> impl Future<Output = OTelSdkResult> + Send {
            std::thread::sleep(self.delay);
            ready(Ok(()))
        }
    }

    #[test]
    fn test_zero_rate_disables_regardless_of_endpoint() {
        assert_eq!(
            select_tracing(&config(0.0, false, Some("http://collector:4317"))),
            TracingPlan::Disabled(DisabledReason::NonPositiveSampleRate)
        );
        assert_eq!(
            select_tracing(&config(-1.0, true, None)),
            TracingPlan::Disabled(DisabledReason::NonPositiveSampleRate)
        );
        assert_eq!(
            select_tracing(&config(f64::NAN, true, None)),
            TracingPlan::Disabled(DisabledReason::NonPositiveSampleRate)
        );
    }

    #[test]
    fn test_debug_log_wins_over_endpoint() {
        assert_eq!(
            select_tracing(&config(1.0, true, None)),
            TracingPlan::Debug { sample_rate: 1.0 }
        );
        assert_eq!(
            select_tracing(&config(0.5, true, Some("http://collector:4317"))),
            TracingPlan::Debug { sample_rate: 0.5 }
        );
    }

    #[test]
    fn test_missing_endpoint_disables() {
        assert_eq!(
            select_tracing(&config(1.0, false, None)),
            TracingPlan::Disabled(DisabledReason::NoEndpoint)
        );
        assert_eq!(
            select_tracing(&config(1.0, false, Some("  "))),
            TracingPlan::Disabled(DisabledReason::NoEndpoint)
        );
    }

    #[test]
    fn test_endpoint_selects_export() {
        assert_eq!(
            select_tracing(&config(1.0, false, Some("http://collector:4317"))),
            TracingPlan::Export {
                sample_rate: 1.0,
                endpoint: "http://collector:4317".into()
            }
        );
    }

    #[test]
    fn test_sampler_shape() {
        match sampler(1.0) {
            Sampler::ParentBased(root) => assert!(matches!(*root, Sampler::AlwaysOn)),
            other => panic!("unexpected sampler {other:?}"),
        }
        match sampler(0.25) {
            Sampler::ParentBased(root) => {
                assert!(matches!(*root, Sampler::TraceIdRatioBased(r) if r == 0.25))
            }
            other => panic!("unexpected sampler {other:?}"),
        }
    }

    #[test]
    fn test_disabled_logs_reason() {
        let (logging, memory) = logging(&[]);
        let hooks = ShutdownHooks::new();
        let handle = setup_tracing(&config(0.0, false, None), &Resource::builder().build(), &logging, &hooks)
            .unwrap();

        assert!(!handle.is_enabled());
        assert!(hooks.is_empty());
        let records = memory.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Level::Warn);
        assert_eq!(records[0].logger, "otel");
        assert_eq!(records[0].message, DisabledReason::NonPositiveSampleRate.message());
    }

    #[test]
    fn test_debug_mode_logs_spans() {
        let (logging, memory) = logging(&[("LOG_LEVEL_OTEL_TRACE", "DEBUG")]);
        let hooks = ShutdownHooks::new();
        let handle = setup_tracing(&config(1.0, true, None), &Resource::builder().build(), &logging, &hooks)
            .unwrap();
        assert_eq!(handle.plan(), &TracingPlan::Debug { sample_rate: 1.0 });
        assert!(hooks.is_empty());
        assert!(memory
            .records()
            .iter()
            .any(|r| r.message == "Tracing enabled" && r.field("rate") == Some(&FieldValue::F64(1.0))));
        memory.clear();

        handle.provider().tracer("test").start("handle-request").end();

        let records = memory.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].logger, "otel.trace");
        assert_eq!(records[0].message, "handle-request");
    }

    #[test]
    fn test_invalid_endpoint_is_error() {
        let (logging, _) = logging(&[]);
        let err = setup_tracing_with(
            &config(1.0, false, Some("localhost:4317")),
            RecordingExporter::default(),
            &Resource::builder().build(),
            &logging,
            &ShutdownHooks::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TelemetryError::InvalidEndpoint { signal: Signal::Traces, .. }
        ));
    }

    #[tokio::test]
    async fn test_export_path_flushes_on_shutdown() {
        let (logging, _) = logging(&[]);
        let hooks = ShutdownHooks::new();
        let exporter = RecordingExporter::default();
        let spans = exporter.spans.clone();

        let handle = setup_tracing_with(
            &config(1.0, false, Some("http://collector:4317")),
            exporter,
            &Resource::builder().build(),
            &logging,
            &hooks,
        )
        .unwrap();
        assert!(handle.is_enabled());
        assert_eq!(hooks.names(), vec!["traces".to_string()]);

        let mut span = handle.provider().tracer("test").start("batched");
        assert!(span.is_recording());
        span.end();

        let report = hooks.run(Duration::from_secs(5)).await;
        assert!(report.is_clean(), "{report:?}");
        assert_eq!(*spans.lock().unwrap(), vec!["batched".to_string()]);
    }

    #[test]
    fn test_stalled_exporter_does_not_outlive_deadline() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let (logging, _) = logging(&[]);
        let hooks = ShutdownHooks::new();
        let handle = setup_tracing_with(
            &config(1.0, false, Some("http://collector:4317")),
            StalledExporter {
                delay: Duration::from_secs(3),
            },
            &Resource::builder().build(),
            &logging,
            &hooks,
        )
        .unwrap();
        handle.provider().tracer("test").start("stuck").end();

        let started = std::time::Instant::now();
        let report = runtime.block_on(hooks.run(Duration::from_millis(200)));
        drop(runtime);
        let elapsed = started.elapsed();

        assert!(!report.is_clean(), "{report:?}");
        assert!(report.completed.is_empty());
        assert!(elapsed < Duration::from_secs(2), "runtime held for {elapsed:?}");
    }
}
