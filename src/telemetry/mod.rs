//! OpenTelemetry provider selection.
//!
//! # Data Flow
//! ```text
//! BootstrapConfig.{tracing, metrics, logs}
//!     → select_* (pure decision: disabled / debug / export)
//!     → setup_* (build SDK provider, register shutdown hook)
//!     → TelemetryProviders (handles threaded through the service)
//! ```
//!
//! # Design Decisions
//! - Providers are handed out explicitly; nothing is installed as the
//!   process-global OpenTelemetry provider
//! - A disabled signal is still a real SDK provider, just without processors
//!   or readers, so callers never branch on "is tracing on"
//! - A malformed endpoint or an exporter that cannot be built is fatal;
//!   a missing endpoint silently disables the signal

pub mod debug_exporter;
pub mod endpoint;
pub mod logs;
pub mod metrics;
pub mod propagation;
pub mod resource;
pub mod tracing;

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::metrics::{Meter, MeterProvider};
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::trace::TracerProvider;
use opentelemetry::InstrumentationScope;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::trace::SdkTracer;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::{BootstrapConfig, ServiceInfo};
use crate::lifecycle::{HookError, ShutdownHooks};
use crate::logging::Logging;

pub use debug_exporter::LoggingSpanExporter;
pub use endpoint::validate_endpoint;
pub use logs::setup_logs;
pub use self::metrics::{select_metrics, setup_metrics, MeterProviderHandle, MetricsPlan};
pub use propagation::build_propagator;
pub use resource::service_resource;
pub use self::tracing::{
    select_tracing, setup_tracing, setup_tracing_with, DisabledReason, TracerProviderHandle,
    TracingPlan,
};

/// Telemetry signal kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Traces,
    Metrics,
    Logs,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Traces => "traces",
            Signal::Metrics => "metrics",
            Signal::Logs => "logs",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort telemetry setup.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid {signal} exporter endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        signal: Signal,
        endpoint: String,
        reason: String,
    },

    #[error("failed to build {signal} exporter: {reason}")]
    Exporter { signal: Signal, reason: String },
}

/// Tracer and meter providers selected at startup, plus the context
/// propagator for crossing process boundaries.
#[derive(Debug, Clone)]
pub struct TelemetryProviders {
    tracer: TracerProviderHandle,
    meter: MeterProviderHandle,
    propagator: Arc<TextMapCompositePropagator>,
    scope: InstrumentationScope,
}

impl TelemetryProviders {
    pub fn new(
        service: &ServiceInfo,
        tracer: TracerProviderHandle,
        meter: MeterProviderHandle,
        propagator: TextMapCompositePropagator,
    ) -> Self {
        let scope = InstrumentationScope::builder(service.name.clone())
            .with_version(service.version.clone())
            .build();
        Self {
            tracer,
            meter,
            propagator: Arc::new(propagator),
            scope,
        }
    }

    pub fn tracing(&self) -> &TracerProviderHandle {
        &self.tracer
    }

    pub fn metrics(&self) -> &MeterProviderHandle {
        &self.meter
    }

    /// Injects and extracts trace context and baggage (`OTEL_PROPAGATORS`).
    pub fn propagator(&self) -> &TextMapCompositePropagator {
        &self.propagator
    }

    /// Tracer for a library or component.
    pub fn tracer(&self, name: impl Into<Cow<'static, str>>) -> SdkTracer {
        self.tracer.provider().tracer(name)
    }

    /// Meter for a library or component.
    pub fn meter(&self, name: &'static str) -> Meter {
        self.meter.provider().meter(name)
    }

    /// Tracer scoped to the service itself (name and version).
    pub fn service_tracer(&self) -> SdkTracer {
        self.tracer.provider().tracer_with_scope(self.scope.clone())
    }

    /// Meter scoped to the service itself (name and version).
    pub fn service_meter(&self) -> Meter {
        self.meter.provider().meter_with_scope(self.scope.clone())
    }
}

/// Select and build the trace and metric providers and the propagator.
///
/// Shutdown hooks are registered on `hooks` for every provider that owns an
/// exporter.
pub fn setup_telemetry(
    service: &ServiceInfo,
    config: &BootstrapConfig,
    logging: &Logging,
    hooks: &ShutdownHooks,
) -> Result<TelemetryProviders, TelemetryError> {
    let resource = service_resource(service);
    let tracer = setup_tracing(&config.tracing, &resource, logging, hooks)?;
    let meter = setup_metrics(&config.metrics, &resource, logging, hooks)?;
    let propagator = build_propagator(&config.tracing.propagators);
    Ok(TelemetryProviders::new(service, tracer, meter, propagator))
}

/// Register a hook that shuts a provider down on a blocking thread.
///
/// The SDK is handed whatever is left of the shared deadline, so an exporter
/// that never drains gives up in time and leaves no blocking task behind.
pub(crate) fn register_provider_shutdown<F>(hooks: &ShutdownHooks, signal: Signal, shutdown: F)
where
    F: FnOnce(Duration) -> OTelSdkResult + Send + 'static,
{
    hooks.register(signal.as_str(), move |deadline| async move {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::task::spawn_blocking(move || shutdown(remaining)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(HookError::new(e)),
            Err(e) => Err(HookError::new(e)),
        }
    });
}
