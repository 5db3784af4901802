//! Root subscriber installation.
//!
//! # Responsibilities
//! - Console output: pretty in development, JSON lines otherwise (stderr,
//!   see [`JsonFormat`])
//! - Optional JSON file output
//! - Optional bridge to an OpenTelemetry log provider
//! - Sampling of repeated events, applied to each of the above
//!
//! # Design Decisions
//! - Every layer carries the same [`NamespaceFilter`], so overrides apply to
//!   all outputs alike
//! - The OpenTelemetry bridge is additionally capped at INFO and skips the
//!   exporter stack's own events
//! - Sampling is the last filter of every layer, so only events a layer would
//!   write count against its budget

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::{filter_fn, FilterExt};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer, Registry};

use crate::config::LogConfig;
use crate::logging::filter::NamespaceFilter;
use crate::logging::format::JsonFormat;
use crate::logging::resolver::LevelResolver;
use crate::logging::sampler::SamplingFilter;

/// Errors raised while installing the root subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open log file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Build and install the process-wide subscriber.
pub fn init_root(
    config: &LogConfig,
    development: bool,
    resolver: Arc<LevelResolver>,
    otel_logs: Option<&SdkLoggerProvider>,
) -> Result<(), LoggingError> {
    let layers = build_layers(config, development, resolver, otel_logs)?;
    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)
}

fn build_layers(
    config: &LogConfig,
    development: bool,
    resolver: Arc<LevelResolver>,
    otel_logs: Option<&SdkLoggerProvider>,
) -> Result<Vec<BoxedLayer>, LoggingError> {
    let filter = NamespaceFilter::new(resolver);
    let sampling = || SamplingFilter::new(config.sampling);
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.console_output {
        let layer = if development {
            fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_filter(filter.clone().and(sampling()))
                .boxed()
        } else {
            fmt::layer()
                .event_format(JsonFormat)
                .with_writer(std::io::stderr)
                .with_filter(filter.clone().and(sampling()))
                .boxed()
        };
        layers.push(layer);
    }

    if let Some(path) = &config.file_output {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| LoggingError::OpenFile {
                path: path.clone(),
                source,
            })?;
        layers.push(
            fmt::layer()
                .event_format(JsonFormat)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(filter.clone().and(sampling()))
                .boxed(),
        );
    }

    if let Some(provider) = otel_logs {
        layers.push(
            OpenTelemetryTracingBridge::new(provider)
                .with_filter(
                    filter
                        .and(LevelFilter::INFO)
                        .and(filter_fn(|meta| !is_exporter_internal(meta.target())))
                        .and(sampling()),
                )
                .boxed(),
        );
    }

    Ok(layers)
}

/// Targets emitted by the OTLP exporter stack itself; bridging them back
/// into the exporter would feed it its own diagnostics.
const EXPORTER_TARGETS: &[&str] = &["opentelemetry", "tonic", "h2", "hyper", "tower"];

fn is_exporter_internal(target: &str) -> bool {
    EXPORTER_TARGETS.iter().any(|prefix| {
        target
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::") || rest.starts_with('_'))
    })
}
