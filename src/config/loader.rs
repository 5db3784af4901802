//! Configuration loading from a [`ConfigSource`].

use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::{BootstrapConfig, PropagatorKind};
use crate::config::source::{ConfigSource, TomlSource};
use crate::config::validation::{validate_config, ValidationError};

pub const DEVELOPMENT: &str = "DEVELOPMENT";
pub const LOG_CONSOLE_OUTPUT: &str = "LOG_CONSOLE_OUTPUT";
pub const LOG_FILE_OUTPUT: &str = "LOG_FILE_OUTPUT";
pub const LOG_SAMPLING_INITIAL: &str = "LOG_SAMPLING_INITIAL";
pub const LOG_SAMPLING_THEREAFTER: &str = "LOG_SAMPLING_THEREAFTER";
pub const TRACING_SAMPLE_RATE: &str = "OTEL_TRACING_SAMPLE_RATE";
pub const TRACING_LOG: &str = "OTEL_TRACING_LOG";
pub const PROPAGATORS: &str = "OTEL_PROPAGATORS";
pub const OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
pub const OTLP_TRACES_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_TRACES_ENDPOINT";
pub const OTLP_METRICS_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_METRICS_ENDPOINT";
pub const OTLP_LOGS_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_LOGS_ENDPOINT";
pub const HEALTH_SERVER_PORT: &str = "HEALTH_SERVER_PORT";
pub const SHUTDOWN_TIMEOUT_SECS: &str = "SHUTDOWN_TIMEOUT_SECS";

/// A single value that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{key}={value:?}: {reason}")]
pub struct InvalidValue {
    pub key: String,
    pub value: String,
    pub reason: String,
}

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid values: {}", join(.0))]
    Invalid(Vec<InvalidValue>),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read a TOML file to layer underneath the environment.
pub fn load_file_source(path: &Path) -> Result<TomlSource, ConfigError> {
    TomlSource::from_file(path)
}

/// Parse and validate the bootstrap configuration.
///
/// All malformed values are reported together.
pub fn load_config(source: &dyn ConfigSource) -> Result<BootstrapConfig, ConfigError> {
    let mut reader = Reader {
        source,
        errors: Vec::new(),
    };
    let mut config = BootstrapConfig::default();

    reader.read_bool(DEVELOPMENT, &mut config.development);
    reader.read_bool(LOG_CONSOLE_OUTPUT, &mut config.log.console_output);
    config.log.file_output = source.get(LOG_FILE_OUTPUT).map(PathBuf::from);
    reader.read_parsed(LOG_SAMPLING_INITIAL, &mut config.log.sampling.initial);
    reader.read_parsed(LOG_SAMPLING_THEREAFTER, &mut config.log.sampling.thereafter);

    reader.read_parsed(TRACING_SAMPLE_RATE, &mut config.tracing.sample_rate);
    reader.read_bool(TRACING_LOG, &mut config.tracing.log);
    reader.read_propagators(PROPAGATORS, &mut config.tracing.propagators);
    config.tracing.endpoint = signal_endpoint(source, OTLP_TRACES_ENDPOINT);
    config.metrics.endpoint = signal_endpoint(source, OTLP_METRICS_ENDPOINT);
    config.logs.endpoint = signal_endpoint(source, OTLP_LOGS_ENDPOINT);

    reader.read_parsed(HEALTH_SERVER_PORT, &mut config.health.port);
    reader.read_parsed(SHUTDOWN_TIMEOUT_SECS, &mut config.shutdown.timeout_secs);

    if !reader.errors.is_empty() {
        return Err(ConfigError::Invalid(reader.errors));
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Signal-specific endpoint, falling back to the general OTLP endpoint.
fn signal_endpoint(source: &dyn ConfigSource, signal_key: &str) -> Option<String> {
    source.get(signal_key).or_else(|| source.get(OTLP_ENDPOINT))
}

struct Reader<'a> {
    source: &'a dyn ConfigSource,
    errors: Vec<InvalidValue>,
}

impl Reader<'_> {
    fn read_bool(&mut self, key: &str, target: &mut bool) {
        if let Some(raw) = self.source.get(key) {
            match parse_bool(&raw) {
                Some(value) => *target = value,
                None => self.errors.push(InvalidValue {
                    key: key.to_string(),
                    value: raw,
                    reason: "expected a boolean".to_string(),
                }),
            }
        }
    }

    fn read_parsed<T>(&mut self, key: &str, target: &mut T)
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        if let Some(raw) = self.source.get(key) {
            match raw.trim().parse::<T>() {
                Ok(value) => *target = value,
                Err(e) => self.errors.push(InvalidValue {
                    key: key.to_string(),
                    value: raw,
                    reason: e.to_string(),
                }),
            }
        }
    }

    /// Comma-separated list; `none` anywhere disables propagation and a
    /// blank value keeps the default.
    fn read_propagators(&mut self, key: &str, target: &mut Vec<PropagatorKind>) {
        let Some(raw) = self.source.get(key) else {
            return;
        };
        let names: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            return;
        }

        let mut kinds = Vec::new();
        let mut disabled = false;
        for name in names {
            if name.eq_ignore_ascii_case("none") {
                disabled = true;
                continue;
            }
            match name.parse::<PropagatorKind>() {
                Ok(kind) if !kinds.contains(&kind) => kinds.push(kind),
                Ok(_) => {}
                Err(reason) => {
                    self.errors.push(InvalidValue {
                        key: key.to_string(),
                        value: raw.clone(),
                        reason,
                    });
                    return;
                }
            }
        }
        *target = if disabled { Vec::new() } else { kinds };
    }
}

/// Accepts `1`, `t`, `true`, `0`, `f`, `false` in any case.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::source::MapSource;

    #[test]
    fn test_defaults() {
        let config = load_config(&MapSource::new()).unwrap();
        assert_eq!(config, BootstrapConfig::default());
        assert_eq!(config.health.port, 8088);
        assert_eq!(config.tracing.sample_rate, 1.0);
        assert!(!config.tracing.log);
        assert!(config.log.console_output);
        assert!(config.tracing.endpoint.is_none());
    }

    #[test]
    fn test_reads_values() {
        let source = MapSource::new()
            .with(DEVELOPMENT, "TRUE")
            .with(LOG_CONSOLE_OUTPUT, "0")
            .with(LOG_FILE_OUTPUT, "/tmp/service.log")
            .with(TRACING_SAMPLE_RATE, "0.25")
            .with(TRACING_LOG, "t")
            .with(HEALTH_SERVER_PORT, "8089")
            .with(SHUTDOWN_TIMEOUT_SECS, "3");

        let config = load_config(&source).unwrap();
        assert!(config.development);
        assert!(!config.log.console_output);
        assert_eq!(config.log.file_output, Some(PathBuf::from("/tmp/service.log")));
        assert_eq!(config.tracing.sample_rate, 0.25);
        assert!(config.tracing.log);
        assert_eq!(config.health.port, 8089);
        assert_eq!(config.shutdown.timeout_secs, 3);
    }

    #[test]
    fn test_endpoint_two_tier() {
        let source = MapSource::new()
            .with(OTLP_ENDPOINT, "http://collector:4317")
            .with(OTLP_TRACES_ENDPOINT, "http://traces:4317");

        let config = load_config(&source).unwrap();
        assert_eq!(config.tracing.endpoint.as_deref(), Some("http://traces:4317"));
        assert_eq!(config.metrics.endpoint.as_deref(), Some("http://collector:4317"));
        assert_eq!(config.logs.endpoint.as_deref(), Some("http://collector:4317"));
    }

    #[test]
    fn test_signal_specific_only() {
        let source = MapSource::new().with(OTLP_METRICS_ENDPOINT, "http://metrics:4317");

        let config = load_config(&source).unwrap();
        assert!(config.tracing.endpoint.is_none());
        assert_eq!(config.metrics.endpoint.as_deref(), Some("http://metrics:4317"));
    }

    #[test]
    fn test_collects_all_invalid_values() {
        let source = MapSource::new()
            .with(HEALTH_SERVER_PORT, "eighty")
            .with(TRACING_LOG, "maybe")
            .with(TRACING_SAMPLE_RATE, "half");

        match load_config(&source) {
            Err(ConfigError::Invalid(errors)) => {
                assert_eq!(errors.len(), 3);
                assert!(errors.iter().any(|e| e.key == HEALTH_SERVER_PORT));
                assert!(errors.iter().any(|e| e.key == TRACING_LOG));
            }
            other => panic!("expected invalid values, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_runs() {
        let source = MapSource::new().with(TRACING_SAMPLE_RATE, "NaN");
        assert!(matches!(load_config(&source), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_log_sampling() {
        let config = load_config(&MapSource::new()).unwrap();
        assert_eq!(config.log.sampling.initial, 100);
        assert_eq!(config.log.sampling.thereafter, 100);

        let source = MapSource::new()
            .with(LOG_SAMPLING_INITIAL, "0")
            .with(LOG_SAMPLING_THEREAFTER, "10");
        let config = load_config(&source).unwrap();
        assert!(!config.log.sampling.is_enabled());
        assert_eq!(config.log.sampling.thereafter, 10);
    }

    #[test]
    fn test_propagators() {
        let config = load_config(&MapSource::new()).unwrap();
        assert_eq!(
            config.tracing.propagators,
            vec![PropagatorKind::TraceContext, PropagatorKind::Baggage]
        );

        let source = MapSource::new().with(PROPAGATORS, "baggage, TraceContext,baggage");
        let config = load_config(&source).unwrap();
        assert_eq!(
            config.tracing.propagators,
            vec![PropagatorKind::Baggage, PropagatorKind::TraceContext]
        );

        let source = MapSource::new().with(PROPAGATORS, "tracecontext,none");
        assert!(load_config(&source).unwrap().tracing.propagators.is_empty());

        let source = MapSource::new().with(PROPAGATORS, " ");
        assert_eq!(load_config(&source).unwrap().tracing.propagators.len(), 2);
    }

    #[test]
    fn test_unsupported_propagator() {
        let source = MapSource::new().with(PROPAGATORS, "tracecontext,b3");
        match load_config(&source) {
            Err(ConfigError::Invalid(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].key, PROPAGATORS);
                assert_eq!(errors[0].reason, "unsupported propagator \"b3\"");
            }
            other => panic!("expected invalid values, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool(" f "), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }
}
