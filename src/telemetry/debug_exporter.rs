//! Span exporter that writes completed spans to the log.
//!
//! Used in local development (`OTEL_TRACING_LOG=true`). Spans are logged at
//! DEBUG on the `otel.trace` logger, so `LOG_LEVEL_OTEL_TRACE=DEBUG` (or a
//! broader override) is needed to see them.

use std::future::{ready, Future};
use std::time::UNIX_EPOCH;

use opentelemetry::trace::Status;
use opentelemetry::Value;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::trace::{SpanData, SpanExporter};

use crate::logging::{Field, FieldValue, Level, Logger};

/// Writes every exported span as one structured record; never batches or drops.
#[derive(Debug, Clone)]
pub struct LoggingSpanExporter {
    logger: Logger,
}

impl LoggingSpanExporter {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    fn log_span(&self, span: &SpanData) {
        if !self.logger.enabled(Level::Debug) {
            return;
        }

        let context = &span.span_context;
        let start_ms = span
            .start_time
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let duration = span
            .end_time
            .duration_since(span.start_time)
            .unwrap_or_default();

        let mut fields = vec![
            Field::new("traceID", format!("{:032x}", context.trace_id())),
            Field::new("spanID", format!("{:016x}", context.span_id())),
            Field::new("parentSpanID", format!("{:016x}", span.parent_span_id)),
            Field::new("status", status_name(&span.status)),
            Field::new("startTime", start_ms),
            Field::new("durationMs", duration.as_secs_f64() * 1000.0),
        ];
        if let Status::Error { description } = &span.status {
            fields.push(Field::new("statusDescription", description.to_string()));
        }
        for kv in &span.attributes {
            fields.push(Field::new(
                format!("attributes.{}", kv.key.as_str()),
                attribute_value(&kv.value),
            ));
        }

        self.logger.debug(&span.name, &fields);
    }
}

impl SpanExporter for LoggingSpanExporter {
    fn export(&self, batch: Vec<SpanData>) -> impl Future<Output = OTelSdkResult> + Send {
        for span in &batch {
            self.log_span(span);
        }
        ready(Ok(()))
    }
}

fn status_name(status: &Status) -> &'static str {
    match status {
        Status::Unset => "Unset",
        Status::Error { .. } => "Error",
        Status::Ok => "Ok",
    }
}

fn attribute_value(value: &Value) -> FieldValue {
    match value {
        Value::Bool(b) => FieldValue::Bool(*b),
        Value::I64(i) => FieldValue::I64(*i),
        Value::F64(f) => FieldValue::F64(*f),
        Value::String(s) => FieldValue::Str(s.as_str().to_string()),
        other => FieldValue::Str(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LevelResolver, Logging, MemorySink};
    use opentelemetry::trace::{Span, Tracer, TracerProvider};
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::trace::SdkTracerProvider;
    use std::sync::Arc;

    fn provider(entries: &[(&str, &str)]) -> (SdkTracerProvider, MemorySink) {
        let memory = MemorySink::new();
        let logging = Logging::new(
            LevelResolver::from_entries(entries.iter().copied()),
            Arc::new(memory.clone()),
        );
        let exporter = LoggingSpanExporter::new(logging.logger(&["otel", "trace"]));
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter)
            .build();
        memory.clear();
        (provider, memory)
    }

    #[test]
    fn test_span_is_logged_synchronously() {
        let (provider, memory) = provider(&[("LOG_LEVEL_OTEL", "DEBUG")]);
        let tracer = provider.tracer("test");

        let mut span = tracer.start("load-user");
        span.set_attribute(KeyValue::new("user.id", 42_i64));
        span.set_attribute(KeyValue::new("cache.hit", true));
        span.end();

        let records = memory.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.message, "load-user");
        assert_eq!(record.level, Level::Debug);
        assert_eq!(record.logger, "otel.trace");
        assert_eq!(record.field("attributes.user.id"), Some(&FieldValue::I64(42)));
        assert_eq!(record.field("attributes.cache.hit"), Some(&FieldValue::Bool(true)));
        assert_eq!(record.field("status"), Some(&FieldValue::Str("Unset".into())));
        assert!(matches!(record.field("traceID"), Some(FieldValue::Str(id)) if id.len() == 32));
    }

    #[test]
    fn test_nothing_logged_at_default_level() {
        let (provider, memory) = provider(&[]);
        let tracer = provider.tracer("test");
        tracer.start("quiet").end();
        assert!(memory.records().is_empty());
    }

    #[test]
    fn test_status_names() {
        assert_eq!(status_name(&Status::Ok), "Ok");
        assert_eq!(status_name(&Status::error("boom")), "Error");
    }
}
