//! JSON line output.
//!
//! One object per event with `timestamp`, `level`, `target`, the event's
//! fields and the innermost span name. Records written through a
//! [`Logger`](crate::logging::Logger) carry their fields as one encoded
//! object; those fields are spread into the line next to `logger` and
//! `message`. A field that would shadow a top-level key is kept under
//! `fields.<key>`.

use std::fmt;

use serde_json::{Map, Number, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;

use crate::logging::sink::SINK_TARGET;

/// Event formatter for the JSON console and file outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl<S, N> FormatEvent<S, N> for JsonFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'w> FormatFields<'w> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let mut timestamp = String::new();
        SystemTime.format_time(&mut Writer::new(&mut timestamp))?;

        let mut line = Map::new();
        line.insert("timestamp".into(), Value::String(timestamp));
        line.insert("level".into(), meta.level().as_str().into());
        line.insert("target".into(), meta.target().into());

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        let mut fields = visitor.fields;

        let bound = if meta.target() == SINK_TARGET {
            match fields.remove("fields") {
                Some(Value::String(encoded)) => {
                    serde_json::from_str::<Map<String, Value>>(&encoded).unwrap_or_default()
                }
                Some(other) => {
                    fields.insert("fields".into(), other);
                    Map::new()
                }
                None => Map::new(),
            }
        } else {
            Map::new()
        };

        let span = event
            .parent()
            .and_then(|id| ctx.span(id))
            .or_else(|| ctx.lookup_current());
        if let Some(span) = span {
            line.insert("span".into(), span.name().into());
        }

        for (key, value) in fields.into_iter().chain(bound) {
            spread(&mut line, key, value);
        }

        let encoded = serde_json::to_string(&line).map_err(|_| fmt::Error)?;
        writeln!(writer, "{}", encoded)
    }
}

fn spread(line: &mut Map<String, Value>, key: String, value: Value) {
    if line.contains_key(&key) {
        line.insert(format!("fields.{}", key), value);
    } else {
        line.insert(key, value);
    }
}

/// Collects event fields as JSON values.
#[derive(Default)]
struct JsonVisitor {
    fields: Map<String, Value>,
}

impl JsonVisitor {
    fn put(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for JsonVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = Number::from_f64(value).map_or(Value::Null, Value::Number);
        self.put(field, value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.into());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.into());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, value.to_string().into());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{:?}", value).into());
    }
}
