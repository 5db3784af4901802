//! Composable logging sinks.
//!
//! A [`LogSink`] is the write side of a logger. Sinks can wrap other sinks
//! (see [`LevelGate`](crate::logging::gate::LevelGate)) and can bind
//! additional fields, returning a new sink with the same behavior.

use serde::Serialize;
use std::borrow::Cow;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::level_filters::LevelFilter;

use crate::logging::level::Level;

/// Target of every event produced by [`TracingSink`].
pub const SINK_TARGET: &str = "service_bootstrap::log";

/// A structured field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Str(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::I64(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::U64(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::F64(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

/// A key/value pair attached to a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: Cow<'static, str>,
    pub value: FieldValue,
}

impl Field {
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<FieldValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A single log write.
#[derive(Debug, Clone, Copy)]
pub struct LogRecord<'a> {
    pub level: Level,
    /// Dotted namespace of the logger that produced the record.
    pub logger: &'a str,
    pub message: &'a str,
    pub fields: &'a [Field],
}

/// Write side of a logger.
pub trait LogSink: Send + Sync {
    /// Whether a record at `level` would be written.
    fn enabled(&self, level: Level) -> bool;

    /// Write one record. Callers check [`enabled`](LogSink::enabled) first.
    fn write(&self, record: &LogRecord<'_>) -> io::Result<()>;

    /// Flush buffered records.
    fn flush(&self) -> io::Result<()>;

    /// A sink that behaves like this one and adds `fields` to every record.
    fn with_fields(&self, fields: Vec<Field>) -> Arc<dyn LogSink>;
}

/// Forwards records to the installed `tracing` subscriber.
#[derive(Debug, Clone, Default)]
pub struct TracingSink {
    bound: Vec<Field>,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogSink for TracingSink {
    fn enabled(&self, level: Level) -> bool {
        level.as_tracing() <= LevelFilter::current()
    }

    fn write(&self, record: &LogRecord<'_>) -> io::Result<()> {
        let fields = render_fields(self.bound.iter().chain(record.fields.iter()));
        let logger = record.logger;
        let message = record.message;

        match record.level {
            Level::Debug => {
                tracing::debug!(target: SINK_TARGET, logger, fields = fields.as_str(), "{}", message)
            }
            Level::Info => {
                tracing::info!(target: SINK_TARGET, logger, fields = fields.as_str(), "{}", message)
            }
            Level::Warn => {
                tracing::warn!(target: SINK_TARGET, logger, fields = fields.as_str(), "{}", message)
            }
            Level::Error => {
                tracing::error!(target: SINK_TARGET, logger, fields = fields.as_str(), "{}", message)
            }
        }
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    fn with_fields(&self, fields: Vec<Field>) -> Arc<dyn LogSink> {
        let mut bound = self.bound.clone();
        bound.extend(fields);
        Arc::new(TracingSink { bound })
    }
}

/// Render fields as a JSON object. Later keys overwrite earlier ones.
///
/// [`JsonFormat`](crate::logging::format::JsonFormat) spreads the object into
/// the enclosing line.
fn render_fields<'a>(fields: impl Iterator<Item = &'a Field>) -> String {
    let map: serde_json::Map<String, serde_json::Value> = fields
        .map(|f| {
            let value = serde_json::to_value(&f.value).unwrap_or(serde_json::Value::Null);
            (f.key.to_string(), value)
        })
        .collect();
    serde_json::Value::Object(map).to_string()
}

/// A record captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedRecord {
    pub level: Level,
    pub logger: String,
    pub message: String,
    /// Bound fields followed by the record's own fields.
    pub fields: Vec<Field>,
}

impl CapturedRecord {
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .rev()
            .find(|f| f.key == key)
            .map(|f| &f.value)
    }
}

/// Keeps every record in memory. Clones and derived sinks share the buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<CapturedRecord>>>,
    bound: Vec<Field>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<CapturedRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.message).collect()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl LogSink for MemorySink {
    fn enabled(&self, _level: Level) -> bool {
        true
    }

    fn write(&self, record: &LogRecord<'_>) -> io::Result<()> {
        let mut fields = self.bound.clone();
        fields.extend(record.fields.iter().cloned());

        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CapturedRecord {
                level: record.level,
                logger: record.logger.to_string(),
                message: record.message.to_string(),
                fields,
            });
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    fn with_fields(&self, fields: Vec<Field>) -> Arc<dyn LogSink> {
        let mut bound = self.bound.clone();
        bound.extend(fields);
        Arc::new(MemorySink {
            records: self.records.clone(),
            bound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record<'a>(level: Level, message: &'a str, fields: &'a [Field]) -> LogRecord<'a> {
        LogRecord {
            level,
            logger: "test",
            message,
            fields,
        }
    }

    #[test]
    fn test_memory_sink_captures() {
        let sink = MemorySink::new();
        let fields = [Field::new("attempt", 3i64)];
        sink.write(&record(Level::Warn, "retrying", &fields)).unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Level::Warn);
        assert_eq!(records[0].message, "retrying");
        assert_eq!(records[0].field("attempt"), Some(&FieldValue::I64(3)));
    }

    #[test]
    fn test_memory_sink_bound_fields_share_buffer() {
        let sink = MemorySink::new();
        let child = sink.with_fields(vec![Field::new("type", "liveness")]);
        child.write(&record(Level::Info, "bound", &[])).unwrap();
        sink.write(&record(Level::Info, "plain", &[])).unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].field("type"),
            Some(&FieldValue::Str("liveness".into()))
        );
        assert_eq!(records[1].field("type"), None);
    }

    #[test]
    fn test_render_fields() {
        let fields = [
            Field::new("name", "db"),
            Field::new("ok", false),
            Field::new("rate", 0.5),
        ];
        let rendered = render_fields(fields.iter());
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["name"], "db");
        assert_eq!(parsed["ok"], false);
        assert_eq!(parsed["rate"], 0.5);
    }
}
