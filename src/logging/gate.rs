//! Level gate: a sink decorator enforcing a fixed minimum level.

use std::io;
use std::sync::Arc;

use crate::logging::level::Level;
use crate::logging::resolver::{LevelResolver, NamespacePath};
use crate::logging::sink::{Field, LogRecord, LogSink};

/// Drops records below `threshold` and forwards the rest to the wrapped sink.
///
/// The threshold is resolved once when the gate is built and carried over to
/// every sink derived through [`LogSink::with_fields`].
#[derive(Clone)]
pub struct LevelGate {
    inner: Arc<dyn LogSink>,
    threshold: Level,
}

impl LevelGate {
    pub fn new(inner: Arc<dyn LogSink>, threshold: Level) -> Self {
        Self { inner, threshold }
    }

    /// Gate `inner` at the level the resolver assigns to `namespace`.
    pub fn for_namespace(
        inner: Arc<dyn LogSink>,
        resolver: &LevelResolver,
        namespace: &NamespacePath,
    ) -> Self {
        Self::new(inner, resolver.resolve(namespace))
    }

    pub fn threshold(&self) -> Level {
        self.threshold
    }
}

impl std::fmt::Debug for LevelGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelGate")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl LogSink for LevelGate {
    fn enabled(&self, level: Level) -> bool {
        level >= self.threshold && self.inner.enabled(level)
    }

    fn write(&self, record: &LogRecord<'_>) -> io::Result<()> {
        if record.level < self.threshold {
            return Ok(());
        }
        self.inner.write(record)
    }

    fn flush(&self) -> io::Result<()> {
        self.inner.flush()
    }

    fn with_fields(&self, fields: Vec<Field>) -> Arc<dyn LogSink> {
        Arc::new(LevelGate {
            inner: self.inner.with_fields(fields),
            threshold: self.threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::sink::MemorySink;

    fn write(sink: &dyn LogSink, level: Level, message: &str) {
        sink.write(&LogRecord {
            level,
            logger: "test",
            message,
            fields: &[],
        })
        .unwrap();
    }

    #[test]
    fn test_warn_gate() {
        let memory = MemorySink::new();
        let gate = LevelGate::new(Arc::new(memory.clone()), Level::Warn);

        assert!(!gate.enabled(Level::Debug));
        assert!(!gate.enabled(Level::Info));
        assert!(gate.enabled(Level::Warn));
        assert!(gate.enabled(Level::Error));

        write(&gate, Level::Debug, "debug");
        write(&gate, Level::Info, "info");
        write(&gate, Level::Warn, "warn");
        write(&gate, Level::Error, "error");
        assert_eq!(memory.messages(), vec!["warn", "error"]);
    }

    #[test]
    fn test_threshold_survives_with_fields() {
        let memory = MemorySink::new();
        let gate = LevelGate::new(Arc::new(memory.clone()), Level::Error);
        let child = gate.with_fields(vec![Field::new("request", "abc")]);

        assert!(!child.enabled(Level::Warn));
        write(child.as_ref(), Level::Warn, "dropped");
        write(child.as_ref(), Level::Error, "kept");

        let records = memory.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "kept");
        assert!(records[0].field("request").is_some());
    }

    #[test]
    fn test_gates_chain() {
        let memory = MemorySink::new();
        let inner: Arc<dyn LogSink> = Arc::new(LevelGate::new(Arc::new(memory.clone()), Level::Info));
        let outer = LevelGate::new(inner, Level::Debug);

        // The stricter inner gate still applies.
        assert!(!outer.enabled(Level::Debug));
        assert!(outer.enabled(Level::Info));
    }

    #[test]
    fn test_for_namespace() {
        let resolver = LevelResolver::from_entries([("LOG_LEVEL_SERVICE", "ERROR")]);
        let gate = LevelGate::for_namespace(
            Arc::new(MemorySink::new()),
            &resolver,
            &["service", "api"].into(),
        );
        assert_eq!(gate.threshold(), Level::Error);
    }
}
