//! Named loggers.
//!
//! [`Logging`] is handed to collaborators; each asks it for a logger scoped
//! to its own namespace. The effective level is resolved once per logger.

use std::fmt;
use std::sync::Arc;

use crate::logging::gate::LevelGate;
use crate::logging::level::Level;
use crate::logging::resolver::{LevelResolver, NamespacePath};
use crate::logging::sink::{Field, LogRecord, LogSink};

/// Factory for namespace-scoped loggers.
#[derive(Clone)]
pub struct Logging {
    resolver: Arc<LevelResolver>,
    root: Arc<dyn LogSink>,
}

impl Logging {
    pub fn new(resolver: LevelResolver, root: Arc<dyn LogSink>) -> Self {
        Self {
            resolver: Arc::new(resolver),
            root,
        }
    }

    /// Shared override table, also used by the root subscriber's filter.
    pub fn resolver(&self) -> &Arc<LevelResolver> {
        &self.resolver
    }

    /// Logger for `name`, e.g. `logging.logger(&["service", "api"])`.
    pub fn logger(&self, name: &[&str]) -> Logger {
        self.logger_for(&NamespacePath::from(name))
    }

    pub fn logger_for(&self, namespace: &NamespacePath) -> Logger {
        let gate = LevelGate::for_namespace(self.root.clone(), &self.resolver, namespace);
        let level = gate.threshold();
        let name = namespace.to_string();

        if level != Level::DEFAULT {
            let fields = [
                Field::new("name", name.clone()),
                Field::new("level", level.as_str()),
            ];
            write_or_report(
                self.root.as_ref(),
                &LogRecord {
                    level: Level::Info,
                    logger: "",
                    message: "Setting log level",
                    fields: &fields,
                },
            );
        }

        Logger {
            name: Arc::from(name),
            level,
            sink: Arc::new(gate),
        }
    }
}

impl fmt::Debug for Logging {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logging")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

/// A logger bound to one namespace.
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    level: Level,
    sink: Arc<dyn LogSink>,
}

impl Logger {
    /// Logger writing straight to `sink` with a fixed level, bypassing resolution.
    pub fn with_sink(name: &str, level: Level, sink: Arc<dyn LogSink>) -> Self {
        Self {
            name: Arc::from(name),
            level,
            sink: Arc::new(LevelGate::new(sink, level)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Level resolved for this logger's namespace.
    pub fn level(&self) -> Level {
        self.level
    }

    pub fn enabled(&self, level: Level) -> bool {
        self.sink.enabled(level)
    }

    /// A logger that adds `fields` to every record.
    pub fn with(&self, fields: Vec<Field>) -> Logger {
        Logger {
            name: self.name.clone(),
            level: self.level,
            sink: self.sink.with_fields(fields),
        }
    }

    pub fn log(&self, level: Level, message: &str, fields: &[Field]) {
        if !self.sink.enabled(level) {
            return;
        }
        write_or_report(
            self.sink.as_ref(),
            &LogRecord {
                level,
                logger: &self.name,
                message,
                fields,
            },
        );
    }

    pub fn debug(&self, message: &str, fields: &[Field]) {
        self.log(Level::Debug, message, fields);
    }

    pub fn info(&self, message: &str, fields: &[Field]) {
        self.log(Level::Info, message, fields);
    }

    pub fn warn(&self, message: &str, fields: &[Field]) {
        self.log(Level::Warn, message, fields);
    }

    pub fn error(&self, message: &str, fields: &[Field]) {
        self.log(Level::Error, message, fields);
    }

    pub fn flush(&self) {
        if let Err(e) = self.sink.flush() {
            tracing::warn!(logger = %self.name, error = %e, "Failed to flush log sink");
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

fn write_or_report(sink: &dyn LogSink, record: &LogRecord<'_>) {
    if let Err(e) = sink.write(record) {
        tracing::warn!(logger = %record.logger, error = %e, "Failed to write log record");
    }
}
