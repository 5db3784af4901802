//! Structured logging.
//!
//! # Data Flow
//! ```text
//! LOG_LEVEL[_NAMESPACE...] keys
//!     → resolver.rs (override table, most-specific-prefix lookup)
//!     → gate.rs (fixed threshold per logger)
//!     → logger.rs (named loggers handed to collaborators)
//!     → sink.rs (TracingSink → installed subscriber)
//!
//! Plain tracing events:
//!     → filter.rs (same resolver applied to event targets)
//!     → setup.rs layers (console, file, OpenTelemetry bridge)
//!     → sampler.rs (repeated events dropped per layer)
//!     → format.rs (JSON lines, logger fields spread into the object)
//! ```
//!
//! # Design Decisions
//! - Resolution happens once per logger, never per record
//! - Resolution never fails; malformed values count as unset
//! - Sinks are composed explicitly through the `LogSink` trait

pub mod filter;
pub mod format;
pub mod gate;
pub mod level;
pub mod logger;
pub mod resolver;
pub mod sampler;
pub mod setup;
pub mod sink;

pub use filter::NamespaceFilter;
pub use format::JsonFormat;
pub use gate::LevelGate;
pub use level::Level;
pub use logger::{Logger, Logging};
pub use resolver::{LevelResolver, NamespacePath};
pub use sampler::SamplingFilter;
pub use setup::{init_root, LoggingError};
pub use sink::{Field, FieldValue, LogRecord, LogSink, MemorySink, TracingSink};
