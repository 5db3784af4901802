//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment / TOML file
//!     → source.rs (environment-style key lookup, file flattening, layering)
//!     → loader.rs (typed parsing, all errors collected)
//!     → validation.rs (semantic checks)
//!     → BootstrapConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is read exactly once at startup; there is no reload
//! - All fields have defaults so an empty environment is a valid config
//! - Keys follow the `SECTION_FIELD` environment convention in every source

pub mod loader;
pub mod schema;
pub mod source;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BootstrapConfig, HealthServerConfig, LogConfig, LogExportConfig, LogSamplingConfig,
    MetricsConfig, PropagatorKind, ServiceInfo, ShutdownConfig, TracingConfig,
};
pub use source::{ConfigSource, EnvSource, LayeredSource, MapSource, TomlSource};
