//! Service bootstrap library: hierarchical logging, OpenTelemetry provider
//! selection and liveness/readiness reporting for tokio services.

pub mod config;
pub mod health;
pub mod lifecycle;
pub mod logging;
pub mod telemetry;

pub use config::{BootstrapConfig, ServiceInfo};
pub use health::{Check, CheckError, HealthAggregator};
pub use lifecycle::{Bootstrap, BootstrapError, Service, Shutdown};
pub use logging::{Field, Level, Logger, Logging};
pub use telemetry::TelemetryProviders;
