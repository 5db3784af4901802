//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Logging → Telemetry → Health server
//!
//! Shutdown (shutdown.rs):
//!     stop() → hooks newest first (health server, exporters) → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → stop()
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then logging, listeners last
//! - Ordered shutdown: stop serving health requests, then flush exporters
//! - Shutdown has timeout: hooks share one deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{HookError, Shutdown, ShutdownHooks, ShutdownReport};
pub use signals::{wait_for_signal, ShutdownSignal};
pub use startup::{Bootstrap, BootstrapError, Service};
