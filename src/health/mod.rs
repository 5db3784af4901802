//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! Collaborators register checks (aggregator.rs):
//!     add_liveness_check / add_readiness_check
//!
//! Health request (server.rs):
//!     GET /healthz → liveness set
//!     GET /readyz  → readiness set
//!     → aggregator evaluates the set (5s shared deadline)
//!     → transitions logged, listeners notified, gauges updated (metrics.rs)
//!     → 200 (up) / 503 (down)
//! ```
//!
//! # Design Decisions
//! - Liveness and readiness are independent sets; evaluating one never runs
//!   the other
//! - A check that never completed counts as down
//! - An empty set is up

pub mod aggregator;
pub mod check;
pub mod metrics;
pub mod server;

pub use aggregator::{
    CheckReport, CheckSet, HealthAggregator, HealthEvent, HealthReport, DEFAULT_CHECK_TIMEOUT,
};
pub use check::{AggregateStatus, Check, CheckError, Status};
pub use server::{router, HealthServer};
