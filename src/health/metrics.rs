//! Health gauges.
//!
//! # Metrics
//! - `health_check_up` (gauge, labels `set`, `check`): 1=up, 0=down
//! - `health_status_up` (gauge, label `set`): 1=up, 0=down
//!
//! No-ops unless the host process installs a `metrics` recorder.

use crate::health::aggregator::CheckSet;
use crate::health::check::{AggregateStatus, Status};

pub fn record_check(set: CheckSet, name: &str, status: Status) {
    let value = if status == Status::Up { 1.0 } else { 0.0 };
    metrics::gauge!("health_check_up", "set" => set.as_str(), "check" => name.to_string())
        .set(value);
}

pub fn record_aggregate(set: CheckSet, status: AggregateStatus) {
    let value = if status.is_up() { 1.0 } else { 0.0 };
    metrics::gauge!("health_status_up", "set" => set.as_str()).set(value);
}
