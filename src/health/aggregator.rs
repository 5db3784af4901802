//! Liveness and readiness check registry.
//!
//! # Evaluation
//! ```text
//! check_liveness() / check_readiness()
//!     → snapshot the set
//!     → spawn every check, all sharing one deadline
//!     → per check: Unknown/Up/Down transition → log + event + gauge
//!     → aggregate (any Down ⇒ Down) transition → log + event + gauge
//!     → HealthReport
//! ```
//!
//! # Design Decisions
//! - Checks run as tasks; one still running at the deadline counts as Down
//!   and is left to finish on its own
//! - Duplicate names are kept: each registration is evaluated and tracked
//!   separately
//! - Last-known status lives per registration, so concurrent evaluations
//!   report each transition once

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::time::Instant;

use crate::health::check::{AggregateStatus, Check, CheckError, Status};
use crate::health::metrics::{record_aggregate, record_check};
use crate::logging::{Field, Logger, Logging};

/// Upper bound for evaluating one set.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckSet {
    Liveness,
    Readiness,
}

impl CheckSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckSet::Liveness => "liveness",
            CheckSet::Readiness => "readiness",
        }
    }
}

impl fmt::Display for CheckSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status transition reported to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    CheckChanged {
        set: CheckSet,
        name: String,
        status: Status,
    },
    AggregateChanged {
        set: CheckSet,
        status: AggregateStatus,
    },
}

type Listener = Arc<dyn Fn(&HealthEvent) + Send + Sync>;

/// Result of one check within a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub name: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of evaluating a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: AggregateStatus,
    pub checks: Vec<CheckReport>,
}

struct Registered {
    check: Check,
    last: Mutex<Status>,
}

struct SetState {
    set: CheckSet,
    checks: RwLock<Vec<Arc<Registered>>>,
    aggregate: Mutex<Status>,
    logger: Logger,
}

impl SetState {
    fn new(set: CheckSet, logger: &Logger) -> Self {
        Self {
            set,
            checks: RwLock::new(Vec::new()),
            aggregate: Mutex::new(Status::Unknown),
            logger: logger.with(vec![Field::new("type", set.as_str())]),
        }
    }

    fn snapshot(&self) -> Vec<Arc<Registered>> {
        self.checks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, check: Check) {
        self.checks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(Registered {
                check,
                last: Mutex::new(Status::Unknown),
            }));
    }
}

/// Registry of liveness and readiness checks.
pub struct HealthAggregator {
    liveness: SetState,
    readiness: SetState,
    listeners: RwLock<Vec<Listener>>,
    timeout: Duration,
}

impl HealthAggregator {
    pub fn new(logging: &Logging) -> Self {
        Self::with_timeout(logging, DEFAULT_CHECK_TIMEOUT)
    }

    pub fn with_timeout(logging: &Logging, timeout: Duration) -> Self {
        let logger = logging.logger(&["health"]);
        Self {
            liveness: SetState::new(CheckSet::Liveness, &logger),
            readiness: SetState::new(CheckSet::Readiness, &logger),
            listeners: RwLock::new(Vec::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Add a check served on `/healthz`.
    pub fn add_liveness_check(&self, check: Check) {
        self.liveness.push(check);
    }

    /// Add a check served on `/readyz`.
    pub fn add_readiness_check(&self, check: Check) {
        self.readiness.push(check);
    }

    /// Called synchronously for every transition.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&HealthEvent) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Registered check names in `set`, in registration order.
    pub fn check_names(&self, set: CheckSet) -> Vec<String> {
        self.state(set)
            .snapshot()
            .iter()
            .map(|r| r.check.name().to_string())
            .collect()
    }

    pub async fn check_liveness(&self) -> HealthReport {
        self.evaluate(CheckSet::Liveness).await
    }

    pub async fn check_readiness(&self) -> HealthReport {
        self.evaluate(CheckSet::Readiness).await
    }

    /// Run every check in `set` concurrently under one deadline.
    pub async fn evaluate(&self, set: CheckSet) -> HealthReport {
        let state = self.state(set);
        let checks = state.snapshot();
        let timeout = self.timeout;
        let deadline = Instant::now() + timeout;

        let results = join_all(checks.iter().map(|registered| {
            let check = registered.check.clone();
            let task = tokio::spawn(async move { check.run(deadline).await });
            async move {
                match tokio::time::timeout_at(deadline, task).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => Err(CheckError::Panicked),
                    // Dropping the handle detaches the task.
                    Err(_) => Err(CheckError::Timeout(timeout)),
                }
            }
        }))
        .await;

        let mut reports = Vec::with_capacity(checks.len());
        for (registered, result) in checks.iter().zip(results) {
            let name = registered.check.name();
            let status = if result.is_ok() { Status::Up } else { Status::Down };

            let previous = {
                let mut last = registered.last.lock().unwrap_or_else(PoisonError::into_inner);
                std::mem::replace(&mut *last, status)
            };
            if previous != status {
                self.check_changed(state, name, status, result.as_ref().err());
            }
            record_check(set, name, status);

            reports.push(CheckReport {
                name: name.to_string(),
                status,
                error: result.err().map(|e| e.to_string()),
            });
        }

        let aggregate = AggregateStatus::from_statuses(reports.iter().map(|r| r.status));
        let previous = {
            let mut last = state.aggregate.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *last, aggregate.into())
        };
        if previous != Status::from(aggregate) {
            state.logger.info(
                "Health status changed",
                &[Field::new("state", aggregate.as_str())],
            );
            self.notify(&HealthEvent::AggregateChanged {
                set,
                status: aggregate,
            });
        }
        record_aggregate(set, aggregate);

        HealthReport {
            status: aggregate,
            checks: reports,
        }
    }

    fn check_changed(&self, state: &SetState, name: &str, status: Status, error: Option<&CheckError>) {
        match (status, error) {
            (Status::Up, _) => {
                state
                    .logger
                    .info("Health check marked as healthy", &[Field::new("name", name.to_string())]);
            }
            (_, Some(error)) => {
                state.logger.info(
                    "Health check marked as unhealthy",
                    &[
                        Field::new("name", name.to_string()),
                        Field::new("error", error.to_string()),
                    ],
                );
            }
            (_, None) => {
                state
                    .logger
                    .info("Health check marked as unhealthy", &[Field::new("name", name.to_string())]);
            }
        }
        self.notify(&HealthEvent::CheckChanged {
            set: state.set,
            name: name.to_string(),
            status,
        });
    }

    fn notify(&self, event: &HealthEvent) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(event);
        }
    }

    fn state(&self, set: CheckSet) -> &SetState {
        match set {
            CheckSet::Liveness => &self.liveness,
            CheckSet::Readiness => &self.readiness,
        }
    }
}

impl fmt::Debug for HealthAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthAggregator")
            .field("liveness", &self.check_names(CheckSet::Liveness))
            .field("readiness", &self.check_names(CheckSet::Readiness))
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
