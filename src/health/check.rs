//! Health check definitions.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

/// Why a check reported Down.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckError {
    #[error("{0}")]
    Failed(String),

    #[error("check timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("check panicked")]
    Panicked,
}

impl CheckError {
    pub fn failed(reason: impl fmt::Display) -> Self {
        Self::Failed(reason.to_string())
    }
}

/// Status of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Not yet run to completion.
    Unknown,
    Up,
    Down,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unknown => "unknown",
            Status::Up => "up",
            Status::Down => "down",
        }
    }
}

/// Verdict for a whole check set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateStatus {
    Up,
    Down,
}

impl AggregateStatus {
    /// Down if any status is Down or Unknown; an empty set is Up.
    pub fn from_statuses(statuses: impl IntoIterator<Item = Status>) -> Self {
        if statuses.into_iter().all(|s| s == Status::Up) {
            AggregateStatus::Up
        } else {
            AggregateStatus::Down
        }
    }

    pub fn is_up(&self) -> bool {
        *self == AggregateStatus::Up
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateStatus::Up => "up",
            AggregateStatus::Down => "down",
        }
    }
}

impl From<AggregateStatus> for Status {
    fn from(status: AggregateStatus) -> Self {
        match status {
            AggregateStatus::Up => Status::Up,
            AggregateStatus::Down => Status::Down,
        }
    }
}

type CheckFn = dyn Fn(Instant) -> BoxFuture<'static, Result<(), CheckError>> + Send + Sync;

/// A named health check. The check function receives the evaluation deadline.
#[derive(Clone)]
pub struct Check {
    name: Arc<str>,
    run: Arc<CheckFn>,
}

impl Check {
    pub fn new<F, Fut>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn(Instant) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CheckError>> + Send + 'static,
    {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            run: Arc::new(move |deadline| -> BoxFuture<'static, Result<(), CheckError>> {
                Box::pin(run(deadline))
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn run(&self, deadline: Instant) -> BoxFuture<'static, Result<(), CheckError>> {
        (self.run)(deadline)
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check").field("name", &self.name).finish_non_exhaustive()
    }
}
