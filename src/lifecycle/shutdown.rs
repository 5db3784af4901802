//! Shutdown coordination.
//!
//! [`Shutdown`] tells long-running tasks (the health server) to stop.
//! [`ShutdownHooks`] collects the cleanup work registered during startup
//! (flushing telemetry exporters) and runs it under one deadline.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Later calls are no-ops.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Failure reported by a shutdown hook.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(reason: impl std::fmt::Display) -> Self {
        Self(reason.to_string())
    }
}

type HookFn = Box<dyn FnOnce(Instant) -> BoxFuture<'static, Result<(), HookError>> + Send>;

struct Hook {
    name: String,
    run: HookFn,
}

/// Cleanup callbacks registered during startup.
///
/// Hooks receive the shared deadline so they can bound their own waits.
#[derive(Default)]
pub struct ShutdownHooks {
    hooks: Mutex<Vec<Hook>>,
}

/// Outcome of [`ShutdownHooks::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub completed: Vec<String>,
    pub failed: Vec<(String, HookError)>,
    pub timed_out: Vec<String>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.timed_out.is_empty()
    }
}

impl ShutdownHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook. Hooks run in reverse registration order.
    pub fn register<F, Fut>(&self, name: impl Into<String>, hook: F)
    where
        F: FnOnce(Instant) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        let hook = Hook {
            name: name.into(),
            run: Box::new(move |deadline| -> BoxFuture<'static, Result<(), HookError>> {
                Box::pin(hook(deadline))
            }),
        };
        self.lock().push(hook);
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Names of registered hooks, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.lock().iter().map(|h| h.name.clone()).collect()
    }

    /// Run and drain every hook, newest first, all bounded by one deadline.
    ///
    /// A failing or slow hook is logged and skipped; the rest still run.
    pub async fn run(&self, timeout: Duration) -> ShutdownReport {
        let hooks: Vec<Hook> = std::mem::take(&mut *self.lock());
        let deadline = Instant::now() + timeout;
        let mut report = ShutdownReport::default();

        for hook in hooks.into_iter().rev() {
            let Hook { name, run } = hook;
            match tokio::time::timeout_at(deadline, run(deadline)).await {
                Ok(Ok(())) => {
                    tracing::debug!(hook = %name, "Shutdown hook completed");
                    report.completed.push(name);
                }
                Ok(Err(e)) => {
                    tracing::warn!(hook = %name, error = %e, "Shutdown hook failed");
                    report.failed.push((name, e));
                }
                Err(_) => {
                    tracing::warn!(
                        hook = %name,
                        timeout_ms = timeout.as_millis() as u64,
                        "Shutdown hook timed out"
                    );
                    report.timed_out.push(name);
                }
            }
        }

        report
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Hook>> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn test_hooks_run_in_reverse_order() {
        let hooks = ShutdownHooks::new();
        let order = Arc::new(StdMutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let order = order.clone();
            hooks.register(name, move |_| async move {
                order.lock().unwrap().push(name);
                Ok(())
            });
        }

        let report = hooks.run(Duration::from_secs(1)).await;
        assert!(report.is_clean());
        assert_eq!(*order.lock().unwrap(), vec!["third", "second", "first"]);
        assert!(hooks.is_empty());
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_others() {
        let hooks = ShutdownHooks::new();
        hooks.register("ok", |_| async { Ok(()) });
        hooks.register("broken", |_| async { Err(HookError::new("flush failed")) });

        let report = hooks.run(Duration::from_secs(1)).await;
        assert_eq!(report.completed, vec!["ok".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].1, HookError::new("flush failed"));
    }

    #[tokio::test]
    async fn test_slow_hook_is_bounded() {
        let hooks = ShutdownHooks::new();
        hooks.register("slow", |_| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        });

        let started = std::time::Instant::now();
        let report = hooks.run(Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(report.timed_out, vec!["slow".to_string()]);
    }

    #[tokio::test]
    async fn test_hook_receives_deadline() {
        let hooks = ShutdownHooks::new();
        let seen = Arc::new(StdMutex::new(None));
        let seen_clone = seen.clone();
        hooks.register("deadline", move |deadline| async move {
            *seen_clone.lock().unwrap() = Some(deadline);
            Ok(())
        });

        let before = Instant::now();
        hooks.run(Duration::from_secs(10)).await;
        let deadline = seen.lock().unwrap().unwrap();
        assert!(deadline > before + Duration::from_secs(9));
    }

    #[test]
    fn test_shutdown_trigger_once() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        assert!(!shutdown.is_triggered());

        shutdown.trigger();
        shutdown.trigger();
        assert!(shutdown.is_triggered());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
