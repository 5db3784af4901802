//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT or SIGTERM (Ctrl+C on non-unix targets)
//! - Report which signal arrived

use std::fmt;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
        })
    }
}

/// Resolve on the first termination signal.
///
/// Fails only if a handler cannot be installed.
#[cfg(unix)]
pub async fn wait_for_signal() -> io::Result<ShutdownSignal> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let received = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            ShutdownSignal::Interrupt
        }
        _ = terminate.recv() => ShutdownSignal::Terminate,
    };
    tracing::info!(signal = %received, "Shutdown signal received");
    Ok(received)
}

#[cfg(not(unix))]
pub async fn wait_for_signal() -> io::Result<ShutdownSignal> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = %ShutdownSignal::Interrupt, "Shutdown signal received");
    Ok(ShutdownSignal::Interrupt)
}
