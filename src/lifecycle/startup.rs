//! Startup orchestration.
//!
//! # Order
//! ```text
//! config source (environment over optional TOML file)
//!     → BootstrapConfig + level overrides
//!     → OTLP logs provider (needed by the subscriber)
//!     → root subscriber, "Starting application"
//!     → tracer and meter providers
//!     → health aggregator + health server
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and returned to the caller
//! - The health server starts last and stops first
//! - An already-installed global subscriber is kept, so several services
//!   can start in one process (tests)

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{
    load_config, loader::load_file_source, BootstrapConfig, ConfigError, ConfigSource, EnvSource,
    LayeredSource, ServiceInfo,
};
use crate::health::{HealthAggregator, HealthServer};
use crate::lifecycle::shutdown::{HookError, Shutdown, ShutdownHooks, ShutdownReport};
use crate::lifecycle::signals::wait_for_signal;
use crate::logging::{init_root, Field, LevelResolver, Logger, Logging, LoggingError, TracingSink};
use crate::telemetry::{service_resource, setup_logs, setup_telemetry, TelemetryError, TelemetryProviders};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    #[error("telemetry setup failed: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("failed to bind health server on port {port}: {source}")]
    HealthServer {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for shutdown signal: {0}")]
    Signal(#[source] io::Error),
}

/// Builder for a bootstrapped service.
pub struct Bootstrap {
    service: ServiceInfo,
    source: Option<Box<dyn ConfigSource>>,
    config_file: Option<PathBuf>,
}

impl Bootstrap {
    /// Bootstrap reading configuration from the process environment.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            service: ServiceInfo::new(name, version),
            source: None,
            config_file: None,
        }
    }

    /// Read configuration from `source` instead of the environment.
    pub fn with_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Layer a TOML file underneath the primary source.
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    fn build_source(&mut self) -> Result<Box<dyn ConfigSource>, ConfigError> {
        let primary = self
            .source
            .take()
            .unwrap_or_else(|| Box::new(EnvSource::new()));
        match &self.config_file {
            Some(path) => {
                let file = load_file_source(path)?;
                Ok(Box::new(LayeredSource::new().push(primary).push(file)))
            }
            None => Ok(primary),
        }
    }

    /// Bring up logging, telemetry and the health server.
    pub async fn start(mut self) -> Result<Service, BootstrapError> {
        let source = self.build_source()?;
        let config = load_config(source.as_ref())?;
        let mut service = self.service;
        service.development = config.development;

        let hooks = ShutdownHooks::new();
        let otel_logs = setup_logs(&config.logs, &service_resource(&service), &hooks)?;

        let logging = Logging::new(
            LevelResolver::from_source(source.as_ref()),
            Arc::new(TracingSink::new()),
        );
        match init_root(
            &config.log,
            service.development,
            logging.resolver().clone(),
            otel_logs.as_ref(),
        ) {
            Ok(()) => {}
            Err(LoggingError::AlreadyInitialized) => {
                tracing::warn!("Global subscriber already installed, keeping it");
            }
            Err(e) => return Err(e.into()),
        }

        let logger = logging.logger(&[]);
        logger.info(
            "Starting application",
            &[
                Field::new("name", service.name.clone()),
                Field::new("version", service.version.clone()),
            ],
        );

        let telemetry = setup_telemetry(&service, &config, &logging, &hooks)?;

        let health = Arc::new(HealthAggregator::new(&logging));
        let server = HealthServer::bind(&config.health, health.clone())
            .await
            .map_err(|source| BootstrapError::HealthServer {
                port: config.health.port,
                source,
            })?;
        let health_addr = server.local_addr();
        logger.info(
            "Starting health server",
            &[Field::new("port", u64::from(health_addr.port()))],
        );

        let shutdown = Shutdown::new();
        let task = tokio::spawn(server.serve(shutdown.subscribe()));
        let stopper = shutdown.clone();
        hooks.register("health-server", move |_deadline| async move {
            stopper.trigger();
            match task.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(HookError::new(e)),
                Err(e) => Err(HookError::new(e)),
            }
        });

        Ok(Service {
            info: service,
            config,
            logging,
            logger,
            telemetry,
            health,
            hooks,
            shutdown,
            health_addr,
        })
    }
}

/// A running service: loggers, telemetry handles and health registry.
pub struct Service {
    info: ServiceInfo,
    config: BootstrapConfig,
    logging: Logging,
    logger: Logger,
    telemetry: TelemetryProviders,
    health: Arc<HealthAggregator>,
    hooks: ShutdownHooks,
    shutdown: Shutdown,
    health_addr: SocketAddr,
}

impl Service {
    pub fn info(&self) -> &ServiceInfo {
        &self.info
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Factory for namespace-scoped loggers.
    pub fn logging(&self) -> &Logging {
        &self.logging
    }

    /// The root logger.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn telemetry(&self) -> &TelemetryProviders {
        &self.telemetry
    }

    pub fn health(&self) -> &Arc<HealthAggregator> {
        &self.health
    }

    /// Hooks registered here run before the built-in ones on stop.
    pub fn hooks(&self) -> &ShutdownHooks {
        &self.hooks
    }

    /// Fires when the service begins stopping.
    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn health_addr(&self) -> SocketAddr {
        self.health_addr
    }

    /// Run until SIGINT/SIGTERM, then stop.
    pub async fn run(self) -> Result<ShutdownReport, BootstrapError> {
        wait_for_signal().await.map_err(BootstrapError::Signal)?;
        Ok(self.stop().await)
    }

    /// Stop the health server and flush every exporter within the
    /// configured shutdown timeout.
    pub async fn stop(self) -> ShutdownReport {
        let timeout = self.config.shutdown.timeout();
        self.logger.info(
            "Stopping application",
            &[Field::new("timeoutSecs", timeout.as_secs())],
        );

        let report = self.hooks.run(timeout).await;
        if !report.is_clean() {
            self.logger.warn(
                "Shutdown finished with errors",
                &[
                    Field::new("failed", report.failed.len() as u64),
                    Field::new("timedOut", report.timed_out.len() as u64),
                ],
            );
        }
        self.logger.flush();
        report
    }
}
