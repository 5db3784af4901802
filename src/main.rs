//! Demo service.
//!
//! Boots logging, telemetry and the health server from the environment
//! (optionally layered over a TOML file), registers a liveness check and
//! runs until SIGINT/SIGTERM.
//!
//! ```text
//! LOG_LEVEL_DEMO=DEBUG OTEL_TRACING_LOG=true LOG_LEVEL_OTEL_TRACE=DEBUG \
//!     cargo run -- --name demo
//! curl -i localhost:8088/healthz
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use opentelemetry::trace::{Span, Tracer};
use opentelemetry::KeyValue;

use service_bootstrap::{Bootstrap, Check, CheckError, Field};

#[derive(Parser)]
#[command(name = "service-bootstrap")]
#[command(about = "Demo service wired with logging, telemetry and health endpoints", long_about = None)]
struct Cli {
    /// Service name reported in logs, traces and metrics
    #[arg(short, long, default_value = "demo")]
    name: String,

    /// Service version
    #[arg(long, default_value = env!("CARGO_PKG_VERSION"))]
    version_tag: String,

    /// TOML file layered underneath the environment
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut bootstrap = Bootstrap::new(cli.name, cli.version_tag);
    if let Some(path) = cli.config {
        bootstrap = bootstrap.with_config_file(path);
    }

    let service = match bootstrap.start().await {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Unable to bootstrap: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Liveness: the runtime still schedules tasks.
    service.health().add_liveness_check(Check::new("runtime", |_| async {
        tokio::spawn(async {}).await.map_err(CheckError::failed)
    }));

    let logger = service.logging().logger(&["demo"]);
    let tracer = service.telemetry().service_tracer();
    let mut span = tracer.start("demo.startup");
    span.set_attribute(KeyValue::new("health.port", i64::from(service.health_addr().port())));
    logger.debug("Registered checks", &[Field::new("liveness", 1u64)]);
    tokio::time::sleep(Duration::from_millis(5)).await;
    span.end();

    logger.info(
        "Ready",
        &[Field::new("health", service.health_addr().to_string())],
    );

    match service.run().await {
        Ok(report) if report.is_clean() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
