//! Health HTTP endpoints.
//!
//! # Routes
//! - `GET /healthz`: liveness set
//! - `GET /readyz`: readiness set
//!
//! Both answer 200 when the set is up and 503 otherwise, with the
//! [`HealthReport`] as a JSON body.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::HealthServerConfig;
use crate::health::aggregator::{HealthAggregator, HealthReport};
use crate::health::check::AggregateStatus;

pub fn status_code(status: AggregateStatus) -> StatusCode {
    match status {
        AggregateStatus::Up => StatusCode::OK,
        AggregateStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Router serving both health endpoints.
pub fn router(health: Arc<HealthAggregator>) -> Router {
    Router::new()
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
        .with_state(health)
        .layer(TraceLayer::new_for_http())
}

async fn liveness(State(health): State<Arc<HealthAggregator>>) -> Response {
    respond(health.check_liveness().await)
}

async fn readiness(State(health): State<Arc<HealthAggregator>>) -> Response {
    respond(health.check_readiness().await)
}

fn respond(report: HealthReport) -> Response {
    (status_code(report.status), Json(report)).into_response()
}

/// Health server bound to `0.0.0.0:<port>`.
pub struct HealthServer {
    listener: TcpListener,
    router: Router,
    addr: SocketAddr,
}

impl HealthServer {
    pub async fn bind(config: &HealthServerConfig, health: Arc<HealthAggregator>) -> io::Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], config.port))).await?;
        let addr = listener.local_addr()?;
        Ok(Self {
            listener,
            router: router(health),
            addr,
        })
    }

    /// Bound address; differs from the configured one when port 0 was used.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until `shutdown` fires, then finish in-flight requests.
    pub async fn serve(self, mut shutdown: broadcast::Receiver<()>) -> io::Result<()> {
        tracing::debug!(address = %self.addr, "Health server accepting connections");
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;
        tracing::info!(address = %self.addr, "Health server stopped");
        Ok(())
    }
}
