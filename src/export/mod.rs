//! HTTP exposition of collected statistics and exporter self metrics.

pub mod health;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use prometheus::{Encoder, TextEncoder};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::StatsSource;
use crate::collector::Collector;
use crate::sink::Snapshot;

pub use health::HealthMetrics;

/// HTTP server exposing memcached statistics in Prometheus text format.
///
/// Every request to the telemetry path runs one collection cycle against a
/// fresh snapshot.
pub struct Server<S> {
    addr: String,
    state: Arc<AppState<S>>,
    shutdown: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

/// Shared state for axum handlers.
struct AppState<S> {
    collector: Collector<S>,
    health: HealthMetrics,
    telemetry_path: String,
}

impl<S: StatsSource> Server<S> {
    pub fn new(addr: &str, telemetry_path: &str, collector: Collector<S>) -> Result<Self> {
        let health = HealthMetrics::new().context("registering exporter metrics")?;

        Ok(Self {
            addr: addr.to_string(),
            state: Arc::new(AppState {
                collector,
                health,
                telemetry_path: telemetry_path.to_string(),
            }),
            shutdown: Mutex::new(None),
        })
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/", get(landing_handler::<S>))
            .route(&self.state.telemetry_path, get(metrics_handler::<S>))
            .route("/healthz", get(healthz_handler))
            .with_state(Arc::clone(&self.state))
    }

    /// Binds the listener and starts serving in the background. Returns the
    /// bound address.
    pub async fn start(&self) -> Result<SocketAddr> {
        // Parse address, handling ":port" shorthand.
        let bind_addr = if self.addr.starts_with(':') {
            format!("0.0.0.0{}", self.addr)
        } else {
            self.addr.clone()
        };

        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("listening on {bind_addr}"))?;

        let local_addr = listener.local_addr().context("getting local address")?;

        let app = self.router();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            tracing::info!(addr = %local_addr, "metrics server started");

            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    token.cancelled().await;
                })
                .await;

            if let Err(e) = result {
                tracing::error!(error = %e, "metrics server error");
            }
        });

        *self.shutdown.lock() = Some((cancel, handle));

        Ok(local_addr)
    }

    /// Gracefully shuts down the server, waiting for in-flight scrapes.
    pub async fn stop(&self) -> Result<()> {
        let running = self.shutdown.lock().take();

        if let Some((cancel, handle)) = running {
            cancel.cancel();
            handle.await.context("joining metrics server task")?;
        }

        Ok(())
    }
}

/// GET <telemetry_path> - one collection cycle in Prometheus text format.
async fn metrics_handler<S: StatsSource>(State(state): State<Arc<AppState<S>>>) -> Response {
    let started = Instant::now();
    state.health.scrapes.inc();

    let snapshot = match Snapshot::new() {
        Ok(snapshot) => Arc::new(snapshot),
        Err(e) => {
            tracing::error!(error = %e, "building metrics snapshot");
            return (StatusCode::INTERNAL_SERVER_ERROR, "snapshot error").into_response();
        }
    };

    let summary = state.collector.collect(snapshot.clone()).await;

    state
        .health
        .scrape_duration
        .observe(started.elapsed().as_secs_f64());
    state.health.servers_up.set(summary.reachable as f64);

    let mut metric_families = snapshot.gather();
    metric_families.extend(state.health.registry().gather());

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "encoding metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, "encoding error").into_response();
    }

    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

/// GET / - landing page.
async fn landing_handler<S: StatsSource>(State(state): State<Arc<AppState<S>>>) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>memcached exporter</title></head>\n<body>\n\
         <h1>memcached exporter</h1>\n<p><a href=\"{path}\">Metrics</a></p>\n\
         </body>\n</html>\n",
        path = state.telemetry_path,
    ))
}

/// GET /healthz - Simple health check.
async fn healthz_handler() -> &'static str {
    "ok"
}
