//! File Server - CORS-Enabled Snapshot Server
//!
//! Serves the published `prices.json`, the in-memory snapshot at
//! `/api/data`, and the `/live`, `/ready` and `/metrics` health routes via
//! axum 0.7. Every response allows any origin to GET and forbids
//! caching, so a browser client polling the file always sees the
//! latest commit.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::adapters::metrics::{HealthState, MetricsRegistry};
use crate::adapters::publish::SnapshotCell;

const JSON: &str = "application/json";
const NO_DATA: &str = "No data found.";

/// State shared with every handler.
#[derive(Clone)]
pub struct ServerState {
    /// Published file served at the configured path.
    pub file_path: PathBuf,
    /// In-memory snapshot served at `/api/data`.
    pub cell: SnapshotCell,
    pub health: Arc<HealthState>,
    pub metrics: Arc<MetricsRegistry>,
}

/// Bound, not yet running file server.
pub struct FileServer {
    listener: TcpListener,
    router: Router,
}

impl FileServer {
    /// Routes for the server, with the header layer applied.
    pub fn router(serve_path: &str, state: ServerState) -> Router {
        Router::new()
            .route(serve_path, get(serve_file))
            .route("/api/data", get(serve_snapshot))
            .route("/live", get(liveness))
            .route("/ready", get(readiness))
            .route("/metrics", get(metrics))
            .fallback(not_found)
            .with_state(state)
            .layer(middleware::map_response(add_client_headers))
    }

    /// Bind `addr` so the caller knows the port before the server runs.
    pub async fn bind(addr: &str, serve_path: &str, state: ServerState) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind file server to {addr}"))?;

        Ok(Self {
            listener,
            router: Self::router(serve_path, state),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("File server has no local address")
    }

    /// Serve until `cancel` fires, then drain in-flight requests.
    #[instrument(skip(self, cancel), name = "file_server")]
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let addr = self.local_addr()?;
        info!(address = %addr, "File server listening");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
            .context("File server failed")?;

        info!("File server stopped");
        Ok(())
    }
}

/// Headers a browser client needs on every response.
async fn add_client_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    response
}

async fn serve_file(State(state): State<ServerState>) -> Response {
    match tokio::fs::read(&state.file_path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, JSON)], bytes).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, NO_DATA).into_response()
        }
        Err(e) => {
            error!(path = %state.file_path.display(), error = %e, "Failed to read published file");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn serve_snapshot(State(state): State<ServerState>) -> Response {
    match state.cell.current() {
        Some(published) => ([(header::CONTENT_TYPE, JSON)], published.body.clone()).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, NO_DATA).into_response(),
    }
}

async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness(State(state): State<ServerState>) -> impl IntoResponse {
    if state.health.is_ready() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics(State(state): State<ServerState>) -> Response {
    match state.metrics.encode() {
        Ok(text) => text.into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn not_found() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}
