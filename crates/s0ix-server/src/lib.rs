//! HTTP residency server.
//!
//! Serves the tracker's statistics, sleep state and sampler health as JSON,
//! plus a plain-text summary and single-attribute reads for shell scripts.
//! Sampler failures show up in the health fields; they never turn into HTTP
//! errors.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::Serialize;

use s0ix_core::{ATTRIBUTES, HealthReport, Reporter, StatsReport, render_text};

/// Shared server state.
struct AppState {
    reporter: Reporter,
}

#[derive(Serialize)]
struct ResetResponse {
    ok: bool,
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
}

trait JsonWithStatus<T> {
    fn with_status(self, status: StatusCode) -> (StatusCode, Json<T>);
}

impl<T> JsonWithStatus<T> for Json<T> {
    fn with_status(self, status: StatusCode) -> (StatusCode, Json<T>) {
        (status, self)
    }
}

async fn handle_stats(State(state): State<Arc<AppState>>) -> Json<StatsReport> {
    Json(state.reporter.report())
}

async fn handle_stats_text(State(state): State<Arc<AppState>>) -> String {
    render_text(&state.reporter.report())
}

async fn handle_reset(State(state): State<Arc<AppState>>) -> Json<ResetResponse> {
    state.reporter.reset();
    log::info!("statistics reset via HTTP");
    Json(ResetResponse { ok: true })
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(state.reporter.health())
}

async fn handle_attribute(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    state.reporter.report().attribute(&name).ok_or_else(|| {
        Json(ErrorResponse {
            error: format!("Unknown attribute: {name}. Use / to list attributes."),
        })
        .with_status(StatusCode::NOT_FOUND)
    })
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let source = state.reporter.source_info();

    Json(serde_json::json!({
        "name": "S0ix Residency Server",
        "version": s0ix_core::VERSION,
        "source": source,
        "endpoints": {
            "/": "This API index",
            "/stats": "Residency statistics, sleep state and sampler health (JSON)",
            "/stats.txt": "Plain-text summary",
            "/reset": {
                "method": "POST",
                "description": "Clear cumulative and rolling statistics",
            },
            "/attributes/{name}": {
                "method": "GET",
                "description": "One statistic as plain text",
                "names": ATTRIBUTES,
            },
            "/health": "Sampler health",
        },
    }))
}

/// Build the axum router.
pub fn build_router(reporter: Reporter) -> Router {
    let state = Arc::new(AppState { reporter });

    Router::new()
        .route("/", get(handle_index))
        .route("/stats", get(handle_stats))
        .route("/stats.txt", get(handle_stats_text))
        .route("/reset", post(handle_reset))
        .route("/health", get(handle_health))
        .route("/attributes/{name}", get(handle_attribute))
        .with_state(state)
}

/// Serve `reporter` on `host:port` until `shutdown` resolves.
pub async fn run_server(
    reporter: Reporter,
    host: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = build_router(reporter);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
