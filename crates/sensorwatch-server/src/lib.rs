//! Read-only HTTP view of the sample window.
//!
//! Handlers take a snapshot exactly like the render loop does: copy under the
//! lock, release, then serialize the copy.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use serde::{Deserialize, Serialize};

use sensorwatch_core::{IngestStats, Sample, SampleWindow, StatsSnapshot, WindowSnapshot};

/// Shared server state.
pub struct AppState {
    window: Arc<SampleWindow>,
    stats: Arc<IngestStats>,
    topic: String,
}

impl AppState {
    pub fn new(window: Arc<SampleWindow>, stats: Arc<IngestStats>, topic: impl Into<String>) -> Self {
        Self {
            window,
            stats,
            topic: topic.into(),
        }
    }
}

#[derive(Deserialize)]
struct SamplesParams {
    /// Return only the newest N samples.
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SamplesResponse {
    topic: String,
    capacity: usize,
    count: usize,
    #[serde(flatten)]
    series: WindowSnapshot,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    samples: usize,
    capacity: usize,
    ingest: StatsSnapshot,
}

#[derive(Serialize)]
struct LatestResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    sample: Option<Sample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn handle_samples(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SamplesParams>,
) -> Json<SamplesResponse> {
    let mut series = state.window.snapshot();
    if let Some(limit) = params.limit {
        series = series.tail(limit);
    }
    Json(SamplesResponse {
        topic: state.topic.clone(),
        capacity: state.window.capacity(),
        count: series.len(),
        series,
    })
}

async fn handle_latest(State(state): State<Arc<AppState>>) -> (StatusCode, Json<LatestResponse>) {
    match state.window.latest() {
        Some(sample) => (
            StatusCode::OK,
            Json(LatestResponse {
                sample: Some(sample),
                error: None,
            }),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(LatestResponse {
                sample: None,
                error: Some("waiting for the first sensor reading".to_string()),
            }),
        ),
    }
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let samples = state.window.len();
    Json(HealthResponse {
        status: if samples > 0 {
            "receiving".to_string()
        } else {
            "waiting".to_string()
        },
        samples,
        capacity: state.window.capacity(),
        ingest: state.stats.snapshot(),
    })
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "sensorwatch",
        "version": sensorwatch_core::VERSION,
        "topic": state.topic,
        "endpoints": {
            "/": "This API index",
            "/health": "Window fill and ingest counters",
            "/api/v1/samples": {
                "method": "GET",
                "description": "Current window as aligned timestamp/temperature/humidity arrays",
                "params": {
                    "limit": "Return only the newest N samples",
                }
            },
            "/api/v1/latest": "Most recent sample (404 while waiting for data)",
        },
    }))
}

/// Build the axum router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/api/v1/samples", get(handle_samples))
        .route("/api/v1/latest", get(handle_latest))
        .with_state(Arc::new(state))
}

/// Serve until `shutdown` resolves.
pub async fn run_server<F>(state: AppState, host: &str, port: u16, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("HTTP server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
