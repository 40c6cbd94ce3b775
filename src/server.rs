//! HTTP surface: live departures and delay analytics as JSON.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use railvision::analytics::Analytics;
use railvision::analytics::types::{HourlyDelay, LineDelay, WorstLine};
use railvision::departure::NormalizedDeparture;
use railvision::error::{StoreError, UpstreamError};
use railvision::ingest::IngestPipeline;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<IngestPipeline>,
    analytics: Arc<Analytics>,
}

impl AppState {
    pub fn new(pipeline: Arc<IngestPipeline>, analytics: Arc<Analytics>) -> Self {
        Self {
            pipeline,
            analytics,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AnalyticsQuery {
    stop_id: Option<String>,
}

enum ApiError {
    Upstream(UpstreamError),
    Store(StoreError),
}

impl From<UpstreamError> for ApiError {
    fn from(e: UpstreamError) -> Self {
        ApiError::Upstream(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Upstream(e) => {
                warn!(error = %e, "Upstream request failed");
                (StatusCode::BAD_GATEWAY, e.payload())
            }
            ApiError::Store(e) => {
                error!(error = %e, "Analytics query failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/departures/:stop_id", get(departures))
        .route("/departures/live/:stop_id", get(live_departures))
        .route("/analytics/delays/by-line", get(delays_by_line))
        .route("/analytics/worst-lines", get(worst_lines))
        .route("/analytics/delays/by-hour", get(delays_by_hour))
        .with_state(state)
}

pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "RailVision API is running" }))
}

/// Ingests the stop and returns what was fetched, stored or not.
async fn departures(
    State(state): State<AppState>,
    Path(stop_id): Path<String>,
) -> Result<Json<Vec<NormalizedDeparture>>, ApiError> {
    let report = state.pipeline.run_cycle(&stop_id).await?;
    Ok(Json(report.departures))
}

async fn live_departures(
    State(state): State<AppState>,
    Path(stop_id): Path<String>,
) -> Result<Json<Vec<NormalizedDeparture>>, ApiError> {
    Ok(Json(state.pipeline.live(&stop_id).await?))
}

async fn delays_by_line(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Vec<LineDelay>>, ApiError> {
    Ok(Json(state.analytics.by_line(query.stop_id.as_deref()).await?))
}

async fn worst_lines(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Vec<WorstLine>>, ApiError> {
    Ok(Json(state.analytics.worst_lines(query.stop_id.as_deref()).await?))
}

async fn delays_by_hour(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Vec<HourlyDelay>>, ApiError> {
    Ok(Json(state.analytics.by_hour(query.stop_id.as_deref()).await?))
}
