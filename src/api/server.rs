//! Axum HTTP server for the evaluation service
//!
//! Stateless request/response mapping: input validation, status-code
//! selection and JSON envelopes. All business logic lives in the evaluator
//! and the store; every failure becomes a JSON body with a single `error`
//! field.

use crate::error::ThemisError;
use crate::services::Evaluator;
use crate::storage::EvaluationStore;
use crate::types::{AggregateStats, EvaluationRecord, EvaluationResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Default page size for history listings
const DEFAULT_LIMIT: i64 = 50;

/// Prefix applied to raw base64 payloads before they reach the evaluator
const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EvaluationStore>,
    pub evaluator: Arc<dyn Evaluator>,
}

/// Error envelope returned for every failed request
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Response-side wrapper selecting the HTTP status for each error variant
pub struct ApiError(ThemisError);

impl From<ThemisError> for ApiError {
    fn from(err: ThemisError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ThemisError::Validation(_) => StatusCode::BAD_REQUEST,
            ThemisError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            warn!("Request failed: {}", self.0);
        }

        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

/// Build the service router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/evaluate", post(evaluate_handler))
        .route("/history", get(history_handler))
        .route("/history/:id", get(history_detail_handler))
        .route("/statistics", get(statistics_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until the process is stopped
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Evaluation API listening on http://{}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}

/// Ensure the payload is a data URL, treating bare input as raw base64 JPEG
fn ensure_data_url(image_data: String) -> String {
    if image_data.starts_with("data:") {
        image_data
    } else {
        format!("{}{}", JPEG_DATA_URL_PREFIX, image_data)
    }
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    #[serde(default)]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub image_data: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    #[serde(flatten)]
    pub result: EvaluationResult,
    pub evaluation_id: i64,
}

/// `POST /evaluate` — grade one alt text and persist the outcome
pub async fn evaluate_handler(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, ApiError> {
    let alt_text = match request.alt_text.as_deref() {
        Some(text) if !text.is_empty() => text,
        _ => return Err(ThemisError::Validation("alt_text is required".to_string()).into()),
    };
    let image_data = match request.image_data {
        Some(data) if !data.is_empty() => ensure_data_url(data),
        _ => return Err(ThemisError::Validation("image_data is required".to_string()).into()),
    };

    let result = state.evaluator.evaluate(alt_text, &image_data).await?;

    // Nothing is persisted on evaluator failure; the save happens only here
    let evaluation_id = state.store.save(alt_text, &result, Some(&image_data)).await?;

    Ok(Json(EvaluateResponse { result, evaluation_id }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<EvaluationRecord>,
    /// Length of the returned page, not the table total
    pub count: usize,
}

/// `GET /history` — most recent evaluations first
pub async fn history_handler(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let history = state.store.list_history(limit, offset).await?;
    let count = history.len();

    Ok(Json(HistoryResponse { history, count }))
}

/// `GET /history/{id}` — point lookup
pub async fn history_detail_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<EvaluationRecord>, ApiError> {
    match state.store.get_by_id(id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(ThemisError::NotFound(id).into()),
    }
}

/// `GET /statistics` — grouped counts over the whole table
pub async fn statistics_handler(
    State(state): State<AppState>,
) -> Result<Json<AggregateStats>, ApiError> {
    Ok(Json(state.store.statistics().await?))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// `GET /health` — liveness probe; touches neither store nor evaluator
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}
