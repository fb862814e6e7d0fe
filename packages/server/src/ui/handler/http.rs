//! HTTP API endpoint handlers.
//!
//! Reads serve the client's bootstrap, refresh and polling fallback. The
//! write endpoints stand in for the ingestion pipeline and admin tooling and
//! trigger the corresponding broadcasts.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use slalom_live_shared::protocol::{
    EventStatus, FullStatePayload, OnCourseRecord, ResultRecord, RunDetail,
};

use crate::{
    domain::EventId,
    infrastructure::RoomSummary,
    ui::state::AppState,
    usecase::{IngestSummary, LiveDataError},
};

/// Error response with a JSON body `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<LiveDataError> for ApiError {
    fn from(e: LiveDataError) -> Self {
        match e {
            LiveDataError::EventNotFound(_) | LiveDataError::RaceNotFound { .. } => {
                Self::not_found(e.to_string())
            }
            LiveDataError::Repository(_) => {
                tracing::error!("Repository failure: {}", e);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: e.to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({"error": self.message}))).into_response()
    }
}

fn parse_event_id(raw: String) -> Result<EventId, ApiError> {
    EventId::try_from(raw).map_err(|e| ApiError::not_found(e.to_string()))
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Debug endpoint listing the live rooms and their connections
pub async fn debug_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummary>> {
    Json(state.registry.summaries().await)
}

// ========================================
// Reads
// ========================================

/// `GET /api/v1/events/{event_id}`
pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> Result<Json<FullStatePayload>, ApiError> {
    let event_id = parse_event_id(event_id)?;
    Ok(Json(state.get_live_data_usecase.full_state(&event_id).await?))
}

/// `GET /api/v1/events/{event_id}/races/{race_id}/results`
pub async fn get_race_results(
    State(state): State<Arc<AppState>>,
    Path((event_id, race_id)): Path<(String, String)>,
) -> Result<Json<Vec<ResultRecord>>, ApiError> {
    let event_id = parse_event_id(event_id)?;
    Ok(Json(
        state
            .get_live_data_usecase
            .race_results(&event_id, &race_id)
            .await?,
    ))
}

/// `GET /api/v1/events/{event_id}/oncourse`
pub async fn get_oncourse(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> Result<Json<Vec<OnCourseRecord>>, ApiError> {
    let event_id = parse_event_id(event_id)?;
    Ok(Json(state.get_live_data_usecase.oncourse(&event_id).await?))
}

/// `GET /api/v1/events/{event_id}/races/{race_id}/results/{bib}`
pub async fn get_run_detail(
    State(state): State<Arc<AppState>>,
    Path((event_id, race_id, bib)): Path<(String, String, u32)>,
) -> Result<Json<RunDetail>, ApiError> {
    let event_id = parse_event_id(event_id)?;
    state
        .get_live_data_usecase
        .run_detail(&event_id, &race_id, bib)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no run detail for bib {} in '{}'", bib, race_id)))
}

// ========================================
// Collaborator triggers
// ========================================

/// `POST /api/v1/events/{event_id}/oncourse`
pub async fn ingest_oncourse(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(records): Json<Vec<OnCourseRecord>>,
) -> Result<Json<IngestSummary>, ApiError> {
    let event_id = parse_event_id(event_id)?;
    Ok(Json(
        state
            .ingest_oncourse_usecase
            .execute(&event_id, records)
            .await?,
    ))
}

/// `PUT /api/v1/events/{event_id}/races/{race_id}/results`
pub async fn put_race_results(
    State(state): State<Arc<AppState>>,
    Path((event_id, race_id)): Path<(String, String)>,
    Json(results): Json<Vec<ResultRecord>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let event_id = parse_event_id(event_id)?;
    let delivered = state
        .ingest_results_usecase
        .execute(&event_id, &race_id, results)
        .await?;
    Ok(Json(serde_json::json!({"delivered": delivered})))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: EventStatus,
}

/// `PUT /api/v1/events/{event_id}/status`
pub async fn change_status(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Result<StatusCode, ApiError> {
    let event_id = parse_event_id(event_id)?;
    state
        .change_status_usecase
        .execute(&event_id, request.status)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /api/v1/events/{event_id}/structure`
pub async fn replace_structure(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(payload): Json<FullStatePayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let event_id = parse_event_id(event_id)?;
    let delivered = state
        .replace_structure_usecase
        .execute(&event_id, payload)
        .await?;
    Ok(Json(serde_json::json!({"delivered": delivered})))
}
