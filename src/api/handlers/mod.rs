use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::error::QueueError;
use crate::models::*;
use crate::queue::QueueSnapshot;

type ApiResult<T> = Result<T, (StatusCode, String)>;

// ============================================================
// Error Handling
// ============================================================

/// Map a queue error to a response.
///
/// Validation, precondition and not-found errors describe the caller's request
/// and are returned as-is. Store failures are logged in full server-side and the
/// client only sees a generic message, to avoid leaking internal details.
fn queue_error(e: QueueError) -> (StatusCode, String) {
    match e {
        QueueError::Validation(_) => {
            tracing::warn!("Validation error: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        QueueError::Precondition { .. } => (StatusCode::CONFLICT, e.to_string()),
        QueueError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        QueueError::Store(ref inner) => {
            tracing::error!("Internal error: {:#}", inner);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Queue view
// ============================================================

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    /// How many recent log entries to include. Defaults to [`DEFAULT_LOG_WINDOW`].
    pub log_limit: Option<usize>,
}

pub async fn get_snapshot(
    State(queue): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> ApiResult<Json<QueueSnapshot>> {
    queue
        .snapshot(query.log_limit.unwrap_or(DEFAULT_LOG_WINDOW))
        .map(Json)
        .map_err(queue_error)
}

pub async fn compact_queue(State(queue): State<AppState>) -> ApiResult<impl IntoResponse> {
    let rewritten = queue.compact().map_err(queue_error)?;
    Ok(Json(serde_json::json!({ "rewritten": rewritten })))
}

// ============================================================
// Features
// ============================================================

/// Query parameters for listing features.
#[derive(Debug, Deserialize)]
pub struct ListFeaturesQuery {
    /// Only return features with this status.
    pub status: Option<FeatureStatus>,
}

pub async fn list_features(
    State(queue): State<AppState>,
    Query(query): Query<ListFeaturesQuery>,
) -> ApiResult<Json<Vec<Feature>>> {
    queue.list(query.status).map(Json).map_err(queue_error)
}

pub async fn get_feature(
    State(queue): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Feature>> {
    queue.get(id).map(Json).map_err(queue_error)
}

pub async fn create_feature(
    State(queue): State<AppState>,
    Json(input): Json<CreateFeatureInput>,
) -> ApiResult<(StatusCode, Json<Feature>)> {
    queue
        .create(input)
        .map(|f| (StatusCode::CREATED, Json(f)))
        .map_err(queue_error)
}

#[derive(Debug, Deserialize)]
pub struct ImportQuery {
    #[serde(default)]
    pub placement: Placement,
}

/// Create features from a plain-text body in the `NAME:` / `---` format.
pub async fn import_features(
    State(queue): State<AppState>,
    Query(query): Query<ImportQuery>,
    body: String,
) -> ApiResult<(StatusCode, Json<Vec<Feature>>)> {
    queue
        .import(&body, query.placement)
        .map(|f| (StatusCode::CREATED, Json(f)))
        .map_err(queue_error)
}

pub async fn delete_feature(
    State(queue): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    queue
        .delete(id)
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(queue_error)
}

// ============================================================
// Operator transitions
// ============================================================

pub async fn skip_feature(
    State(queue): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Feature>> {
    queue.skip(id).map(Json).map_err(queue_error)
}

pub async fn retry_feature(
    State(queue): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Feature>> {
    queue.retry(id).map(Json).map_err(queue_error)
}

pub async fn complete_feature(
    State(queue): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Feature>> {
    queue.complete(id).map(Json).map_err(queue_error)
}

pub async fn requeue_feature(
    State(queue): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Feature>> {
    queue.requeue(id).map(Json).map_err(queue_error)
}

// ============================================================
// Reordering
// ============================================================

pub async fn move_feature_to_top(
    State(queue): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Feature>> {
    queue.move_to_top(id).map(Json).map_err(queue_error)
}

pub async fn move_feature_up(
    State(queue): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Feature>> {
    queue.move_up(id).map(Json).map_err(queue_error)
}

// ============================================================
// Worker
// ============================================================

/// Claim the next feature. `204 No Content` when there is nothing to claim.
pub async fn claim_feature(State(queue): State<AppState>) -> ApiResult<axum::response::Response> {
    match queue.claim_next().map_err(queue_error)? {
        Some(feature) => Ok(Json(feature).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

pub async fn succeed_feature(
    State(queue): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Feature>> {
    queue.succeed(id).map(Json).map_err(queue_error)
}

pub async fn fail_feature(
    State(queue): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<FailFeatureInput>,
) -> ApiResult<Json<Feature>> {
    queue
        .fail(id, input.error_message)
        .map(Json)
        .map_err(queue_error)
}

// ============================================================
// Engine control plane
// ============================================================

pub async fn get_config(State(queue): State<AppState>) -> ApiResult<Json<EngineConfig>> {
    queue.config().map(Json).map_err(queue_error)
}

pub async fn update_config(
    State(queue): State<AppState>,
    Json(input): Json<UpdateConfigInput>,
) -> ApiResult<Json<EngineConfig>> {
    queue.update_config(input).map(Json).map_err(queue_error)
}

pub async fn get_engine_status(State(queue): State<AppState>) -> ApiResult<Json<EngineStatus>> {
    queue.engine_status().map(Json).map_err(queue_error)
}

pub async fn pause_engine(State(queue): State<AppState>) -> ApiResult<Json<EngineConfig>> {
    queue.set_paused(true).map(Json).map_err(queue_error)
}

pub async fn resume_engine(State(queue): State<AppState>) -> ApiResult<Json<EngineConfig>> {
    queue.set_paused(false).map(Json).map_err(queue_error)
}

// ============================================================
// Logs
// ============================================================

#[derive(Debug, Deserialize)]
pub struct ListLogsQuery {
    pub limit: Option<usize>,
}

pub async fn list_logs(
    State(queue): State<AppState>,
    Query(query): Query<ListLogsQuery>,
) -> ApiResult<Json<Vec<LogEntry>>> {
    queue
        .logs(query.limit.unwrap_or(DEFAULT_LOG_WINDOW))
        .map(Json)
        .map_err(queue_error)
}

pub async fn append_log(
    State(queue): State<AppState>,
    Json(input): Json<CreateLogInput>,
) -> ApiResult<(StatusCode, Json<LogEntry>)> {
    queue
        .append_log(input)
        .map(|entry| (StatusCode::CREATED, Json(entry)))
        .map_err(queue_error)
}
