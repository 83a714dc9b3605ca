use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::errors::AppError;
use crate::AppState;

#[derive(Deserialize)]
pub struct CheckSinglePayload {
    pub signal_id: Uuid,
}

#[derive(Deserialize)]
pub struct SendWarningsPayload {
    pub minutes_before: i64,
}

pub async fn check_single(
    State(state): State<AppState>,
    Json(payload): Json<CheckSinglePayload>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let job_id = state
        .tasks
        .queue_expiration_check(payload.signal_id)
        .await
        .map_err(AppError::Internal)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Expiration check queued", "job_id": job_id })),
    ))
}

pub async fn check_all(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let job_id = state
        .tasks
        .queue_batch_expiration_check()
        .await
        .map_err(AppError::Internal)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Batch expiration check queued", "job_id": job_id })),
    ))
}

pub async fn check_grace_periods(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let job_id = state
        .tasks
        .queue_grace_period_check()
        .await
        .map_err(AppError::Internal)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Grace period check queued", "job_id": job_id })),
    ))
}

pub async fn send_warnings(
    State(state): State<AppState>,
    Json(payload): Json<SendWarningsPayload>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if !(5..=1440).contains(&payload.minutes_before) {
        return Err(AppError::Validation(
            "minutes_before must be between 5 and 1440".into(),
        ));
    }

    let job_id = state
        .tasks
        .queue_expiration_warnings(payload.minutes_before)
        .await
        .map_err(AppError::Internal)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Expiration warnings job queued",
            "job_id": job_id,
            "minutes_before": payload.minutes_before,
        })),
    ))
}

pub async fn status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Json<serde_json::Value> {
    match state.tasks.job(job_id) {
        Some(record) => Json(json!({ "found": true, "job": record })),
        None => Json(json!({ "found": false })),
    }
}
