use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::ExpirationNotification;
use crate::AppState;

#[derive(Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ExpirationNotification>>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 100);
    let offset = params.offset.unwrap_or(0).max(0);

    let notifications = state
        .notifications
        .list_for_user(user_id, limit, offset)
        .await?;
    Ok(Json(notifications))
}

pub async fn unread(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<ExpirationNotification>>, AppError> {
    let notifications = state.notifications.unread(user_id).await?;
    Ok(Json(notifications))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<ExpirationNotification>, AppError> {
    let notification = state.notifications.mark_read(notification_id).await?;
    Ok(Json(notification))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let updated = state.notifications.mark_all_read(user_id).await?;
    Ok(Json(json!({ "updated": updated })))
}
