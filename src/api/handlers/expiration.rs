use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{ExpirationCheck, ExpirationOutcome, ExpirationSummary};
use crate::errors::AppError;
use crate::models::Signal;
use crate::AppState;

#[derive(Serialize)]
pub struct SignalBrief {
    pub id: Uuid,
    pub base_asset: String,
    pub counter_asset: String,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_period_ends_at: Option<DateTime<Utc>>,
    pub copiers_count: i32,
}

impl From<&Signal> for SignalBrief {
    fn from(s: &Signal) -> Self {
        Self {
            id: s.id,
            base_asset: s.base_asset.clone(),
            counter_asset: s.counter_asset.clone(),
            expires_at: s.expires_at,
            grace_period_ends_at: s.grace_period_ends_at,
            copiers_count: s.copiers_count,
        }
    }
}

#[derive(Serialize)]
pub struct SignalListResponse {
    pub count: usize,
    pub signals: Vec<SignalBrief>,
}

fn list_response(signals: Vec<Signal>) -> SignalListResponse {
    SignalListResponse {
        count: signals.len(),
        signals: signals.iter().map(SignalBrief::from).collect(),
    }
}

pub async fn summary(
    State(state): State<AppState>,
) -> Result<Json<ExpirationSummary>, AppError> {
    let summary = state.queries.expiration_summary(Utc::now()).await?;
    Ok(Json(summary))
}

pub async fn check(
    State(state): State<AppState>,
    Path(signal_id): Path<Uuid>,
) -> Result<Json<ExpirationCheck>, AppError> {
    let check = state.queries.check_expiration(signal_id, Utc::now()).await?;
    Ok(Json(check))
}

pub async fn expired(
    State(state): State<AppState>,
) -> Result<Json<SignalListResponse>, AppError> {
    let signals = state.queries.find_expired(Utc::now()).await?;
    Ok(Json(list_response(signals)))
}

pub async fn grace_period(
    State(state): State<AppState>,
) -> Result<Json<SignalListResponse>, AppError> {
    let signals = state.queries.find_in_grace_period(Utc::now()).await?;
    Ok(Json(list_response(signals)))
}

pub async fn approaching(
    State(state): State<AppState>,
    Path(minutes): Path<i64>,
) -> Result<Json<SignalListResponse>, AppError> {
    if minutes <= 0 {
        return Err(AppError::BadRequest("minutes must be positive".into()));
    }
    let signals = state.queries.find_approaching(minutes, Utc::now()).await?;
    Ok(Json(list_response(signals)))
}

#[derive(Deserialize)]
pub struct CancelSignalPayload {
    pub signal_id: Uuid,
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct CancelSignalResponse {
    pub message: String,
    pub result: ExpirationOutcome,
}

/// Provider-initiated cancel: flips the signal and closes every open
/// position inline, ignoring per-user preferences.
pub async fn cancel(
    State(state): State<AppState>,
    Json(payload): Json<CancelSignalPayload>,
) -> Result<(StatusCode, Json<CancelSignalResponse>), AppError> {
    let signal = state.transitions.cancel(payload.signal_id).await?;
    let result = state.orchestrator.handle_cancellation(&signal).await?;

    tracing::info!(
        signal_id = %payload.signal_id,
        positions_closed = result.positions_closed,
        reason = payload.reason.as_deref().unwrap_or("unspecified"),
        "Signal cancelled via API"
    );

    Ok((
        StatusCode::OK,
        Json(CancelSignalResponse {
            message: "Signal cancelled successfully".into(),
            result,
        }),
    ))
}
