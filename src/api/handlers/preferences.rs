use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::preference::{MAX_GRACE_PERIOD_MINUTES, MIN_GRACE_PERIOD_MINUTES};
use crate::models::{ExpirationAction, UserExpirationPreference};
use crate::AppState;

/// Materializes the default preference on first read.
pub async fn get_preference(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserExpirationPreference>, AppError> {
    let preference = state.orchestrator.get_or_create_preference(user_id).await?;
    Ok(Json(preference))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePreferencePayload {
    pub default_action: Option<ExpirationAction>,
    pub grace_period_minutes: Option<i32>,
    pub notify_before_expiration_minutes: Option<i32>,
    pub notify_on_auto_close: Option<bool>,
    pub notify_on_grace_period_start: Option<bool>,
    pub auto_close_at_loss_threshold: Option<Decimal>,
}

fn validate(payload: &UpdatePreferencePayload) -> Result<(), AppError> {
    if let Some(minutes) = payload.grace_period_minutes {
        if !(MIN_GRACE_PERIOD_MINUTES..=MAX_GRACE_PERIOD_MINUTES).contains(&minutes) {
            return Err(AppError::Validation(format!(
                "grace_period_minutes must be between {MIN_GRACE_PERIOD_MINUTES} and {MAX_GRACE_PERIOD_MINUTES}"
            )));
        }
    }
    if let Some(minutes) = payload.notify_before_expiration_minutes {
        if !(MIN_GRACE_PERIOD_MINUTES..=MAX_GRACE_PERIOD_MINUTES).contains(&minutes) {
            return Err(AppError::Validation(format!(
                "notify_before_expiration_minutes must be between {MIN_GRACE_PERIOD_MINUTES} and {MAX_GRACE_PERIOD_MINUTES}"
            )));
        }
    }
    if let Some(threshold) = payload.auto_close_at_loss_threshold {
        if threshold < Decimal::from(-100) || threshold > Decimal::ZERO {
            return Err(AppError::Validation(
                "auto_close_at_loss_threshold must be between -100 and 0".into(),
            ));
        }
    }
    Ok(())
}

/// Partial update; rejected before persistence when out of range.
pub async fn update_preference(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdatePreferencePayload>,
) -> Result<Json<UserExpirationPreference>, AppError> {
    validate(&payload)?;

    let mut preference = state.orchestrator.get_or_create_preference(user_id).await?;

    if let Some(action) = payload.default_action {
        preference.default_action = action;
    }
    if let Some(minutes) = payload.grace_period_minutes {
        preference.grace_period_minutes = minutes;
    }
    if let Some(minutes) = payload.notify_before_expiration_minutes {
        preference.notify_before_expiration_minutes = minutes;
    }
    if let Some(flag) = payload.notify_on_auto_close {
        preference.notify_on_auto_close = flag;
    }
    if let Some(flag) = payload.notify_on_grace_period_start {
        preference.notify_on_grace_period_start = flag;
    }
    if let Some(threshold) = payload.auto_close_at_loss_threshold {
        preference.auto_close_at_loss_threshold = Some(threshold);
    }
    preference.updated_at = Utc::now();

    let saved = state.store.save_preference(&preference).await?;
    Ok(Json(saved))
}
