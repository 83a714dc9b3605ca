use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const DEFAULT_GRACE_PERIOD_MINUTES: i32 = 30;
pub const DEFAULT_NOTIFY_BEFORE_MINUTES: i32 = 60;
pub const MIN_GRACE_PERIOD_MINUTES: i32 = 5;
pub const MAX_GRACE_PERIOD_MINUTES: i32 = 1440;

/// Per-user policy governing an open position when its signal expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "expiration_action", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpirationAction {
    AutoClose,
    NotifyOnly,
    ExtendGracePeriod,
    DoNothing,
}

/// One record per user, created lazily with defaults on first access.
///
/// `auto_close_at_loss_threshold` is stored and validated but not read
/// by the orchestrator; it is reserved for a PnL-aware close path.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserExpirationPreference {
    pub id: Uuid,
    pub user_id: Uuid,
    pub default_action: ExpirationAction,
    pub grace_period_minutes: i32,
    pub notify_before_expiration_minutes: i32,
    pub notify_on_auto_close: bool,
    pub notify_on_grace_period_start: bool,
    pub auto_close_at_loss_threshold: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserExpirationPreference {
    /// The documented default policy, materialized on first access.
    pub fn defaults_for(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            default_action: ExpirationAction::NotifyOnly,
            grace_period_minutes: DEFAULT_GRACE_PERIOD_MINUTES,
            notify_before_expiration_minutes: DEFAULT_NOTIFY_BEFORE_MINUTES,
            notify_on_auto_close: true,
            notify_on_grace_period_start: true,
            auto_close_at_loss_threshold: None,
            created_at: now,
            updated_at: now,
        }
    }
}
