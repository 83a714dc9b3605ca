use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "signal_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    Active,
    Expired,
    Closed,
    Cancelled,
}

/// Terminal cause recorded on a signal; set only when it leaves ACTIVE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "signal_outcome", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalOutcome {
    Expired,
    Cancelled,
    TargetHit,
    StopLossHit,
}

impl fmt::Display for SignalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalOutcome::Expired => write!(f, "EXPIRED"),
            SignalOutcome::Cancelled => write!(f, "CANCELLED"),
            SignalOutcome::TargetHit => write!(f, "TARGET_HIT"),
            SignalOutcome::StopLossHit => write!(f, "STOP_LOSS_HIT"),
        }
    }
}

/// A time-bounded trade recommendation published by a provider.
///
/// Mutated only by the signal transition service; `grace_period_ends_at`
/// is non-null only while `status == Expired`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Signal {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub base_asset: String,
    pub counter_asset: String,
    pub status: SignalStatus,
    pub outcome: Option<SignalOutcome>,
    pub expires_at: DateTime<Utc>,
    pub grace_period_ends_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub copiers_count: i32,
    pub created_at: DateTime<Utc>,
}

impl Signal {
    /// "BTC/USDT" style pair label used in notification text.
    pub fn pair(&self) -> String {
        format!("{}/{}", self.base_asset, self.counter_asset)
    }
}
