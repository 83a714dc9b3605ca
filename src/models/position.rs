use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "position_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Open,
    Closed,
    AutoClosed,
    ManuallyClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "auto_close_reason", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutoCloseReason {
    SignalExpired,
    SignalCancelled,
    TargetHit,
    StopLossHit,
    GracePeriodEnded,
    UserManual,
}

impl AutoCloseReason {
    /// Human-readable clause used in notification messages.
    pub fn describe(&self) -> &'static str {
        match self {
            AutoCloseReason::SignalExpired => "signal expiration",
            AutoCloseReason::SignalCancelled => "signal cancellation by provider",
            AutoCloseReason::TargetHit => "target price reached",
            AutoCloseReason::StopLossHit => "stop loss triggered",
            AutoCloseReason::GracePeriodEnded => "grace period ending",
            AutoCloseReason::UserManual => "your request",
        }
    }
}

impl fmt::Display for AutoCloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutoCloseReason::SignalExpired => write!(f, "SIGNAL_EXPIRED"),
            AutoCloseReason::SignalCancelled => write!(f, "SIGNAL_CANCELLED"),
            AutoCloseReason::TargetHit => write!(f, "TARGET_HIT"),
            AutoCloseReason::StopLossHit => write!(f, "STOP_LOSS_HIT"),
            AutoCloseReason::GracePeriodEnded => write!(f, "GRACE_PERIOD_ENDED"),
            AutoCloseReason::UserManual => write!(f, "USER_MANUAL"),
        }
    }
}

/// A user's stake copying a signal.
///
/// Created by the external trade-execution flow; the engine only ever
/// moves it out of OPEN. Price/volume/PnL fields are owned by the trade
/// module and read-only here. Once status != OPEN the position is
/// terminal and re-processing must no-op.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CopiedPosition {
    pub id: Uuid,
    pub signal_id: Uuid,
    pub user_id: Uuid,
    pub status: PositionStatus,
    pub auto_close_reason: Option<AutoCloseReason>,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    pub volume: Decimal,
    pub pnl_absolute: Option<Decimal>,
    pub pnl_percentage: Option<Decimal>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl CopiedPosition {
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }
}
