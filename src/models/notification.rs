use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    ExpirationWarning,
    GracePeriodStarted,
    PositionAutoClosed,
    SignalCancelled,
    SignalExpired,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::ExpirationWarning => write!(f, "EXPIRATION_WARNING"),
            NotificationKind::GracePeriodStarted => write!(f, "GRACE_PERIOD_STARTED"),
            NotificationKind::PositionAutoClosed => write!(f, "POSITION_AUTO_CLOSED"),
            NotificationKind::SignalCancelled => write!(f, "SIGNAL_CANCELLED"),
            NotificationKind::SignalExpired => write!(f, "SIGNAL_EXPIRED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    Read,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_channel", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationChannel {
    InApp,
    Email,
    Push,
    Webhook,
}

/// Immutable-after-send record of one lifecycle communication.
///
/// PENDING -> SENT | FAILED, SENT -> READ. FAILED is terminal within
/// this engine (no in-line retry). Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExpirationNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub signal_id: Option<Uuid>,
    pub position_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub status: NotificationStatus,
    pub channel: NotificationChannel,
    pub title: String,
    pub message: String,
    pub payload: serde_json::Value,
    pub dedupe_key: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ExpirationNotification {
    pub fn new(
        user_id: Uuid,
        signal_id: Option<Uuid>,
        position_id: Option<Uuid>,
        kind: NotificationKind,
        channel: NotificationChannel,
        title: impl Into<String>,
        message: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        let created_at = Utc::now();
        let dedupe_key = dedupe_key(user_id, signal_id, position_id, kind, created_at);
        Self {
            id: Uuid::new_v4(),
            user_id,
            signal_id,
            position_id,
            kind,
            status: NotificationStatus::Pending,
            channel,
            title: title.into(),
            message: message.into(),
            payload,
            dedupe_key,
            sent_at: None,
            read_at: None,
            created_at,
        }
    }
}

/// Deterministic dedupe key: the same event for the same user within
/// the same hour bucket always hashes identically, so at-least-once
/// task delivery cannot create duplicate notifications.
pub fn dedupe_key(
    user_id: Uuid,
    signal_id: Option<Uuid>,
    position_id: Option<Uuid>,
    kind: NotificationKind,
    at: DateTime<Utc>,
) -> String {
    let bucket = at.timestamp() / 3600;
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(signal_id.unwrap_or(Uuid::nil()).as_bytes());
    hasher.update(position_id.unwrap_or(Uuid::nil()).as_bytes());
    hasher.update(kind.to_string().as_bytes());
    hasher.update(bucket.to_be_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_key_is_stable_within_hour_bucket() {
        let user = Uuid::new_v4();
        let signal = Some(Uuid::new_v4());
        let position = Some(Uuid::new_v4());
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        let a = dedupe_key(user, signal, position, NotificationKind::SignalExpired, at);
        let b = dedupe_key(
            user,
            signal,
            position,
            NotificationKind::SignalExpired,
            at + chrono::Duration::seconds(1),
        );

        assert_eq!(a, b);
    }

    #[test]
    fn dedupe_key_differs_across_kinds() {
        let user = Uuid::new_v4();
        let at = Utc::now();

        let a = dedupe_key(user, None, None, NotificationKind::SignalExpired, at);
        let b = dedupe_key(user, None, None, NotificationKind::SignalCancelled, at);

        assert_ne!(a, b);
    }
}
