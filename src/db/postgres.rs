use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    CopiedPosition, ExpirationNotification, NotificationStatus, PositionStatus, Signal,
    SignalOutcome, SignalStatus, UserExpirationPreference,
};
use crate::store::ExpirationStore;

/// Postgres-backed store. All queries are single-table filter/range
/// lookups or single-record updates; no cross-entity transactions.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExpirationStore for PgStore {
    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_signal(&self, id: Uuid) -> anyhow::Result<Option<Signal>> {
        let signal = sqlx::query_as::<_, Signal>("SELECT * FROM signals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(signal)
    }

    async fn find_expired_signals(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Signal>> {
        let signals = sqlx::query_as::<_, Signal>(
            "SELECT * FROM signals WHERE status = $1 AND expires_at <= $2 ORDER BY expires_at",
        )
        .bind(SignalStatus::Active)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(signals)
    }

    async fn find_signals_in_grace_period(
        &self,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Signal>> {
        let signals = sqlx::query_as::<_, Signal>(
            r#"
            SELECT * FROM signals
            WHERE status = $1 AND outcome = $2 AND grace_period_ends_at <= $3
            ORDER BY grace_period_ends_at
            "#,
        )
        .bind(SignalStatus::Expired)
        .bind(SignalOutcome::Expired)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(signals)
    }

    async fn find_signals_approaching(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Signal>> {
        let signals = sqlx::query_as::<_, Signal>(
            r#"
            SELECT * FROM signals
            WHERE status = $1 AND expires_at > $2 AND expires_at <= $3
            ORDER BY expires_at
            "#,
        )
        .bind(SignalStatus::Active)
        .bind(now)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;
        Ok(signals)
    }

    async fn update_signal(&self, signal: &Signal) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE signals
            SET status = $2, outcome = $3, grace_period_ends_at = $4, closed_at = $5
            WHERE id = $1
            "#,
        )
        .bind(signal.id)
        .bind(signal.status)
        .bind(signal.outcome)
        .bind(signal.grace_period_ends_at)
        .bind(signal.closed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn open_positions_for_signal(
        &self,
        signal_id: Uuid,
    ) -> anyhow::Result<Vec<CopiedPosition>> {
        let positions = sqlx::query_as::<_, CopiedPosition>(
            "SELECT * FROM copied_positions WHERE signal_id = $1 AND status = $2 ORDER BY opened_at",
        )
        .bind(signal_id)
        .bind(PositionStatus::Open)
        .fetch_all(&self.pool)
        .await?;
        Ok(positions)
    }

    async fn open_positions_for_users(
        &self,
        user_ids: &[Uuid],
    ) -> anyhow::Result<Vec<CopiedPosition>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let positions = sqlx::query_as::<_, CopiedPosition>(
            "SELECT * FROM copied_positions WHERE user_id = ANY($1) AND status = $2 ORDER BY opened_at",
        )
        .bind(user_ids)
        .bind(PositionStatus::Open)
        .fetch_all(&self.pool)
        .await?;
        Ok(positions)
    }

    async fn count_open_positions(&self, signal_id: Uuid) -> anyhow::Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM copied_positions WHERE signal_id = $1 AND status = $2",
        )
        .bind(signal_id)
        .bind(PositionStatus::Open)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn update_position(&self, position: &CopiedPosition) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE copied_positions
            SET status = $2, auto_close_reason = $3, closed_at = $4
            WHERE id = $1
            "#,
        )
        .bind(position.id)
        .bind(position.status)
        .bind(position.auto_close_reason)
        .bind(position.closed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_preference(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Option<UserExpirationPreference>> {
        let preference = sqlx::query_as::<_, UserExpirationPreference>(
            "SELECT * FROM user_expiration_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(preference)
    }

    async fn save_preference(
        &self,
        preference: &UserExpirationPreference,
    ) -> anyhow::Result<UserExpirationPreference> {
        let saved = sqlx::query_as::<_, UserExpirationPreference>(
            r#"
            INSERT INTO user_expiration_preferences
                (id, user_id, default_action, grace_period_minutes,
                 notify_before_expiration_minutes, notify_on_auto_close,
                 notify_on_grace_period_start, auto_close_at_loss_threshold,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO UPDATE
                SET default_action = $3,
                    grace_period_minutes = $4,
                    notify_before_expiration_minutes = $5,
                    notify_on_auto_close = $6,
                    notify_on_grace_period_start = $7,
                    auto_close_at_loss_threshold = $8,
                    updated_at = $10
            RETURNING *
            "#,
        )
        .bind(preference.id)
        .bind(preference.user_id)
        .bind(preference.default_action)
        .bind(preference.grace_period_minutes)
        .bind(preference.notify_before_expiration_minutes)
        .bind(preference.notify_on_auto_close)
        .bind(preference.notify_on_grace_period_start)
        .bind(preference.auto_close_at_loss_threshold)
        .bind(preference.created_at)
        .bind(preference.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }

    async fn insert_notification(
        &self,
        notification: &ExpirationNotification,
    ) -> anyhow::Result<Option<ExpirationNotification>> {
        // Dedupe is enforced by the unique index on dedupe_key.
        let inserted = sqlx::query_as::<_, ExpirationNotification>(
            r#"
            INSERT INTO expiration_notifications
                (id, user_id, signal_id, position_id, kind, status, channel,
                 title, message, payload, dedupe_key, sent_at, read_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (dedupe_key) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.signal_id)
        .bind(notification.position_id)
        .bind(notification.kind)
        .bind(notification.status)
        .bind(notification.channel)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.payload)
        .bind(&notification.dedupe_key)
        .bind(notification.sent_at)
        .bind(notification.read_at)
        .bind(notification.created_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn update_notification(
        &self,
        notification: &ExpirationNotification,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE expiration_notifications SET status = $2, sent_at = $3, read_at = $4 WHERE id = $1",
        )
        .bind(notification.id)
        .bind(notification.status)
        .bind(notification.sent_at)
        .bind(notification.read_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_notification(
        &self,
        id: Uuid,
    ) -> anyhow::Result<Option<ExpirationNotification>> {
        let notification = sqlx::query_as::<_, ExpirationNotification>(
            "SELECT * FROM expiration_notifications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(notification)
    }

    async fn notifications_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<ExpirationNotification>> {
        let notifications = sqlx::query_as::<_, ExpirationNotification>(
            r#"
            SELECT * FROM expiration_notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }

    async fn unread_notifications(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Vec<ExpirationNotification>> {
        let notifications = sqlx::query_as::<_, ExpirationNotification>(
            r#"
            SELECT * FROM expiration_notifications
            WHERE user_id = $1 AND status = $2 AND read_at IS NULL
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(NotificationStatus::Sent)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }

    async fn mark_all_read(&self, user_id: Uuid, now: DateTime<Utc>) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE expiration_notifications SET status = $3, read_at = $2 WHERE user_id = $1 AND status = $4",
        )
        .bind(user_id)
        .bind(now)
        .bind(NotificationStatus::Read)
        .bind(NotificationStatus::Sent)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
