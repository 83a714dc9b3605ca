pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{CopiedPosition, ExpirationNotification, Signal, UserExpirationPreference};

/// Narrow persistence interface consumed by the engine.
///
/// Only filter-by-field and range (`<=`, `>`) queries on
/// status/expires_at/grace_period_ends_at are issued, and every update
/// touches a single record. Production backs this with Postgres
/// ([`crate::db::PgStore`]); tests use [`memory::MemStore`].
#[async_trait]
pub trait ExpirationStore: Send + Sync {
    async fn ping(&self) -> anyhow::Result<()>;

    // --- signals ---

    async fn get_signal(&self, id: Uuid) -> anyhow::Result<Option<Signal>>;

    /// ACTIVE signals whose expires_at <= now.
    async fn find_expired_signals(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Signal>>;

    /// EXPIRED signals (outcome EXPIRED) whose grace window has elapsed.
    async fn find_signals_in_grace_period(
        &self,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Signal>>;

    /// ACTIVE signals with now < expires_at <= until.
    async fn find_signals_approaching(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Signal>>;

    async fn update_signal(&self, signal: &Signal) -> anyhow::Result<()>;

    // --- positions ---

    async fn open_positions_for_signal(
        &self,
        signal_id: Uuid,
    ) -> anyhow::Result<Vec<CopiedPosition>>;

    async fn open_positions_for_users(
        &self,
        user_ids: &[Uuid],
    ) -> anyhow::Result<Vec<CopiedPosition>>;

    async fn count_open_positions(&self, signal_id: Uuid) -> anyhow::Result<i64>;

    async fn update_position(&self, position: &CopiedPosition) -> anyhow::Result<()>;

    // --- preferences ---

    async fn find_preference(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Option<UserExpirationPreference>>;

    async fn save_preference(
        &self,
        preference: &UserExpirationPreference,
    ) -> anyhow::Result<UserExpirationPreference>;

    // --- notifications ---

    /// Insert a notification unless its dedupe key already exists.
    /// Returns None when the insert was suppressed as a duplicate.
    async fn insert_notification(
        &self,
        notification: &ExpirationNotification,
    ) -> anyhow::Result<Option<ExpirationNotification>>;

    async fn update_notification(
        &self,
        notification: &ExpirationNotification,
    ) -> anyhow::Result<()>;

    async fn get_notification(
        &self,
        id: Uuid,
    ) -> anyhow::Result<Option<ExpirationNotification>>;

    async fn notifications_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<ExpirationNotification>>;

    async fn unread_notifications(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Vec<ExpirationNotification>>;

    /// Flip all SENT notifications for the user to READ; returns the
    /// number affected.
    async fn mark_all_read(&self, user_id: Uuid, now: DateTime<Utc>) -> anyhow::Result<u64>;
}
