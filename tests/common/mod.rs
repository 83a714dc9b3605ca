use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use expirybot::engine::{
    ExpirationOrchestrator, ExpirationQueries, NotificationService, NotificationTransport,
    SignalTransitions,
};
use expirybot::models::{
    CopiedPosition, ExpirationAction, ExpirationNotification, NotificationChannel,
    PositionStatus, Signal, SignalStatus, UserExpirationPreference,
};
use expirybot::store::memory::MemStore;
use expirybot::store::ExpirationStore;
use expirybot::tasks::TaskRunner;

/// Transport that records every delivery and can be flipped to fail.
#[derive(Default)]
pub struct RecordingTransport {
    pub delivered: Mutex<Vec<ExpirationNotification>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::InApp
    }

    async fn deliver(&self, notification: &ExpirationNotification) -> anyhow::Result<()> {
        if self.fail.load(Ordering::Relaxed) {
            anyhow::bail!("transport down");
        }
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Store wrapper that fails `update_position` for configured position
/// ids, for exercising per-unit failure isolation.
pub struct FaultyStore {
    pub inner: Arc<MemStore>,
    pub fail_position_updates: HashSet<Uuid>,
}

#[async_trait]
impl ExpirationStore for FaultyStore {
    async fn ping(&self) -> anyhow::Result<()> {
        self.inner.ping().await
    }

    async fn get_signal(&self, id: Uuid) -> anyhow::Result<Option<Signal>> {
        self.inner.get_signal(id).await
    }

    async fn find_expired_signals(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Signal>> {
        self.inner.find_expired_signals(now).await
    }

    async fn find_signals_in_grace_period(
        &self,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Signal>> {
        self.inner.find_signals_in_grace_period(now).await
    }

    async fn find_signals_approaching(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Signal>> {
        self.inner.find_signals_approaching(now, until).await
    }

    async fn update_signal(&self, signal: &Signal) -> anyhow::Result<()> {
        self.inner.update_signal(signal).await
    }

    async fn open_positions_for_signal(
        &self,
        signal_id: Uuid,
    ) -> anyhow::Result<Vec<CopiedPosition>> {
        self.inner.open_positions_for_signal(signal_id).await
    }

    async fn open_positions_for_users(
        &self,
        user_ids: &[Uuid],
    ) -> anyhow::Result<Vec<CopiedPosition>> {
        self.inner.open_positions_for_users(user_ids).await
    }

    async fn count_open_positions(&self, signal_id: Uuid) -> anyhow::Result<i64> {
        self.inner.count_open_positions(signal_id).await
    }

    async fn update_position(&self, position: &CopiedPosition) -> anyhow::Result<()> {
        if self.fail_position_updates.contains(&position.id) {
            anyhow::bail!("storage error for position {}", position.id);
        }
        self.inner.update_position(position).await
    }

    async fn find_preference(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Option<UserExpirationPreference>> {
        self.inner.find_preference(user_id).await
    }

    async fn save_preference(
        &self,
        preference: &UserExpirationPreference,
    ) -> anyhow::Result<UserExpirationPreference> {
        self.inner.save_preference(preference).await
    }

    async fn insert_notification(
        &self,
        notification: &ExpirationNotification,
    ) -> anyhow::Result<Option<ExpirationNotification>> {
        self.inner.insert_notification(notification).await
    }

    async fn update_notification(
        &self,
        notification: &ExpirationNotification,
    ) -> anyhow::Result<()> {
        self.inner.update_notification(notification).await
    }

    async fn get_notification(
        &self,
        id: Uuid,
    ) -> anyhow::Result<Option<ExpirationNotification>> {
        self.inner.get_notification(id).await
    }

    async fn notifications_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<ExpirationNotification>> {
        self.inner.notifications_for_user(user_id, limit, offset).await
    }

    async fn unread_notifications(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Vec<ExpirationNotification>> {
        self.inner.unread_notifications(user_id).await
    }

    async fn mark_all_read(&self, user_id: Uuid, now: DateTime<Utc>) -> anyhow::Result<u64> {
        self.inner.mark_all_read(user_id, now).await
    }
}

/// Everything a test needs, wired over a shared store.
pub struct TestEngine {
    pub store: Arc<MemStore>,
    pub queries: Arc<ExpirationQueries>,
    pub transitions: Arc<SignalTransitions>,
    pub notifications: Arc<NotificationService>,
    pub orchestrator: Arc<ExpirationOrchestrator>,
    pub runner: Arc<TaskRunner>,
    pub transport: Arc<RecordingTransport>,
}

#[allow(dead_code)]
pub fn build_engine() -> TestEngine {
    let store = Arc::new(MemStore::new());
    let engine = build_engine_over(store.clone() as Arc<dyn ExpirationStore>, 30);
    TestEngine { store, ..engine }
}

/// Wire the services over any store; `store` in the returned engine is
/// a fresh MemStore handle only meaningful when the store *is* that
/// MemStore — callers using wrappers keep their own inner handle.
#[allow(dead_code)]
pub fn build_engine_over(store: Arc<dyn ExpirationStore>, grace_minutes: i64) -> TestEngine {
    let transport = Arc::new(RecordingTransport::default());
    let queries = Arc::new(ExpirationQueries::new(store.clone()));
    let transitions = Arc::new(SignalTransitions::new(store.clone()));
    let notifications = Arc::new(NotificationService::new(
        store.clone(),
        transport.clone() as Arc<dyn NotificationTransport>,
    ));
    let orchestrator = Arc::new(ExpirationOrchestrator::new(
        store.clone(),
        transitions.clone(),
        notifications.clone(),
    ));
    let runner = Arc::new(TaskRunner::new(
        queries.clone(),
        transitions.clone(),
        orchestrator.clone(),
        notifications.clone(),
        grace_minutes,
    ));

    TestEngine {
        store: Arc::new(MemStore::new()),
        queries,
        transitions,
        notifications,
        orchestrator,
        runner,
        transport,
    }
}

/// An ACTIVE signal whose expiry is `expires_in_minutes` from now
/// (negative = already past).
#[allow(dead_code)]
pub fn make_signal(expires_in_minutes: i64) -> Signal {
    Signal {
        id: Uuid::new_v4(),
        provider_id: Uuid::new_v4(),
        base_asset: "BTC".into(),
        counter_asset: "USDT".into(),
        status: SignalStatus::Active,
        outcome: None,
        expires_at: Utc::now() + Duration::minutes(expires_in_minutes),
        grace_period_ends_at: None,
        closed_at: None,
        copiers_count: 1,
        created_at: Utc::now() - Duration::hours(2),
    }
}

#[allow(dead_code)]
pub fn make_position(signal_id: Uuid, user_id: Uuid) -> CopiedPosition {
    CopiedPosition {
        id: Uuid::new_v4(),
        signal_id,
        user_id,
        status: PositionStatus::Open,
        auto_close_reason: None,
        entry_price: Decimal::new(65_000, 0),
        exit_price: None,
        volume: Decimal::ONE,
        pnl_absolute: None,
        pnl_percentage: None,
        opened_at: Utc::now() - Duration::hours(1),
        closed_at: None,
    }
}

#[allow(dead_code)]
pub fn preference_with_action(
    user_id: Uuid,
    action: ExpirationAction,
) -> UserExpirationPreference {
    let mut preference = UserExpirationPreference::defaults_for(user_id);
    preference.default_action = action;
    preference
}
